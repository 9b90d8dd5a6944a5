//! Alibaba Cloud RPC request signing (signature version 1.0)
//!
//! 1. Add the common parameters to the action parameters
//! 2. Sort by name and percent-encode names and values (RFC 3986)
//! 3. `StringToSign = "GET" + "&" + enc("/") + "&" + enc(canonical query)`
//! 4. `Signature = base64(HMAC-SHA1(secret + "&", StringToSign))`
//!
//! The signature is appended to the canonical query as `Signature=...`.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use ddns_core::{Error, Result};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// Alibaba Cloud DNS API version
pub const API_VERSION: &str = "2015-01-09";

/// Everything except unreserved characters is encoded
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a query component the way the RPC signature expects
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, RFC3986).to_string()
}

/// Request timestamp in the format the API accepts
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Sorted, encoded `name=value` pairs joined by `&`
pub fn canonical_query(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// The string the HMAC is computed over
pub fn string_to_sign(canonical: &str) -> String {
    format!("GET&{}&{}", percent_encode("/"), percent_encode(canonical))
}

/// Base64 HMAC-SHA1 of `string_to_sign`, keyed with `secret + "&"`
pub fn sign(string_to_sign: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(format!("{}&", secret).as_bytes())
        .map_err(|e| Error::invalid_input(format!("Invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Build the full signed query string for one API call
pub fn signed_query(
    access_key_id: &str,
    secret: &str,
    action: &str,
    params: &[(&str, &str)],
    at: DateTime<Utc>,
    nonce: &str,
) -> Result<String> {
    let mut all: BTreeMap<&str, String> = BTreeMap::new();
    all.insert("Format", "JSON".to_string());
    all.insert("Version", API_VERSION.to_string());
    all.insert("AccessKeyId", access_key_id.to_string());
    all.insert("SignatureMethod", "HMAC-SHA1".to_string());
    all.insert("Timestamp", format_timestamp(at));
    all.insert("SignatureVersion", "1.0".to_string());
    all.insert("SignatureNonce", nonce.to_string());
    all.insert("Action", action.to_string());
    for &(k, v) in params {
        all.insert(k, v.to_string());
    }

    let canonical = canonical_query(&all);
    let signature = sign(&string_to_sign(&canonical), secret)?;

    Ok(format!("{}&Signature={}", canonical, percent_encode(&signature)))
}
