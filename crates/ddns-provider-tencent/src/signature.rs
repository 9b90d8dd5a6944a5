//! Tencent Cloud API 3.0 request signing (TC3-HMAC-SHA256)
//!
//! Only the shape this crate sends is supported: `POST /` with a JSON
//! body and the signed headers `content-type`, `host` and `x-tc-action`.

use chrono::DateTime;
use ddns_core::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithm name
pub const ALGORITHM: &str = "TC3-HMAC-SHA256";

/// Content type of every request body
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

const SIGNED_HEADERS: &str = "content-type;host;x-tc-action";

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn hmac_sha256(key: &[u8], msg: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::invalid_input(format!("Invalid signing key: {}", e)))?;
    mac.update(msg.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// UTC date (`YYYY-MM-DD`) of a unix timestamp
pub fn utc_date(timestamp: i64) -> Result<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|at| at.format("%Y-%m-%d").to_string())
        .ok_or_else(|| Error::invalid_input(format!("Timestamp out of range: {}", timestamp)))
}

/// Canonical request for a JSON `POST /`
pub fn canonical_request(host: &str, action: &str, payload: &str) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\nx-tc-action:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        action.to_lowercase(),
        SIGNED_HEADERS,
        sha256_hex(payload.as_bytes())
    )
}

/// `date/service/tc3_request`
pub fn credential_scope(date: &str, service: &str) -> String {
    format!("{}/{}/tc3_request", date, service)
}

/// The string the final HMAC is computed over
pub fn string_to_sign(timestamp: i64, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        scope,
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Hex signature using the derived key chain
/// `TC3 + secret → date → service → "tc3_request"`
pub fn signature(secret_key: &str, date: &str, service: &str, string_to_sign: &str) -> Result<String> {
    let secret_date = hmac_sha256(format!("TC3{}", secret_key).as_bytes(), date)?;
    let secret_service = hmac_sha256(&secret_date, service)?;
    let secret_signing = hmac_sha256(&secret_service, "tc3_request")?;

    let mut mac = HmacSha256::new_from_slice(&secret_signing)
        .map_err(|e| Error::invalid_input(format!("Invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

/// Value of the `Authorization` header for one request
pub fn authorization(
    secret_id: &str,
    secret_key: &str,
    service: &str,
    host: &str,
    action: &str,
    payload: &str,
    timestamp: i64,
) -> Result<String> {
    let date = utc_date(timestamp)?;
    let scope = credential_scope(&date, service);
    let to_sign = string_to_sign(timestamp, &scope, &canonical_request(host, action, payload));
    let signature = signature(secret_key, &date, service, &to_sign)?;

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, secret_id, scope, SIGNED_HEADERS, signature
    ))
}
