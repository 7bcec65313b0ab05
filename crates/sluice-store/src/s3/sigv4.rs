//! AWS Signature Version 4 request signing.
//!
//! Only the header-based form is implemented, with the payload declared as
//! `UNSIGNED-PAYLOAD` so request bodies can be streamed without hashing them
//! first. Signed headers are always `host`, `x-amz-content-sha256` and
//! `x-amz-date`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use sluice_types::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub(crate) const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// The parts of a request that enter the signature.
pub(crate) struct RequestParts<'a> {
    pub method: &'a str,
    /// Unencoded path, e.g. `/objects/abc123`.
    pub path: &'a str,
    /// Unencoded query parameters, in any order.
    pub query: &'a [(&'a str, &'a str)],
    /// `Host` header value (`host[:port]`).
    pub host: &'a str,
}

/// Headers to attach to a signed request.
pub(crate) struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
}

/// Sign a request at time `now`.
pub(crate) fn sign(
    credentials: &Credentials,
    region: &str,
    request: &RequestParts<'_>,
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let canonical = canonical_request(request, &amz_date);
    let scope = format!("{date}/{region}/{SERVICE}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical.as_bytes()))
    );

    let key = signing_key(&credentials.secret_key, &date, region, SERVICE);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            credentials.access_key
        ),
        amz_date,
    }
}

fn canonical_request(request: &RequestParts<'_>, amz_date: &str) -> String {
    let canonical_headers = format!(
        "host:{}\nx-amz-content-sha256:{UNSIGNED_PAYLOAD}\nx-amz-date:{amz_date}",
        request.host.trim()
    );
    format!(
        "{}\n{}\n{}\n{canonical_headers}\n\n{SIGNED_HEADERS}\n{UNSIGNED_PAYLOAD}",
        request.method,
        canonical_uri(request.path),
        canonical_query(request.query),
    )
}

/// Percent-encode each path segment, keeping the `/` separators.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(percent_encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode and sort query parameters by name, then value.
pub(crate) fn canonical_query(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
fn signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_secret = format!("AWS4{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC can take key of any size"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// RFC 3986 encoding: everything except unreserved characters.
pub(crate) fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
