//! AWS Signature Version 4 signing for unsigned-payload S3 object reads.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::ContentError;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
pub(crate) const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Inputs for signing one request.
#[derive(Debug, Clone)]
pub(crate) struct SigningRequest<'a> {
    pub method: &'a str,
    /// Host header value, including a non-default port.
    pub host: &'a str,
    /// Already URI-encoded absolute path.
    pub canonical_uri: &'a str,
    pub region: &'a str,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub timestamp: DateTime<Utc>,
}

/// Header values to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: &'static str,
    pub security_token: Option<String>,
}

/// Percent-encodes each `/`-separated segment of an object key.
pub(crate) fn encode_key_path(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len() + 8);
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

fn amz_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

fn short_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d").to_string()
}

fn credential_scope(request: &SigningRequest<'_>) -> String {
    format!(
        "{}/{}/{SERVICE}/aws4_request",
        short_date(request.timestamp),
        request.region
    )
}

fn canonical_headers(request: &SigningRequest<'_>) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("host", request.host.trim().to_string()),
        ("x-amz-content-sha256", UNSIGNED_PAYLOAD.to_string()),
        ("x-amz-date", amz_date(request.timestamp)),
    ];
    if let Some(token) = request.session_token {
        headers.push(("x-amz-security-token", token.trim().to_string()));
    }
    headers
}

fn signed_header_names(headers: &[(&'static str, String)]) -> String {
    headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";")
}

pub(crate) fn canonical_request(request: &SigningRequest<'_>) -> String {
    let headers = canonical_headers(request);
    let mut rendered_headers = String::new();
    for (name, value) in &headers {
        rendered_headers.push_str(name);
        rendered_headers.push(':');
        rendered_headers.push_str(value);
        rendered_headers.push('\n');
    }
    format!(
        "{}\n{}\n\n{}\n{}\n{UNSIGNED_PAYLOAD}",
        request.method,
        request.canonical_uri,
        rendered_headers,
        signed_header_names(&headers)
    )
}

pub(crate) fn string_to_sign(request: &SigningRequest<'_>) -> String {
    let canonical_hash = format!("{:x}", Sha256::digest(canonical_request(request).as_bytes()));
    format!(
        "{ALGORITHM}\n{}\n{}\n{canonical_hash}",
        amz_date(request.timestamp),
        credential_scope(request)
    )
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>, ContentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|error| ContentError::Signing(error.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn signing_key(
    secret_access_key: &str,
    timestamp: DateTime<Utc>,
    region: &str,
) -> Result<Vec<u8>, ContentError> {
    let date_key = hmac_sha256(
        format!("AWS4{secret_access_key}").as_bytes(),
        short_date(timestamp).as_bytes(),
    )?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, SERVICE.as_bytes())?;
    hmac_sha256(&service_key, b"aws4_request")
}

pub(crate) fn sign(request: &SigningRequest<'_>) -> Result<SignedHeaders, ContentError> {
    let key = signing_key(request.secret_access_key, request.timestamp, request.region)?;
    let signature = hmac_sha256(&key, string_to_sign(request).as_bytes())?
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    let headers = canonical_headers(request);
    Ok(SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={signature}",
            request.access_key_id,
            credential_scope(request),
            signed_header_names(&headers)
        ),
        amz_date: amz_date(request.timestamp),
        content_sha256: UNSIGNED_PAYLOAD,
        security_token: request.session_token.map(|token| token.trim().to_string()),
    })
}
