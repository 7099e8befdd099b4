//! AWS Signature Version 4 request signing for Bedrock `InvokeModel`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use proto::ModelError;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Inputs of one signature.
pub struct SigningParams<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Request path exactly as sent on the wire (already percent-encoded once).
    pub path: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub content_type: &'a str,
    pub body: &'a [u8],
    pub now: DateTime<Utc>,
}

/// Headers to attach to the signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

/// Signs a request, returning the headers the caller must send.
pub fn sign(creds: &AwsCredentials, params: &SigningParams<'_>) -> Result<SignedHeaders, ModelError> {
    let amz_date = params.now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);

    let canonical = canonical_request(params, &amz_date, creds.session_token.as_deref());
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical.request.as_bytes())
    );

    let key = signing_key(&creds.secret_key, &date, params.region, params.service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            creds.access_key, canonical.signed_headers
        ),
        amz_date,
        security_token: creds.session_token.clone(),
    })
}

struct CanonicalRequest {
    request: String,
    signed_headers: String,
}

fn canonical_request(
    params: &SigningParams<'_>,
    amz_date: &str,
    session_token: Option<&str>,
) -> CanonicalRequest {
    // Sorted by header name.
    let mut headers = vec![
        ("content-type", params.content_type.trim().to_string()),
        ("host", params.host.trim().to_string()),
        ("x-amz-date", amz_date.to_string()),
    ];
    if let Some(token) = session_token {
        headers.push(("x-amz-security-token", token.trim().to_string()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let request = format!(
        "{}\n{}\n\n{canonical_headers}\n{signed_headers}\n{}",
        params.method,
        canonical_uri(params.path),
        sha256_hex(params.body)
    );
    CanonicalRequest {
        request,
        signed_headers,
    }
}

/// Encodes every path segment again, as non-S3 services expect.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// Percent-encodes everything except the RFC 3986 unreserved set.
pub(crate) fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, ModelError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ModelError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| ModelError::Auth(format!("HMAC init: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
