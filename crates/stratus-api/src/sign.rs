//! Request signing.
//!
//! Implements the platform's canonical-request scheme: a deterministic
//! string is derived from the HTTP method, canonical headers, sorted
//! parameters and request path, then signed with an HMAC-SHA256 key chain
//! scoped to (date, service). The canonical rules are dictated by the
//! remote protocol and must be reproduced byte-for-byte.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::error::{ApiError, ApiResult};
use crate::request::{ActionRequest, HttpMethod};

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithm identifier sent in the authorization header.
pub const ALGORITHM: &str = "STRATUS1-HMAC-SHA256";

/// Prefix mixed into the secret key before key derivation.
const KEY_PREFIX: &str = "STRATUS1";

/// Terminal scope component of the credential scope.
const SCOPE_SUFFIX: &str = "stratus_request";

/// A fully signed request, derived deterministically from
/// (request, credentials, timestamp, nonce).
///
/// Never cached or reused: every call signs with fresh wall-clock time, so
/// a retried operation carries a new signature.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Unix timestamp the request was signed at.
    pub timestamp: i64,
    /// Per-request nonce.
    pub nonce: u64,
    /// The string-to-sign the signature was computed over.
    pub canonical_string: String,
    /// Lowercase hex HMAC-SHA256 signature.
    pub signature: String,
    /// Complete authorization header value.
    pub authorization: String,
    /// Header names covered by the signature, `;`-separated.
    pub signed_headers: &'static str,
}

/// Sign a request at the given timestamp with the given nonce.
///
/// Deterministic: identical inputs yield an identical signature, and any
/// change to a parameter value changes it.
pub fn sign(
    request: &ActionRequest,
    credentials: &Credentials,
    endpoint_root: &str,
    timestamp: i64,
    nonce: u64,
) -> ApiResult<SignedRequest> {
    let host = request.host(endpoint_root);

    let (query, payload) = match request.method {
        HttpMethod::Get => (request.canonical_query(), String::new()),
        HttpMethod::Post => (String::new(), request.body()?),
    };

    let content_type = request.method.content_type();
    let canonical_headers = format!("content-type:{content_type}\nhost:{host}\n");
    let signed_headers = "content-type;host";
    let hashed_payload = sha256_hex(payload.as_bytes());

    let canonical_request = format!(
        "{}\n/\n{}\n{}\n{}\n{}",
        request.method.as_str(),
        query,
        canonical_headers,
        signed_headers,
        hashed_payload
    );

    let date = chrono::DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| ApiError::signing(format!("timestamp out of range: {timestamp}")))?
        .format("%Y-%m-%d")
        .to_string();
    let scope = format!("{date}/{}/{SCOPE_SUFFIX}", request.service);

    let canonical_string = format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key_date = hmac_sha256(
        format!("{KEY_PREFIX}{}", credentials.secret_key()).as_bytes(),
        date.as_bytes(),
    )?;
    let key_service = hmac_sha256(&key_date, request.service.as_bytes())?;
    let key_signing = hmac_sha256(&key_service, SCOPE_SUFFIX.as_bytes())?;
    let signature = hex::encode(hmac_sha256(&key_signing, canonical_string.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.secret_id()
    );

    Ok(SignedRequest {
        timestamp,
        nonce,
        canonical_string,
        signature,
        authorization,
        signed_headers,
    })
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> ApiResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ApiError::signing(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
