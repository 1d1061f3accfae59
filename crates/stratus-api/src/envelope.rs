//! The platform's JSON response envelope.
//!
//! Every API result arrives wrapped as
//! `{ "Response": { "RequestId": "...", "Error"?: { "Code", "Message" }, ...fields } }`.
//! Parsing either yields an [`ApiResponse`] carrying the payload fields or a
//! classified [`ApiError`] when the error object is present.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
struct Wire {
    #[serde(rename = "Response")]
    response: WireResponse,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(rename = "RequestId")]
    request_id: Option<String>,
    #[serde(rename = "Error")]
    error: Option<WireError>,
    #[serde(flatten)]
    payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message")]
    message: String,
}

/// A successful platform response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Request id for remote-side correlation.
    pub request_id: Option<String>,
    /// The envelope's payload fields, minus `RequestId` and `Error`.
    pub payload: Value,
}

impl ApiResponse {
    /// Deserialise the payload into a typed structure.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| ApiError::Unknown {
            code: "MalformedResponse".to_owned(),
            message: e.to_string(),
            request_id: self.request_id.clone(),
        })
    }

    /// Look up a single payload field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Parse a response body into an [`ApiResponse`] or a classified error.
pub fn parse(body: &str) -> ApiResult<ApiResponse> {
    let wire: Wire = serde_json::from_str(body).map_err(|e| ApiError::Unknown {
        code: "MalformedEnvelope".to_owned(),
        message: format!("{e}: {}", truncate(body, 200)),
        request_id: None,
    })?;

    let WireResponse {
        request_id,
        error,
        payload,
    } = wire.response;

    if let Some(error) = error {
        return Err(ApiError::from_platform(
            error.code,
            error.message,
            request_id,
        ));
    }

    Ok(ApiResponse {
        request_id,
        payload: Value::Object(payload),
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
