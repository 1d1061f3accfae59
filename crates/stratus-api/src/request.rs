//! Logical API requests.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// HTTP method for a platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Parameters travel as a canonical query string.
    Get,
    /// Parameters travel as a JSON body.
    Post,
}

impl HttpMethod {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    /// Content type the platform expects for this method.
    ///
    /// Part of the canonical headers, so it must match the sent header
    /// byte-for-byte.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Get => "application/x-www-form-urlencoded",
            Self::Post => "application/json",
        }
    }
}

/// A logical platform API call, built fresh per invocation.
///
/// Parameters live in a [`BTreeMap`] so every serialisation of the same
/// parameter set is byte-identical - the signature is computed over the
/// serialised form. Absent optional parameters are omitted, never null;
/// [`ActionRequest::param_opt`] enforces this at the call site.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    /// Service the action belongs to (forms the request host).
    pub service: String,
    /// Explicit API version sent with every call.
    pub api_version: String,
    /// Action name, e.g. `CreateFunction`.
    pub action: String,
    /// Region the call targets, if the service is regional.
    pub region: Option<String>,
    /// HTTP method.
    pub method: HttpMethod,
    params: BTreeMap<String, Value>,
}

impl ActionRequest {
    /// Create a POST request for the given service/version/action.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        api_version: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            api_version: api_version.into(),
            action: action.into(),
            region: None,
            method: HttpMethod::Post,
            params: BTreeMap::new(),
        }
    }

    /// Override the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Target a specific region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set a parameter only when the value is present.
    ///
    /// `None` leaves the key out of the request entirely.
    #[must_use]
    pub fn param_opt(mut self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.params.insert(key.into(), value.into());
        }
        self
    }

    /// The ordered parameter map.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Host the request is sent to: `{service}.{endpoint_root}`.
    #[must_use]
    pub fn host(&self, endpoint_root: &str) -> String {
        format!("{}.{}", self.service, endpoint_root)
    }

    /// Canonical JSON body for POST requests.
    ///
    /// Key order is the map order, so the same parameter set always yields
    /// the same bytes.
    pub fn body(&self) -> ApiResult<String> {
        serde_json::to_string(&self.params)
            .map_err(|e| ApiError::signing(format!("failed to serialise parameters: {e}")))
    }

    /// Canonical query string for GET requests: keys sorted, RFC 3986
    /// percent-encoded.
    #[must_use]
    pub fn canonical_query(&self) -> String {
        let mut pairs = Vec::with_capacity(self.params.len());
        for (key, value) in &self.params {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            pairs.push(format!(
                "{}={}",
                percent_encode(key),
                percent_encode(&value)
            ));
        }
        pairs.join("&")
    }
}

/// RFC 3986 percent-encoding: unreserved characters pass through, everything
/// else becomes `%XX` with uppercase hex.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_serialise_in_key_order() {
        let request = ActionRequest::new("faas", "2023-04-01", "CreateFunction")
            .param("Zebra", 1)
            .param("Alpha", 2);
        assert_eq!(request.body().unwrap(), r#"{"Alpha":2,"Zebra":1}"#);
    }

    #[test]
    fn param_opt_omits_absent_values() {
        let request = ActionRequest::new("faas", "2023-04-01", "CreateFunction")
            .param("Name", "fn")
            .param_opt("CodeSecret", None::<String>);
        assert!(!request.params().contains_key("CodeSecret"));
        assert!(!request.body().unwrap().contains("CodeSecret"));
    }

    #[test]
    fn nested_parameters_survive() {
        let request = ActionRequest::new("faas", "2023-04-01", "UpdateFunctionConfiguration")
            .param("Environment", json!({ "Variables": [{ "Key": "A", "Value": "1" }] }));
        assert!(request.body().unwrap().contains("Variables"));
    }

    #[test]
    fn canonical_query_is_sorted_and_encoded() {
        let request = ActionRequest::new("faas", "2023-04-01", "ListFunctions")
            .with_method(HttpMethod::Get)
            .param("b", "x y")
            .param("a", 1);
        assert_eq!(request.canonical_query(), "a=1&b=x%20y");
    }

    #[test]
    fn host_combines_service_and_root() {
        let request = ActionRequest::new("faas", "2023-04-01", "ListFunctions");
        assert_eq!(request.host("stratusapi.com"), "faas.stratusapi.com");
    }
}
