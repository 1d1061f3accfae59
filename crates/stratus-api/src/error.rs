//! Failure taxonomy for platform API calls.

use thiserror::Error;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the transport layer.
///
/// Remote failures preserve the originating platform `code` and request id
/// so callers can correlate with remote-side logs. Orchestration layers
/// branch on the variant, not on the code string.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credential or signature rejected by the platform.
    #[error("authentication failed: {code}: {message}")]
    Auth {
        /// Platform error code.
        code: String,
        /// Human-readable platform message.
        message: String,
        /// Request id for remote correlation.
        request_id: Option<String>,
    },

    /// Local signing failed before any network call.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A remote object of the given name already exists.
    #[error("resource conflict: {code}: {message}")]
    ResourceConflict {
        /// Platform error code.
        code: String,
        /// Human-readable platform message.
        message: String,
        /// Request id for remote correlation.
        request_id: Option<String>,
    },

    /// The named remote object does not exist.
    #[error("resource not found: {code}: {message}")]
    ResourceNotFound {
        /// Platform error code.
        code: String,
        /// Human-readable platform message.
        message: String,
        /// Request id for remote correlation.
        request_id: Option<String>,
    },

    /// Bad parameter shape, caught before or after the call.
    #[error("validation failed: {code}: {message}")]
    Validation {
        /// Platform error code.
        code: String,
        /// Human-readable platform message.
        message: String,
        /// Request id for remote correlation.
        request_id: Option<String>,
    },

    /// Network failure or server-side 5xx.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Anything the classifier does not recognise.
    #[error("unknown platform error: {code}: {message}")]
    Unknown {
        /// Platform error code.
        code: String,
        /// Human-readable platform message.
        message: String,
        /// Request id for remote correlation.
        request_id: Option<String>,
    },
}

impl ApiError {
    /// Classify a platform error body into the taxonomy.
    ///
    /// Classification is by code prefix/suffix per the platform's error
    /// code families.
    #[must_use]
    pub fn from_platform(code: String, message: String, request_id: Option<String>) -> Self {
        if code.starts_with("AuthFailure") || code.starts_with("UnauthorizedOperation") {
            Self::Auth {
                code,
                message,
                request_id,
            }
        } else if code.starts_with("ResourceInUse") || code.ends_with("AlreadyExists") {
            Self::ResourceConflict {
                code,
                message,
                request_id,
            }
        } else if code.starts_with("ResourceNotFound") {
            Self::ResourceNotFound {
                code,
                message,
                request_id,
            }
        } else if code.starts_with("InvalidParameter") || code.starts_with("MissingParameter") {
            Self::Validation {
                code,
                message,
                request_id,
            }
        } else if code.starts_with("InternalError")
            || code.starts_with("RequestLimitExceeded")
            || code.starts_with("ServiceUnavailable")
        {
            Self::Transient(format!("{code}: {message}"))
        } else {
            Self::Unknown {
                code,
                message,
                request_id,
            }
        }
    }

    /// Create a signing error.
    #[must_use]
    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    /// Create a transient error.
    #[must_use]
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a local validation error (no request id).
    #[must_use]
    pub fn validation(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            code: code.into(),
            message: msg.into(),
            request_id: None,
        }
    }

    /// True when the remote object already exists.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ResourceConflict { .. })
    }

    /// True when a repeat of the same call might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The platform error code, if this failure came from the platform.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Auth { code, .. }
            | Self::ResourceConflict { code, .. }
            | Self::ResourceNotFound { code, .. }
            | Self::Validation { code, .. }
            | Self::Unknown { code, .. } => Some(code),
            Self::Signing(_) | Self::Transient(_) => None,
        }
    }

    /// The request id, if the platform returned one.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Auth { request_id, .. }
            | Self::ResourceConflict { request_id, .. }
            | Self::ResourceNotFound { request_id, .. }
            | Self::Validation { request_id, .. }
            | Self::Unknown { request_id, .. } => request_id.as_deref(),
            Self::Signing(_) | Self::Transient(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // Only failures that a repeat might fix are transient; request
        // construction fails the same way every time.
        if e.is_timeout() || e.is_connect() {
            Self::Transient(e.to_string())
        } else {
            Self::Unknown {
                code: "Network".to_owned(),
                message: e.to_string(),
                request_id: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(code: &str) -> ApiError {
        ApiError::from_platform(code.to_owned(), "msg".to_owned(), Some("req-1".to_owned()))
    }

    #[test]
    fn conflict_codes() {
        assert!(classify("ResourceInUse").is_conflict());
        assert!(classify("ResourceInUse.Function").is_conflict());
        assert!(classify("InvalidParameter.TriggerAlreadyExists").is_conflict());
    }

    #[test]
    fn auth_codes() {
        assert!(matches!(
            classify("AuthFailure.SignatureExpire"),
            ApiError::Auth { .. }
        ));
        assert!(matches!(
            classify("UnauthorizedOperation"),
            ApiError::Auth { .. }
        ));
    }

    #[test]
    fn not_found_and_validation_codes() {
        assert!(matches!(
            classify("ResourceNotFound.Function"),
            ApiError::ResourceNotFound { .. }
        ));
        assert!(matches!(
            classify("InvalidParameterValue.Runtime"),
            ApiError::Validation { .. }
        ));
        assert!(matches!(
            classify("MissingParameter"),
            ApiError::Validation { .. }
        ));
    }

    #[test]
    fn transient_codes() {
        assert!(classify("InternalError").is_transient());
        assert!(classify("RequestLimitExceeded").is_transient());
    }

    #[test]
    fn request_construction_failures_are_not_transient() {
        let err = reqwest::Client::new()
            .get("http://[malformed")
            .build()
            .unwrap_err();
        let classified = ApiError::from(err);
        assert!(!classified.is_transient());
        assert!(matches!(classified, ApiError::Unknown { .. }));
    }

    #[test]
    fn unknown_preserves_code_and_request_id() {
        let err = classify("FailedOperation.Unheard");
        assert_eq!(err.code(), Some("FailedOperation.Unheard"));
        assert_eq!(err.request_id(), Some("req-1"));
    }
}
