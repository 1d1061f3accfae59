//! Error types for deployment operations.

use thiserror::Error;

use crate::packer::PackError;
use stratus_api::ApiError;

/// Result type alias using [`DeployError`].
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur while deploying functions.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Bad input rejected before any network call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No deployable source found, or archiving failed.
    #[error(transparent)]
    Packaging(#[from] PackError),

    /// The function already exists and overwrite was not permitted.
    ///
    /// Carries the original platform code and request id, annotated with
    /// the function name.
    #[error("function {function} already exists: {code}: {message}")]
    Conflict {
        /// Function the deployment targeted.
        function: String,
        /// Original platform error code.
        code: String,
        /// Original platform message.
        message: String,
        /// Request id for remote correlation.
        request_id: Option<String>,
    },

    /// A transport failure, propagated unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Configuration error (unresolved namespace/region, bad credentials).
    #[error("configuration error: {0}")]
    Config(String),
}

impl DeployError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Annotate a conflict error with the function it targeted.
    ///
    /// Panics in debug builds if the error is not a conflict; callers check
    /// [`ApiError::is_conflict`] first.
    #[must_use]
    pub fn conflict(function: &str, err: ApiError) -> Self {
        debug_assert!(err.is_conflict());
        Self::Conflict {
            function: function.to_owned(),
            code: err.code().unwrap_or("ResourceInUse").to_owned(),
            message: err.to_string(),
            request_id: err.request_id().map(str::to_owned),
        }
    }
}
