//! Platform credentials.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Credentials used to sign platform API calls.
///
/// Immutable for the lifetime of a client session; supplied externally and
/// never mutated by the transport. The secret key is held in a
/// [`SecretString`] so it is zeroed on drop and never appears in `Debug`
/// output.
#[derive(Clone)]
pub struct Credentials {
    secret_id: String,
    secret_key: SecretString,
    token: Option<String>,
    proxy: Option<String>,
}

impl Credentials {
    /// Create credentials from a key pair.
    #[must_use]
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: SecretString::from(secret_key.into()),
            token: None,
            proxy: None,
        }
    }

    /// Attach a session token (temporary credentials).
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Route all requests through a forward proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// The credential identifier attached to signed requests.
    #[must_use]
    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    /// The signing secret. Crate-internal: only the signer reads it.
    #[must_use]
    pub(crate) fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    /// The session token, if temporary credentials are in use.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The forward proxy URL, if configured.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"[REDACTED]")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("proxy", &self.proxy)
            .finish()
    }
}
