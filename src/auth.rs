//! API key authentication

use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

/// Header carrying the caller's API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication failures; all render the same message to callers
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// The server has no API key configured
    #[error("Invalid or missing API key")]
    NotConfigured,
    /// The request carried no usable key
    #[error("Invalid or missing API key")]
    Missing,
    /// The supplied key does not match
    #[error("Invalid or missing API key")]
    Invalid,
}

/// Checks supplied keys against the configured one
#[derive(Clone)]
pub struct Authenticator {
    expected: Option<String>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl Authenticator {
    /// Create an authenticator; a blank key counts as not configured
    #[must_use]
    pub fn new(expected: Option<String>) -> Self {
        let expected = expected
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self { expected }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    /// Verify the key supplied with a request
    ///
    /// Both keys are trimmed before comparison.
    ///
    /// # Errors
    /// - `NotConfigured` when the server has no key
    /// - `Missing` when the supplied key is absent or blank
    /// - `Invalid` when the keys differ
    pub fn verify(&self, supplied: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = self.expected.as_deref() else {
            warn!("API_KEY is not configured; rejecting request");
            return Err(AuthError::NotConfigured);
        };

        let supplied = supplied.map(str::trim).unwrap_or_default();
        if supplied.is_empty() {
            warn!("Request without API key");
            return Err(AuthError::Missing);
        }

        if !secure_compare(supplied, expected) {
            warn!("Request with invalid API key");
            return Err(AuthError::Invalid);
        }

        Ok(())
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
