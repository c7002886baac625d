//! Identity verification ahead of core operations.
//!
//! Every handler resolves the caller's identity through an explicit async
//! call before any core operation proceeds; there is no callback-style
//! middleware. The shipped verifier checks a static bearer token from
//! configuration and reads the caller id from a request header, which is
//! enough for single-tenant deployments; a real token service is a trait
//! implementation away.

use async_trait::async_trait;
use thiserror::Error;

/// Fallback user identity when the deployment does not distinguish callers.
pub const DEFAULT_USER_ID: &str = "default";

/// Errors raised while verifying a caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token was supplied but the server requires one.
    #[error("missing bearer token")]
    MissingCredentials,
    /// The supplied bearer token did not match the configured token.
    #[error("invalid API token")]
    InvalidToken,
}

/// Interface for resolving a request's caller before core operations run.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify the supplied bearer token and resolve the caller's user id.
    async fn verify(
        &self,
        bearer_token: Option<&str>,
        user_hint: Option<&str>,
    ) -> Result<String, AuthError>;
}

/// Verifier backed by a single static token from configuration.
///
/// With no token configured, every request is accepted (local single-user
/// mode). The user id comes from the caller-supplied hint, falling back to
/// [`DEFAULT_USER_ID`].
pub struct StaticTokenVerifier {
    token: Option<String>,
}

impl StaticTokenVerifier {
    /// Construct a verifier expecting the given token, or none.
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Construct a verifier from the loaded configuration.
    pub fn from_config() -> Self {
        Self::new(crate::config::get_config().api_token.clone())
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(
        &self,
        bearer_token: Option<&str>,
        user_hint: Option<&str>,
    ) -> Result<String, AuthError> {
        if let Some(expected) = &self.token {
            let supplied = bearer_token.ok_or(AuthError::MissingCredentials)?;
            if supplied != expected {
                return Err(AuthError::InvalidToken);
            }
        }

        let user_id = user_hint
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
            .unwrap_or(DEFAULT_USER_ID);
        Ok(user_id.to_string())
    }
}
