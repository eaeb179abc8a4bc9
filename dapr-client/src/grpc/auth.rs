//! # API Token Sources
//!
//! The sidecar may be configured to require a shared secret on every call. The dispatcher asks
//! its [`ApiTokenSource`] for the token right before each call, so rotating the secret
//! (e.g. updating the environment) takes effect without rebuilding the client.
use std::fmt::Debug;

/// Metadata key under which the token travels.
pub const API_TOKEN_HEADER: &str = "dapr-api-token";

/// Environment variable read by [`EnvApiToken::default`].
pub const API_TOKEN_ENV_VAR: &str = "DAPR_API_TOKEN";

/// Supplies the API token for an outgoing call.
///
/// Returning `None` (or an empty string) omits the `dapr-api-token` header.
pub trait ApiTokenSource: Debug + Send + Sync {
    fn api_token(&self) -> Option<String>;
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvApiToken {
    variable: String,
}

impl EnvApiToken {
    /// Reads the token from `variable` instead of `DAPR_API_TOKEN`.
    pub fn from_var(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Default for EnvApiToken {
    fn default() -> Self {
        Self::from_var(API_TOKEN_ENV_VAR)
    }
}

impl ApiTokenSource for EnvApiToken {
    fn api_token(&self) -> Option<String> {
        std::env::var(&self.variable)
            .ok()
            .filter(|token| !token.is_empty())
    }
}

/// A token fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticApiToken(Option<String>);

impl StaticApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// A source that never attaches a token.
    pub fn none() -> Self {
        Self(None)
    }
}

impl ApiTokenSource for StaticApiToken {
    fn api_token(&self) -> Option<String> {
        self.0.clone().filter(|token| !token.is_empty())
    }
}
