//! Token service: the grant operations the session endpoints and the proxy
//! depend on.
//!
//! Grants are never retried here. A rejected grant is a definitive
//! authentication failure and is returned to the caller as-is.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{OAuthError, Result};
use crate::oauth::{
    OAuthConfig, TokenBundle, TokenTypeHint, fetch_user_info, password_grant, refresh_grant,
    revoke_token,
};

/// Default timeout for calls to the authorization server.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// TokenService Trait
// ============================================================================

/// Grant, revoke and userinfo operations against the authorization server.
#[async_trait]
pub trait TokenService: Send + Sync + std::fmt::Debug {
    /// Resource-owner password grant.
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenBundle>;

    /// Refresh-token grant. The returned bundle may omit `refresh_token`.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenBundle>;

    /// Best-effort revocation. Never fails; errors are logged and dropped.
    async fn revoke(&self, token: &str, hint: TokenTypeHint);

    /// Profile of the token's owner, if the server exposes one.
    async fn user_info(&self, access_token: &str) -> Result<Option<serde_json::Value>>;
}

/// Shared token service for use across handlers.
pub type SharedTokenService = Arc<dyn TokenService>;

// ============================================================================
// HttpTokenService
// ============================================================================

/// Token service backed by form-encoded POSTs to the configured endpoints.
#[derive(Debug, Clone)]
pub struct HttpTokenService {
    client: Client,
    config: OAuthConfig,
}

impl HttpTokenService {
    /// Validate `config` and build a service with the default timeout.
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| OAuthError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(config, client)
    }

    /// Validate `config` and build a service on an existing client.
    pub fn with_client(config: OAuthConfig, client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

#[async_trait]
impl TokenService for HttpTokenService {
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenBundle> {
        let bundle = password_grant(&self.client, &self.config, username, password).await?;
        tracing::debug!(expires_in = bundle.expires_in, "Password grant succeeded");
        Ok(bundle)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenBundle> {
        let bundle = refresh_grant(&self.client, &self.config, refresh_token).await?;
        tracing::debug!(
            expires_in = bundle.expires_in,
            rotated = bundle.refresh_token.is_some(),
            "Refresh grant succeeded"
        );
        Ok(bundle)
    }

    async fn revoke(&self, token: &str, hint: TokenTypeHint) {
        match revoke_token(&self.client, &self.config, token, hint).await {
            Ok(true) => tracing::debug!(hint = hint.as_str(), "Token revoked"),
            Ok(false) => tracing::trace!("No revocation endpoint configured"),
            Err(e) => tracing::warn!(hint = hint.as_str(), error = %e, "Token revocation failed"),
        }
    }

    async fn user_info(&self, access_token: &str) -> Result<Option<serde_json::Value>> {
        fetch_user_info(&self.client, &self.config, access_token).await
    }
}

/// Create a shared HTTP-backed token service.
pub fn create_token_service(config: OAuthConfig) -> Result<SharedTokenService> {
    Ok(Arc::new(HttpTokenService::new(config)?))
}
