//! Application state shared across handlers.
//!
//! Nothing here is per-session: credentials travel in cookies, so the state
//! is read-only configuration plus pooled HTTP clients.

use std::sync::Arc;

use portico_oauth::SharedTokenService;
use reqwest::{Client, redirect};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Grant/revoke/userinfo operations against the authorization server.
    pub tokens: SharedTokenService,

    /// Client for the resource server. Never follows redirects.
    pub upstream: Client,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: ServerConfig, tokens: SharedTokenService) -> Result<Self> {
        let upstream = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| ServerError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: Arc::new(config),
            tokens,
            upstream,
        })
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
