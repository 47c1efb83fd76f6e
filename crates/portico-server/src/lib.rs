//! HTTP server for the portico CMS front-end.
//!
//! Browsers never see OAuth tokens in script-readable storage. This crate
//! keeps them in `HttpOnly` cookies and exposes:
//!
//! - `POST /auth/login`, `/auth/logout`, `/auth/refresh` and `GET /auth/debug`
//! - `ANY /proxy/{*path}`, a relay to the CMS API that attaches the bearer
//!   token and renews it when the CMS rejects it
//! - `GET /health`
//! - optionally, a static UI directory behind a login redirect
//!
//! # Example
//!
//! ```ignore
//! use portico_oauth::{OAuthConfig, create_token_service};
//! use portico_server::{Server, ServerConfig};
//!
//! let tokens = create_token_service(OAuthConfig::new(token_url, client_id))?;
//! let config = ServerConfig::new(Some("https://cms.example".to_string()))
//!     .with_bind_address("127.0.0.1:3000".parse()?);
//!
//! Server::new(config, tokens)?.run().await?;
//! ```

pub mod config;
pub mod cookies;
pub mod error;
pub mod guard;
pub mod proxy;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use cookies::{
    ACCESS_TOKEN_COOKIE, ACCESS_TOKEN_EXPIRES_COOKIE, CredentialStore, REFRESH_TOKEN_COOKIE,
};
pub use error::{ErrorResponse, Result, ServerError};
pub use guard::session_guard;
pub use proxy::{ProxyOutcome, Relayed, Renewal, forward_with_refresh, proxy_handler};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::any,
};
use portico_oauth::SharedTokenService;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// The portico HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server talking to the authorization server through `tokens`.
    pub fn new(config: ServerConfig, tokens: SharedTokenService) -> Result<Self> {
        Ok(Self {
            state: AppState::new(config, tokens)?,
        })
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let config = self.state.config();

        let mut router = Router::new()
            .merge(routes::health_routes())
            .nest("/auth", routes::auth_routes())
            .route(proxy::PROXY_PREFIX, any(proxy_handler))
            .route("/proxy/{*path}", any(proxy_handler));

        if let Some(dir) = &config.ui_dir {
            let ui = Router::new()
                .route_service(guard::LOGIN_PATH, ServeFile::new(dir.join("login.html")))
                .fallback_service(ServeDir::new(dir))
                .layer(middleware::from_fn(guard::session_guard));
            router = router.merge(ui);
        }

        let mut router = router.layer(DefaultBodyLimit::max(config.max_body_size));

        if let Some(cors) = self.cors_layer() {
            router = router.layer(cors);
        }

        if config.request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router.with_state(self.state.clone())
    }

    /// CORS for cross-origin UIs. Credentials are allowed, so origins must
    /// be listed explicitly.
    fn cors_layer(&self) -> Option<CorsLayer> {
        let origins: Vec<HeaderValue> = self
            .state
            .config()
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            return None;
        }

        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true),
        )
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use portico_oauth::{OAuthError, TokenBundle, TokenTypeHint};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Token service that rejects every grant.
    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl portico_oauth::TokenService for Offline {
        async fn password_grant(&self, _: &str, _: &str) -> portico_oauth::Result<TokenBundle> {
            Err(OAuthError::Network("offline".into()))
        }
        async fn refresh_grant(&self, _: &str) -> portico_oauth::Result<TokenBundle> {
            Err(OAuthError::Network("offline".into()))
        }
        async fn revoke(&self, _: &str, _: TokenTypeHint) {}
        async fn user_info(&self, _: &str) -> portico_oauth::Result<Option<serde_json::Value>> {
            Ok(None)
        }
    }

    fn server(config: ServerConfig) -> Server {
        Server::new(config, Arc::new(Offline)).unwrap()
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let app = server(ServerConfig::new(None)).router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_without_api_base_is_500() {
        let app = server(ServerConfig::new(None)).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/proxy/jsonapi/node/article")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "Upstream API base URL is not configured");
    }

    #[tokio::test]
    async fn test_ui_is_guarded() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("login.html"), "<form></form>").unwrap();

        let config = ServerConfig::new(None).with_ui_dir(dir.path().to_path_buf());
        let app = server(config).router();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/login.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/index.html")
                    .header(header::COOKIE, "accessToken=A1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight_for_listed_origin() {
        let config = ServerConfig::new(None)
            .with_cors_origins(vec!["https://app.example".to_string()]);
        let app = server(config).router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/proxy/jsonapi")
                    .header(header::ORIGIN, "https://app.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://app.example"
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
    }

    #[test]
    fn test_bind_address() {
        let config = ServerConfig::new(None).with_bind_address("0.0.0.0:9000".parse().unwrap());
        assert_eq!(server(config).bind_address().port(), 9000);
    }
}
