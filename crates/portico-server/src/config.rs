//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default max body size for proxied and auth requests (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default timeout for calls to the resource server.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Resource-server path checked by `GET /auth/debug`.
pub const DEFAULT_DEBUG_CHECK_PATH: &str = "/jsonapi/node/role_1";

/// Server configuration. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Base URL of the upstream resource server. `None` makes every
    /// proxied request fail with a configuration error.
    pub api_base: Option<String>,

    /// Running in production. Cookies require HTTPS unless `use_http` is set.
    pub production: bool,

    /// Plaintext local-development override for the secure-cookie requirement.
    pub use_http: bool,

    /// Timeout for each call to the resource server.
    pub upstream_timeout: Duration,

    /// Resource-server path checked by the debug endpoint.
    pub debug_check_path: String,

    /// Static UI directory, served behind the session guard.
    pub ui_dir: Option<PathBuf>,

    /// Enable request logging.
    pub request_logging: bool,

    /// CORS allowed origins (empty = no CORS).
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            api_base: None,
            production: false,
            use_http: false,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            debug_check_path: DEFAULT_DEBUG_CHECK_PATH.to_string(),
            ui_dir: None,
            request_logging: true,
            cors_origins: Vec::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a config forwarding to the given resource server.
    pub fn new(api_base: Option<String>) -> Self {
        Self {
            api_base: api_base.filter(|b| !b.trim().is_empty()),
            ..Default::default()
        }
    }

    /// Whether cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.production && !self.use_http
    }

    /// The upstream base without a trailing slash.
    pub fn api_base(&self) -> Option<&str> {
        self.api_base.as_deref().map(|b| b.trim_end_matches('/'))
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_use_http(mut self, use_http: bool) -> Self {
        self.use_http = use_http;
        self
    }

    /// Set the resource-server timeout.
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_debug_check_path(mut self, path: impl Into<String>) -> Self {
        self.debug_check_path = path.into();
        self
    }

    /// Serve a static UI from `dir`.
    pub fn with_ui_dir(mut self, dir: PathBuf) -> Self {
        self.ui_dir = Some(dir);
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}
