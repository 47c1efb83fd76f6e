//! Settings shared by `start` and `check`, read from flags or environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, builder::BoolishValueParser};
use portico_oauth::OAuthConfig;
use portico_server::ServerConfig;
use serde::Serialize;

/// Connection and server settings.
///
/// Every flag can also be given through the environment variable shown in
/// `--help`.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Base URL of the CMS resource API
    #[arg(long, env = "DRUPAL_API_BASE")]
    pub api_base: Option<String>,

    /// OAuth token endpoint
    #[arg(long, env = "DRUPAL_TOKEN_URL")]
    pub token_url: Option<String>,

    /// OAuth revocation endpoint (logout skips revocation without it)
    #[arg(long, env = "DRUPAL_REVOKE_URL")]
    pub revoke_url: Option<String>,

    /// Userinfo endpoint (default: <api base>/oauth/userinfo)
    #[arg(long, env = "DRUPAL_USERINFO_URL")]
    pub userinfo_url: Option<String>,

    /// OAuth client id
    #[arg(long, env = "DRUPAL_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "DRUPAL_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Scope requested by the password grant
    #[arg(long, env = "DRUPAL_SCOPE")]
    pub scope: Option<String>,

    /// Production mode: cookies are marked Secure
    #[arg(long, env = "PORTICO_PRODUCTION", value_parser = BoolishValueParser::new())]
    pub production: bool,

    /// Keep cookies non-Secure in production (plaintext local deployments)
    #[arg(long, env = "PORTICO_USE_HTTP", value_parser = BoolishValueParser::new())]
    pub use_http: bool,

    /// Address to bind to
    #[arg(short, long, env = "PORTICO_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory of static UI files, served behind the login redirect
    #[arg(long, env = "PORTICO_UI_DIR")]
    pub ui_dir: Option<PathBuf>,

    /// Timeout in seconds for each outbound call
    #[arg(long, env = "PORTICO_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Origin allowed to call with credentials (repeatable or comma-separated)
    #[arg(
        long = "cors-origin",
        env = "PORTICO_CORS_ORIGINS",
        value_delimiter = ','
    )]
    pub cors_origins: Vec<String>,
}

impl Settings {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    fn api_base(&self) -> Option<String> {
        non_blank(&self.api_base).map(|b| b.trim_end_matches('/').to_string())
    }

    fn userinfo_url(&self) -> Option<String> {
        non_blank(&self.userinfo_url)
            .map(str::to_string)
            .or_else(|| self.api_base().map(|base| format!("{}/oauth/userinfo", base)))
    }

    /// Authorization-server settings. Not validated here.
    pub fn oauth_config(&self) -> OAuthConfig {
        let mut config = OAuthConfig::new(
            self.token_url.clone().unwrap_or_default(),
            self.client_id.clone().unwrap_or_default(),
        );
        if let Some(url) = non_blank(&self.revoke_url) {
            config = config.with_revoke_url(url);
        }
        if let Some(url) = self.userinfo_url() {
            config = config.with_userinfo_url(url);
        }
        if let Some(secret) = non_blank(&self.client_secret) {
            config = config.with_client_secret(secret);
        }
        if let Some(scope) = non_blank(&self.scope) {
            config = config.with_scope(scope);
        }
        config
    }

    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.api_base())
            .with_bind_address(self.bind)
            .with_production(self.production)
            .with_use_http(self.use_http)
            .with_upstream_timeout(self.upstream_timeout())
            .with_request_logging(true)
            .with_cors_origins(
                self.cors_origins
                    .iter()
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            );
        if let Some(dir) = &self.ui_dir {
            config = config.with_ui_dir(dir.clone());
        }
        config
    }

    /// Printable view with the client secret masked.
    pub fn summary(&self) -> SettingsSummary {
        let oauth = self.oauth_config();
        let server = self.server_config();
        SettingsSummary {
            bind: server.bind_address.to_string(),
            api_base: server.api_base().map(str::to_string),
            token_url: oauth.token_url,
            revoke_url: oauth.revoke_url,
            userinfo_url: oauth.userinfo_url,
            client_id: oauth.client_id,
            client_secret: oauth.client_secret.map(|_| "********".to_string()),
            scope: oauth.scope,
            secure_cookies: server.secure_cookies(),
            ui_dir: server.ui_dir.map(|d| d.display().to_string()),
            upstream_timeout_secs: self.upstream_timeout_secs,
            cors_origins: server.cors_origins,
        }
    }
}

/// Resolved settings, safe to print.
#[derive(Debug, Serialize)]
pub struct SettingsSummary {
    pub bind: String,
    pub api_base: Option<String>,
    pub token_url: String,
    pub revoke_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub secure_cookies: bool,
    pub ui_dir: Option<String>,
    pub upstream_timeout_secs: u64,
    pub cors_origins: Vec<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["portico"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).settings
    }

    #[test]
    fn test_userinfo_defaults_to_api_base() {
        let settings = parse(&[
            "--api-base",
            "https://cms.example/",
            "--token-url",
            "https://cms.example/oauth/token",
            "--client-id",
            "portal",
        ]);
        let oauth = settings.oauth_config();
        assert_eq!(
            oauth.userinfo_url.as_deref(),
            Some("https://cms.example/oauth/userinfo")
        );
        assert!(oauth.validate().is_ok());
    }

    #[test]
    fn test_explicit_userinfo_wins() {
        let settings = parse(&[
            "--api-base",
            "https://cms.example",
            "--userinfo-url",
            "https://id.example/me",
        ]);
        assert_eq!(
            settings.oauth_config().userinfo_url.as_deref(),
            Some("https://id.example/me")
        );
    }

    #[test]
    fn test_missing_token_url_fails_validation() {
        let settings = parse(&["--client-id", "portal"]);
        assert!(settings.oauth_config().validate().is_err());
    }

    #[test]
    fn test_server_config_mapping() {
        let settings = parse(&[
            "--bind",
            "0.0.0.0:8080",
            "--production",
            "--upstream-timeout-secs",
            "5",
            "--cors-origin",
            "https://a.example,https://b.example",
        ]);
        let config = settings.server_config();
        assert_eq!(config.bind_address.port(), 8080);
        assert!(config.secure_cookies());
        assert_eq!(config.upstream_timeout, Duration::from_secs(5));
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.api_base(), None);
    }

    #[test]
    fn test_summary_masks_secret() {
        let settings = parse(&["--client-secret", "s3cret", "--use-http", "--production"]);
        let summary = settings.summary();
        assert_eq!(summary.client_secret.as_deref(), Some("********"));
        assert!(!summary.secure_cookies);
        assert!(!serde_json::to_string(&summary).unwrap().contains("s3cret"));
    }
}
