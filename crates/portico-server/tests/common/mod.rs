//! Common test utilities for integration tests.
//!
//! Each [`TestServer`] runs a real portico server on a free port in front of
//! two wiremock servers: one playing the CMS authorization server, one the
//! CMS resource API.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum_extra::extract::cookie::Cookie;
use reqwest::{Client, redirect};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wiremock::MockServer;

use portico_oauth::{OAuthConfig, create_token_service, now_ms};
use portico_server::{Server, ServerConfig};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const REVOKE_PATH: &str = "/oauth/revoke";
pub const USERINFO_PATH: &str = "/oauth/userinfo";

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// Client that neither follows redirects nor stores cookies.
    pub client: Client,
    /// Stub authorization server.
    pub auth: MockServer,
    /// Stub resource server.
    pub cms: MockServer,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with(|config| config).await
    }

    /// Start a new test server, letting the caller adjust its configuration.
    pub async fn start_with(customize: impl FnOnce(ServerConfig) -> ServerConfig) -> Result<Self> {
        let auth = MockServer::start().await;
        let cms = MockServer::start().await;

        let oauth = OAuthConfig::new(format!("{}{}", auth.uri(), TOKEN_PATH), "portal")
            .with_revoke_url(format!("{}{}", auth.uri(), REVOKE_PATH))
            .with_userinfo_url(format!("{}{}", auth.uri(), USERINFO_PATH));
        let tokens = create_token_service(oauth)?;

        let addr = find_available_port().await?;
        let config = customize(
            ServerConfig::new(Some(cms.uri()))
                .with_bind_address(addr)
                .with_request_logging(false),
        );

        let server = Server::new(config, tokens)?;
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            auth,
            cms,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// Requests the authorization server received on the token endpoint.
    pub async fn token_requests(&self) -> Vec<String> {
        self.auth
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == TOKEN_PATH)
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}

/// A token endpoint response body.
pub fn token_body(access: &str, expires_in: i64, refresh: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

/// A `Cookie` request header value.
pub fn cookie_header(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Session cookies whose access token lapsed ten seconds ago.
pub fn expired_session(access: &str, refresh: &str) -> String {
    cookie_header(&[
        ("accessToken", access.to_string()),
        ("accessTokenExpires", (now_ms() - 10_000).to_string()),
        ("refreshToken", refresh.to_string()),
    ])
}

/// Session cookies valid for another hour.
pub fn fresh_session(access: &str, refresh: &str) -> String {
    cookie_header(&[
        ("accessToken", access.to_string()),
        ("accessTokenExpires", (now_ms() + 3_600_000).to_string()),
        ("refreshToken", refresh.to_string()),
    ])
}

/// Parse every `Set-Cookie` header of a response.
pub fn set_cookies(response: &reqwest::Response) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_string()).ok())
        .collect()
}

/// The value set for `name`, if the response set it.
pub fn cookie_value(cookies: &[Cookie<'static>], name: &str) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
