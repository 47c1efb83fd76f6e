//! OAuth 2.0 password and refresh-token grants against the CMS authorization server.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{GrantKind, OAuthError, Result};

/// OAuth client configuration for the upstream authorization server.
#[derive(Debug, Clone, Default)]
pub struct OAuthConfig {
    pub token_url: String,
    pub revoke_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

impl OAuthConfig {
    /// Create a config for the given token endpoint and client id.
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// Set the revocation endpoint. Without one, revocation is a no-op.
    pub fn with_revoke_url(mut self, url: impl Into<String>) -> Self {
        self.revoke_url = Some(url.into());
        self
    }

    /// Set the userinfo endpoint used after login.
    pub fn with_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = Some(url.into());
        self
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Check the required fields once, at startup.
    pub fn validate(&self) -> Result<()> {
        if self.token_url.trim().is_empty() {
            return Err(OAuthError::Config("token endpoint URL is not set".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::Config("client id is not set".to_string()));
        }
        Ok(())
    }

    /// Append client credentials to a form.
    fn push_client<'a>(&'a self, params: &mut Vec<(&'static str, &'a str)>) {
        params.push(("client_id", &self.client_id));
        if let Some(secret) = non_empty(&self.client_secret) {
            params.push(("client_secret", secret));
        }
    }

    pub(crate) fn password_form<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ];
        self.push_client(&mut params);
        if let Some(scope) = non_empty(&self.scope) {
            params.push(("scope", scope));
        }
        params
    }

    pub(crate) fn refresh_form<'a>(&'a self, refresh_token: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.push_client(&mut params);
        params
    }

    pub(crate) fn revoke_form<'a>(
        &'a self,
        token: &'a str,
        hint: TokenTypeHint,
    ) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("token", token), ("token_type_hint", hint.as_str())];
        self.push_client(&mut params);
        params
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Tokens issued by a successful grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenBundle {
    /// The refresh token to keep after this grant: the issued one, or the
    /// one that was presented when the server did not rotate it.
    pub fn refresh_token_or(&self, presented: Option<&str>) -> Option<String> {
        self.refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| presented.map(str::to_string))
    }
}

/// `token_type_hint` values for revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenTypeHint::AccessToken => "access_token",
            TokenTypeHint::RefreshToken => "refresh_token",
        }
    }
}

/// Exchange a username and password for tokens.
pub async fn password_grant(
    client: &Client,
    config: &OAuthConfig,
    username: &str,
    password: &str,
) -> Result<TokenBundle> {
    let form = config.password_form(username, password);
    request_tokens(client, config, GrantKind::Password, &form).await
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_grant(
    client: &Client,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenBundle> {
    let form = config.refresh_form(refresh_token);
    request_tokens(client, config, GrantKind::Refresh, &form).await
}

async fn request_tokens(
    client: &Client,
    config: &OAuthConfig,
    kind: GrantKind,
    form: &[(&'static str, &str)],
) -> Result<TokenBundle> {
    let response = client
        .post(&config.token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| OAuthError::Network(format!("{} grant request failed: {}", kind, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OAuthError::Grant {
            kind,
            status: status.as_u16(),
            body,
        });
    }

    response.json::<TokenBundle>().await.map_err(|e| {
        OAuthError::Serialization(format!("Failed to parse {} grant response: {}", kind, e))
    })
}

/// Revoke a token. Returns `Ok(false)` when no revocation endpoint is configured.
pub async fn revoke_token(
    client: &Client,
    config: &OAuthConfig,
    token: &str,
    hint: TokenTypeHint,
) -> Result<bool> {
    let Some(url) = non_empty(&config.revoke_url) else {
        return Ok(false);
    };

    let response = client
        .post(url)
        .form(&config.revoke_form(token, hint))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(OAuthError::Revocation {
            status: status.as_u16(),
        });
    }
    Ok(true)
}

/// Fetch the profile of the user owning `access_token`.
///
/// `Ok(None)` when no userinfo endpoint is configured or the server
/// answers non-2xx or with a body that is not JSON.
pub async fn fetch_user_info(
    client: &Client,
    config: &OAuthConfig,
    access_token: &str,
) -> Result<Option<serde_json::Value>> {
    let Some(url) = non_empty(&config.userinfo_url) else {
        return Ok(None);
    };

    let response = client.get(url).bearer_auth(access_token).send().await?;
    if !response.status().is_success() {
        return Ok(None);
    }
    Ok(response.json::<serde_json::Value>().await.ok())
}
