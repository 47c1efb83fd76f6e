//! Session endpoints: login, logout, refresh and an identity check.
//!
//! None of these keep server-side state. The session is whatever the
//! browser's cookies say it is.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::header::ACCEPT,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use portico_oauth::TokenTypeHint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::cookies::CredentialStore;
use crate::error::{Result, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Login credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    /// Profile from the userinfo endpoint, when it answered.
    pub user: Option<Value>,
}

/// Bare acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

/// Identity check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugResponse {
    pub user: Option<Value>,
    #[serde(rename = "permissionCheck")]
    pub permission_check: PermissionCheck,
}

/// Outcome of a GET against the configured check path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCheck {
    pub status: u16,
    pub data: Option<Value>,
}

fn store(state: &AppState) -> CredentialStore {
    CredentialStore::new(state.config().secure_cookies())
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /auth/login - Exchange username/password for a cookie session.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let (Some(username), Some(password)) = (
        request.username.filter(|u| !u.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ServerError::BadRequest(
            "username and password required".to_string(),
        ));
    };

    let bundle = state
        .tokens
        .password_grant(&username, &password)
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let user = state
        .tokens
        .user_info(&bundle.access_token)
        .await
        .unwrap_or_else(|e| {
            debug!(error = %e, "Userinfo lookup failed after login");
            None
        });

    info!(username = %username, "Login succeeded");
    let jar = store(&state).write_bundle(jar, &bundle, None);
    Ok((jar, Json(LoginResponse { ok: true, user })))
}

/// POST /auth/logout - Revoke what can be revoked and clear the cookies.
///
/// Always succeeds, even with no session or an unreachable revocation
/// endpoint.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<OkResponse>) {
    let store = store(&state);
    let credentials = store.read(&jar);

    if let Some(refresh) = &credentials.refresh_token {
        state.tokens.revoke(refresh, TokenTypeHint::RefreshToken).await;
    }
    if let Some(access) = &credentials.access_token {
        state.tokens.revoke(access, TokenTypeHint::AccessToken).await;
    }

    (store.clear(jar), OkResponse::ok())
}

/// POST /auth/refresh - Renew the access token from the refresh cookie.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<OkResponse>)> {
    let store = store(&state);
    let Some(presented) = store.read(&jar).refresh_token else {
        return Err(ServerError::Unauthorized("No refresh token".to_string()));
    };

    let bundle = state
        .tokens
        .refresh_grant(&presented)
        .await
        .map_err(|e| ServerError::Unauthorized(e.to_string()))?;

    Ok((store.write_bundle(jar, &bundle, Some(&presented)), OkResponse::ok()))
}

/// GET /auth/debug - Report who the access token belongs to and whether it
/// can read the checked resource.
pub async fn debug_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<DebugResponse>> {
    let Some(token) = store(&state).read(&jar).access_token else {
        return Err(ServerError::Unauthorized("No access token".to_string()));
    };

    let user = state
        .tokens
        .user_info(&token)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let base = state.config().api_base().ok_or_else(|| {
        ServerError::Config("Upstream API base URL is not configured".to_string())
    })?;
    let url = format!("{}{}", base, state.config().debug_check_path);

    let check = state
        .upstream
        .get(&url)
        .bearer_auth(&token)
        .header(ACCEPT, "application/vnd.api+json")
        .send()
        .await
        .map_err(|e| ServerError::Internal(format!("Permission check failed: {}", e)))?;

    let status = check.status().as_u16();
    let data = check.json::<Value>().await.ok();

    Ok(Json(DebugResponse {
        user,
        permission_check: PermissionCheck { status, data },
    }))
}

/// Create session routes, to be nested under `/auth`.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/refresh", post(refresh_handler))
        .route("/debug", get(debug_handler))
}
