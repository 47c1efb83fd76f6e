//! Forwarding proxy for the CMS resource server.
//!
//! `ANY /proxy/{*path}` is relayed to `<api base>/<path>?<query>` with the
//! session's access token attached. Each request runs a fixed sequence:
//!
//! 1. pre-flight: no access token but a refresh token → refresh first
//! 2. first attempt
//! 3. recovery: on 401/403, or when the token was already known to be
//!    stale, refresh once and resend once
//! 4. buffer the final upstream response and relay it
//!
//! Any renewed credentials are written back as cookies on the way out.
//! Concurrent requests from one session refresh independently.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
        header::{ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, HOST},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use portico_oauth::{SessionCredentials, TokenBundle, now_ms};
use reqwest::Client;
use tracing::{debug, warn};

use crate::cookies::CredentialStore;
use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Route prefix stripped before joining with the upstream base.
pub const PROXY_PREFIX: &str = "/proxy";

/// Headers that only describe a single connection.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// ─────────────────────────────────────────────────────────────────────────────
// Forward request
// ─────────────────────────────────────────────────────────────────────────────

/// An incoming request, prepared for resending to the resource server.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    pub fn new(method: Method, url: String, headers: &HeaderMap, body: Bytes) -> Self {
        let body = carries_body(&method).then_some(body);
        Self {
            method,
            url,
            headers: forward_headers(headers),
            body,
        }
    }

    /// Send once, with `Authorization: Bearer <token>` when a token is given.
    /// Redirects are returned, not followed.
    pub async fn send(
        &self,
        client: &Client,
        access_token: Option<&str>,
    ) -> reqwest::Result<reqwest::Response> {
        let mut headers = self.headers.clone();
        if let Some(token) = access_token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Access token is not a valid header value; sending without it"),
            }
        }

        let mut builder = client
            .request(self.method.clone(), &self.url)
            .headers(headers);
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder.send().await
    }
}

/// Join the upstream base, the path after the proxy prefix, and the query.
pub fn target_url(base: &str, suffix: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{}{}?{}", base, suffix, query),
        None => format!("{}{}", base, suffix),
    }
}

/// GET and HEAD never carry a body upstream.
fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// Copy request headers minus `host`, hop-by-hop headers and
/// `content-length` (recomputed when sending). `accept-encoding` is dropped
/// so the buffered body relayed back is never compressed.
fn forward_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    out.remove(HOST);
    out.remove(CONTENT_LENGTH);
    out.remove(ACCEPT_ENCODING);
    strip_hop_by_hop(&mut out);
    out
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(HeaderName::from_static(name));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relayed response
// ─────────────────────────────────────────────────────────────────────────────

/// A fully buffered upstream response.
#[derive(Debug)]
pub struct Relayed {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Relayed {
    /// Buffer the whole body. The body is no longer chunked or encoded after
    /// this, so `transfer-encoding` and `content-encoding` are dropped and
    /// `content-length` is set to the buffered size.
    pub async fn buffer(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let mut headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ServerError::Upstream(format!("Failed to read upstream response: {}", e)))?;

        strip_hop_by_hop(&mut headers);
        headers.remove(CONTENT_ENCODING);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        Ok(Self {
            status,
            headers,
            body,
        })
    }
}

impl IntoResponse for Relayed {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh-and-retry state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials obtained by a refresh during this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewal {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

impl Renewal {
    fn from_bundle(bundle: TokenBundle, presented: &str) -> Self {
        let refresh_token = bundle.refresh_token_or(Some(presented));
        Self {
            access_token: bundle.access_token,
            expires_in: bundle.expires_in,
            refresh_token,
        }
    }
}

/// What to do after the first attempt.
#[derive(Debug, PartialEq, Eq)]
enum Recovery {
    /// The first response is final.
    Done,
    /// Refresh with this token and resend once.
    RefreshAndRetry(String),
}

fn classify(status: StatusCode, need_refresh: bool, refresh_token: Option<&str>) -> Recovery {
    let rejected = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
    match refresh_token {
        Some(token) if rejected || need_refresh => Recovery::RefreshAndRetry(token.to_string()),
        _ => Recovery::Done,
    }
}

/// Result of a proxied exchange.
///
/// `renewal` is kept even when `response` is an error: a refresh that
/// succeeded may have rotated the refresh token, and the client must get
/// the new one either way.
#[derive(Debug)]
pub struct ProxyOutcome {
    pub response: Result<Relayed>,
    pub renewal: Option<Renewal>,
}

/// Relay `request` upstream on behalf of a session, refreshing its access
/// token at most once per attempt phase and resending at most once.
pub async fn forward_with_refresh(
    state: &AppState,
    request: &ForwardRequest,
    credentials: SessionCredentials,
    now_ms: i64,
) -> ProxyOutcome {
    let mut need_refresh = credentials.needs_refresh(now_ms);
    let mut access_token = credentials.access_token;
    let mut refresh_token = credentials.refresh_token;
    let mut renewal: Option<Renewal> = None;

    // Pre-flight: a request without an access token would certainly fail.
    if access_token.is_none()
        && let Some(presented) = refresh_token.clone()
    {
        match state.tokens.refresh_grant(&presented).await {
            Ok(bundle) => {
                let renewed = Renewal::from_bundle(bundle, &presented);
                access_token = Some(renewed.access_token.clone());
                refresh_token = renewed.refresh_token.clone();
                renewal = Some(renewed);
                need_refresh = false;
            }
            Err(e) => debug!(error = %e, "Pre-flight refresh failed; forwarding without a token"),
        }
    }

    let first = match request.send(&state.upstream, access_token.as_deref()).await {
        Ok(first) => first,
        Err(e) => {
            return ProxyOutcome {
                response: Err(ServerError::Upstream(format!(
                    "Upstream request failed: {}",
                    e
                ))),
                renewal,
            };
        }
    };

    let response = match classify(first.status(), need_refresh, refresh_token.as_deref()) {
        Recovery::Done => first,
        Recovery::RefreshAndRetry(presented) => {
            debug!(status = %first.status(), need_refresh, "Refreshing token and retrying");
            match state.tokens.refresh_grant(&presented).await {
                Ok(bundle) => {
                    let renewed = Renewal::from_bundle(bundle, &presented);
                    let retry = request
                        .send(&state.upstream, Some(renewed.access_token.as_str()))
                        .await;
                    renewal = Some(renewed);
                    match retry {
                        Ok(second) => second,
                        Err(e) => {
                            warn!(error = %e, "Retry after refresh failed; relaying first response");
                            first
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed; relaying first response");
                    first
                }
            }
        }
    };

    let relayed = match Relayed::buffer(response).await {
        Ok(relayed) => relayed,
        Err(e) => {
            return ProxyOutcome {
                response: Err(e),
                renewal,
            };
        }
    };
    if relayed.status.is_client_error() || relayed.status.is_server_error() {
        warn!(
            method = %request.method,
            target = %request.url,
            status = %relayed.status,
            body_len = relayed.body.len(),
            "Upstream returned an error"
        );
    } else {
        debug!(
            method = %request.method,
            target = %request.url,
            status = %relayed.status,
            body_len = relayed.body.len(),
            "Upstream response"
        );
    }

    ProxyOutcome {
        response: Ok(relayed),
        renewal,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler
// ─────────────────────────────────────────────────────────────────────────────

/// ANY /proxy/{*path} - Relay to the resource server.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Response)> {
    let base = state.config().api_base().ok_or_else(|| {
        ServerError::Config("Upstream API base URL is not configured".to_string())
    })?;
    let suffix = uri.path().strip_prefix(PROXY_PREFIX).unwrap_or_default();
    let url = target_url(base, suffix, uri.query());
    let request = ForwardRequest::new(method, url, &headers, body);

    let store = CredentialStore::new(state.config().secure_cookies());
    let credentials = store.read(&jar);
    let outcome = forward_with_refresh(&state, &request, credentials, now_ms()).await;

    let jar = match &outcome.renewal {
        Some(renewal) => store.write(
            jar,
            &renewal.access_token,
            renewal.expires_in,
            renewal.refresh_token.as_deref(),
        ),
        None => jar,
    };
    Ok((jar, outcome.response.into_response()))
}
