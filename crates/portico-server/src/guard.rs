//! Session guard for UI pages.
//!
//! Requests without an access-token cookie are redirected to the login page.
//! The login page itself and static assets stay reachable.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::cookies::ACCESS_TOKEN_COOKIE;

/// Where unauthenticated page requests are sent.
pub const LOGIN_PATH: &str = "/login";

const PUBLIC_PATHS: [&str; 3] = [LOGIN_PATH, "/login.html", "/favicon.ico"];
const PUBLIC_PREFIXES: [&str; 1] = ["/assets/"];

/// Paths served without a session.
pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Redirect to [`LOGIN_PATH`] unless the request has an access token or
/// targets a public path.
///
/// Only presence is checked. An expired token still passes: the page's
/// proxied calls refresh it.
pub async fn session_guard(jar: CookieJar, request: Request, next: Next) -> Response {
    let has_token = jar
        .get(ACCESS_TOKEN_COOKIE)
        .is_some_and(|c| !c.value().is_empty());

    if has_token || is_public(request.uri().path()) {
        return next.run(request).await;
    }

    tracing::debug!(path = %request.uri().path(), "No session; redirecting to login");
    Redirect::to(LOGIN_PATH).into_response()
}
