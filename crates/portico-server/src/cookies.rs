//! Cookie-backed credential store.
//!
//! Three cookies hold a session: the access token (`HttpOnly`), its expiry
//! in Unix milliseconds (readable by page scripts so the UI can tell a
//! session is about to lapse), and the refresh token (`HttpOnly`). All are
//! site-wide, `SameSite=Lax`, and `Secure` outside plaintext development.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use portico_oauth::{SessionCredentials, TokenBundle, expires_at_ms, now_ms};
use time::OffsetDateTime;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const ACCESS_TOKEN_EXPIRES_COOKIE: &str = "accessTokenExpires";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

const ALL_COOKIES: [&str; 3] = [
    ACCESS_TOKEN_COOKIE,
    ACCESS_TOKEN_EXPIRES_COOKIE,
    REFRESH_TOKEN_COOKIE,
];

/// Reads and writes [`SessionCredentials`] through a [`CookieJar`].
#[derive(Debug, Clone, Copy)]
pub struct CredentialStore {
    secure: bool,
}

impl CredentialStore {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Extract credentials from the request's cookies. Missing, empty or
    /// malformed values read as absent.
    pub fn read(&self, jar: &CookieJar) -> SessionCredentials {
        let value = |name: &str| {
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        };

        SessionCredentials {
            access_token: value(ACCESS_TOKEN_COOKIE),
            access_token_expires_at: value(ACCESS_TOKEN_EXPIRES_COOKIE)
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0),
            refresh_token: value(REFRESH_TOKEN_COOKIE),
        }
    }

    /// Store a freshly issued access token, expiring `expires_in_secs` from now.
    pub fn write(
        &self,
        jar: CookieJar,
        access_token: &str,
        expires_in_secs: i64,
        refresh_token: Option<&str>,
    ) -> CookieJar {
        self.write_at(jar, now_ms(), access_token, expires_in_secs, refresh_token)
    }

    /// Store a grant result. Keeps `presented_refresh` when the grant did not
    /// rotate the refresh token.
    pub fn write_bundle(
        &self,
        jar: CookieJar,
        bundle: &TokenBundle,
        presented_refresh: Option<&str>,
    ) -> CookieJar {
        let refresh = bundle.refresh_token_or(presented_refresh);
        self.write(
            jar,
            &bundle.access_token,
            bundle.expires_in,
            refresh.as_deref(),
        )
    }

    pub(crate) fn write_at(
        &self,
        jar: CookieJar,
        now_ms: i64,
        access_token: &str,
        expires_in_secs: i64,
        refresh_token: Option<&str>,
    ) -> CookieJar {
        let expires_at = expires_at_ms(now_ms, expires_in_secs);

        let mut access = self.cookie(ACCESS_TOKEN_COOKIE, access_token.to_string());
        if let Ok(at) = OffsetDateTime::from_unix_timestamp_nanos(i128::from(expires_at) * 1_000_000)
        {
            access.set_expires(at);
        }

        let mut expiry = self.cookie(ACCESS_TOKEN_EXPIRES_COOKIE, expires_at.to_string());
        expiry.set_http_only(false);

        let mut jar = jar.add(access).add(expiry);
        if let Some(refresh) = refresh_token.filter(|r| !r.is_empty()) {
            jar = jar.add(self.cookie(REFRESH_TOKEN_COOKIE, refresh.to_string()));
        }
        jar
    }

    /// Expire all three cookies. Always emits the removals, so it is safe to
    /// call with an empty jar.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        ALL_COOKIES.into_iter().fold(jar, |jar, name| {
            let mut removal = self.cookie(name, String::new());
            removal.make_removal();
            jar.add(removal)
        })
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}
