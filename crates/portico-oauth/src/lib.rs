//! OAuth 2.0 client for the portico CMS front-end.
//!
//! Talks to the CMS authorization server on behalf of browser sessions
//! whose tokens live in cookies, never in server memory.
//!
//! # Components
//!
//! - [`oauth`]: password/refresh grants, revocation, userinfo
//! - [`token_service`]: the [`TokenService`] seam used by the HTTP layer
//! - [`credentials`]: client-held session values and expiry arithmetic

pub mod credentials;
pub mod error;
pub mod oauth;
pub mod token_service;

pub use credentials::{EXPIRY_SKEW_MS, SessionCredentials, expires_at_ms, now_ms};
pub use error::{GrantKind, OAuthError, Result};
pub use oauth::{OAuthConfig, TokenBundle, TokenTypeHint};
pub use token_service::{
    HttpTokenService, SharedTokenService, TokenService, create_token_service,
};
