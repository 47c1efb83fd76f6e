//! Error types for the OAuth client.

use std::fmt;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Which grant an authorization-server rejection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    Password,
    Refresh,
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantKind::Password => write!(f, "Password"),
            GrantKind::Refresh => write!(f, "Refresh"),
        }
    }
}

/// Errors that can occur talking to the authorization server.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Missing or invalid client configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The authorization server answered a grant with a non-2xx status.
    #[error("{kind} grant failed: {status} {body}")]
    Grant {
        kind: GrantKind,
        status: u16,
        body: String,
    },

    /// The revocation endpoint answered with a non-2xx status.
    #[error("Revocation rejected: {status}")]
    Revocation { status: u16 },

    /// Network/HTTP error reaching the authorization or resource server.
    #[error("Network error: {0}")]
    Network(String),

    /// A response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OAuthError {
    /// Upstream status code for grant and revocation rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            OAuthError::Grant { status, .. } | OAuthError::Revocation { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_error_message_carries_status_and_body() {
        let err = OAuthError::Grant {
            kind: GrantKind::Password,
            status: 401,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            r#"Password grant failed: 401 {"error":"invalid_grant"}"#
        );
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = OAuthError::Network("connection refused".to_string());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_revocation_error_carries_status() {
        let err = OAuthError::Revocation { status: 503 };
        assert_eq!(err.to_string(), "Revocation rejected: 503");
        assert_eq!(err.status(), Some(503));
    }
}
