//! Client-held session credentials and their expiry arithmetic.
//!
//! The server keeps no session state: these values travel with each
//! request and response. Timestamps are Unix milliseconds.

/// Margin subtracted from the computed expiry so a token is never used
/// right at its expiry boundary.
pub const EXPIRY_SKEW_MS: i64 = 5_000;

/// The three values a client carries between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_token: Option<String>,
    pub access_token_expires_at: Option<i64>,
    pub refresh_token: Option<String>,
}

impl SessionCredentials {
    /// True when there is no access token or its expiry has passed.
    /// A missing expiry counts as expired.
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.access_token_expires_at {
            Some(expires_at) => now_ms > expires_at,
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Absolute expiry for a token issued at `now_ms` that lives `expires_in_secs`.
///
/// Saturates: `expires_in` comes from the authorization server unchecked.
pub fn expires_at_ms(now_ms: i64, expires_in_secs: i64) -> i64 {
    now_ms
        .saturating_add(expires_in_secs.saturating_mul(1000))
        .saturating_sub(EXPIRY_SKEW_MS)
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_applies_skew() {
        assert_eq!(expires_at_ms(1_000_000, 3600), 1_000_000 + 3_600_000 - 5_000);
        assert_eq!(expires_at_ms(10_000, 0), 5_000);
    }

    #[test]
    fn test_expiry_saturates_on_huge_lifetimes() {
        let now = 1_700_000_000_000;
        assert_eq!(expires_at_ms(now, i64::MAX), i64::MAX - EXPIRY_SKEW_MS);
        assert_eq!(expires_at_ms(now, i64::MAX / 1000), i64::MAX - EXPIRY_SKEW_MS);
        assert_eq!(expires_at_ms(now, i64::MIN), i64::MIN);

        let creds = SessionCredentials {
            access_token: Some("A1".to_string()),
            access_token_expires_at: Some(expires_at_ms(now, i64::MAX)),
            refresh_token: None,
        };
        assert!(!creds.needs_refresh(now));
    }

    #[test]
    fn test_needs_refresh() {
        let now = 1_700_000_000_000;
        let fresh = SessionCredentials {
            access_token: Some("A1".to_string()),
            access_token_expires_at: Some(now + 60_000),
            refresh_token: Some("R1".to_string()),
        };
        assert!(!fresh.needs_refresh(now));

        let expired = SessionCredentials {
            access_token_expires_at: Some(now - 10_000),
            ..fresh.clone()
        };
        assert!(expired.needs_refresh(now));

        let no_expiry = SessionCredentials {
            access_token_expires_at: None,
            ..fresh.clone()
        };
        assert!(no_expiry.needs_refresh(now));

        let no_token = SessionCredentials {
            access_token: None,
            ..fresh
        };
        assert!(no_token.needs_refresh(now));
    }

    #[test]
    fn test_exact_boundary_is_not_expired() {
        let creds = SessionCredentials {
            access_token: Some("A1".to_string()),
            access_token_expires_at: Some(500),
            refresh_token: None,
        };
        assert!(!creds.needs_refresh(500));
        assert!(creds.needs_refresh(501));
    }

    #[test]
    fn test_is_empty() {
        assert!(SessionCredentials::default().is_empty());
        let only_refresh = SessionCredentials {
            refresh_token: Some("R1".to_string()),
            ..Default::default()
        };
        assert!(!only_refresh.is_empty());
    }
}
