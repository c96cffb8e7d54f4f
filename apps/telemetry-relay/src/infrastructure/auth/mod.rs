//! Session Authentication
//!
//! Validates HS256 session tokens presented at the WebSocket handshake and
//! on privileged REST calls, and issues tokens for tests and operator
//! tooling.
//!
//! Claims are `{sub, iat, exp}` where `sub` is the account ID. Every
//! validation failure (expired, bad signature, malformed, missing subject)
//! collapses into [`AuthError::Unauthorized`]; the cause is logged at debug
//! level only.

use std::time::Duration;

use axum::http::{HeaderMap, header};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::asset::AccountId;
use crate::infrastructure::config::JwtSecret;

/// Session token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account ID.
    pub sub: String,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Token missing, expired, forged, or malformed.
    #[error("unauthorized")]
    Unauthorized,

    /// Token could not be signed.
    #[error("token generation failed: {0}")]
    Issue(String),
}

/// Validates and issues session tokens.
#[derive(Clone)]
pub struct SessionAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionAuthenticator {
    /// Create an authenticator with the given secret and token lifetime.
    #[must_use]
    pub fn new(secret: &JwtSecret, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Validate a token and return the account it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] for any invalid token.
    pub fn authenticate(&self, token: &str) -> Result<AccountId, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            let cause = match e.kind() {
                ErrorKind::ExpiredSignature => "expired",
                ErrorKind::InvalidSignature => "invalid signature",
                ErrorKind::InvalidAlgorithm => "algorithm mismatch",
                _ => "malformed",
            };
            tracing::debug!(cause, error = %e, "Rejected session token");
            AuthError::Unauthorized
        })?;

        if data.claims.sub.is_empty() {
            tracing::debug!(cause = "empty subject", "Rejected session token");
            return Err(AuthError::Unauthorized);
        }
        Ok(AccountId::new(data.claims.sub))
    }

    /// Mint a token for `account` with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Issue`] if signing fails.
    pub fn issue(&self, account: &AccountId) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = SessionClaims {
            sub: account.as_str().to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        };
        self.issue_with_claims(&claims)
    }

    /// Mint a token with explicit claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Issue`] if signing fails.
    pub fn issue_with_claims(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }
}

// =============================================================================
// Token Extraction
// =============================================================================

/// Extract a bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Extract the handshake token: the `token` query parameter, falling back
/// to the `Authorization` header.
#[must_use]
pub fn handshake_token<'a>(query_token: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    query_token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(headers))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests";

    fn authenticator() -> SessionAuthenticator {
        SessionAuthenticator::new(
            &JwtSecret::new(TEST_SECRET.to_string()),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn issue_and_authenticate() {
        let auth = authenticator();
        let token = auth.issue(&AccountId::new("acct-a")).unwrap();

        assert_eq!(auth.authenticate(&token), Ok(AccountId::new("acct-a")));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let auth = authenticator();
        let now = Utc::now().timestamp();
        let token = auth
            .issue_with_claims(&SessionClaims {
                sub: "acct-a".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert_eq!(auth.authenticate(&token), Err(AuthError::Unauthorized));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let other = SessionAuthenticator::new(
            &JwtSecret::new("another-secret".to_string()),
            Duration::from_secs(3600),
        );
        let token = other.issue(&AccountId::new("acct-a")).unwrap();

        assert_eq!(authenticator().authenticate(&token), Err(AuthError::Unauthorized));
    }

    #[test]
    fn garbage_and_empty_subject_are_unauthorized() {
        let auth = authenticator();
        assert_eq!(auth.authenticate("not.a.jwt"), Err(AuthError::Unauthorized));
        assert_eq!(auth.authenticate(""), Err(AuthError::Unauthorized));

        let now = Utc::now().timestamp();
        let token = auth
            .issue_with_claims(&SessionClaims {
                sub: String::new(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();
        assert_eq!(auth.authenticate(&token), Err(AuthError::Unauthorized));
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn handshake_prefers_query_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));

        assert_eq!(handshake_token(Some("from-query"), &headers), Some("from-query"));
        assert_eq!(handshake_token(Some(""), &headers), Some("from-header"));
        assert_eq!(handshake_token(None, &headers), Some("from-header"));
        assert_eq!(handshake_token(None, &HeaderMap::new()), None);
    }
}
