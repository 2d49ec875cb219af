// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token parsing and verification.
//!
//! Tokens are HS256-signed JWTs issued by the SSO service. The signature is
//! verified against the app's user key (or `JWT_SECRET` when configured).
//!
//! ## Expiry
//!
//! The codec does not reject expired tokens. `exp` is surfaced on the parsed
//! [`Credential`] and the gateway decides what an expired token means.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::decision::Principal;

/// Token verification failure.
///
/// Every variant means "invalid token"; the variants only exist so that the
/// cause can be logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a compact JWS, or the header/payload could not be decoded
    #[error("token is malformed")]
    Malformed,
    /// Signature does not verify with the configured key
    #[error("token signature is invalid")]
    InvalidSignature,
    /// Token was signed with an algorithm other than HS256
    #[error("token algorithm is not accepted")]
    InvalidAlgorithm,
    /// A required claim is missing or has the wrong type
    #[error("token claims are invalid: {0}")]
    InvalidClaims(String),
}

/// Wire representation of the claims. All four are required.
#[derive(Debug, Deserialize)]
struct RawClaims {
    uid: i64,
    email: String,
    exp: i64,
    level: i32,
}

/// Claims of a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Numeric user id (`uid` claim)
    pub uid: i64,
    /// User email (`email` claim)
    pub email: String,
    /// Expiration (`exp` claim)
    pub expires_at: DateTime<Utc>,
    /// Authorization level embedded by the issuer (`level` claim).
    ///
    /// Informational only: admin status is always looked up remotely.
    pub level: i32,
}

impl Credential {
    /// Whether the token had expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The principal to look up for this credential.
    pub fn principal(&self, lookup: PrincipalLookup) -> Principal {
        match lookup {
            PrincipalLookup::Id => Principal::Id(self.uid),
            PrincipalLookup::Email => Principal::Email(self.email.clone()),
        }
    }
}

/// Which claim identifies the principal towards the SSO service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrincipalLookup {
    #[default]
    Id,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown principal lookup {0:?}, expected id or email")]
pub struct ParsePrincipalLookupError(String);

impl FromStr for PrincipalLookup {
    type Err = ParsePrincipalLookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" | "uid" => Ok(PrincipalLookup::Id),
            "email" => Ok(PrincipalLookup::Email),
            _ => Err(ParsePrincipalLookupError(s.to_string())),
        }
    }
}

/// Verifies tokens against a single symmetric key.
#[derive(Clone)]
pub struct TokenCodec {
    key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(verification_key: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(verification_key.as_bytes()),
            validation,
        }
    }

    /// Verify `raw` and extract its claims.
    pub fn parse(&self, raw: &str) -> Result<Credential, TokenError> {
        let token_data =
            decode::<RawClaims>(raw, &self.key, &self.validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
                ErrorKind::Json(err) => TokenError::InvalidClaims(err.to_string()),
                ErrorKind::MissingRequiredClaim(claim) => {
                    TokenError::InvalidClaims(format!("missing {claim}"))
                }
                _ => TokenError::Malformed,
            })?;

        let claims = token_data.claims;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::InvalidClaims("exp out of range".to_string()))?;

        Ok(Credential {
            uid: claims.uid,
            email: claims.email,
            expires_at,
            level: claims.level,
        })
    }
}

/// Verify `raw` with `verification_key` in one call.
pub fn parse(raw: &str, verification_key: &str) -> Result<Credential, TokenError> {
    TokenCodec::new(verification_key).parse(raw)
}

/// Sign arbitrary claims with HS256. Test tokens only.
#[cfg(test)]
pub(crate) fn sign_test_token(claims: &serde_json::Value, key: &str) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(key.as_bytes()),
    )
    .expect("sign test token")
}
