// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization gateway middleware for Axum.
//!
//! Runs in front of every route and attaches an [`AuthorizationDecision`] to
//! the request extensions. It never rejects: routes that need an admin
//! enforce the decision with the `AdminOnly` extractor, everything else
//! ignores it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let gateway = AuthGateway::new(TokenCodec::new(&user_key), sso, PrincipalLookup::Id);
//!
//! let app = Router::new()
//!     .route("/url/{alias}", delete(delete_url))
//!     .layer(axum::middleware::from_fn_with_state(gateway, auth_gateway));
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::decision::{AuthorizationDecision, Principal, UndeterminedReason};
use super::token::{PrincipalLookup, TokenCodec};
use crate::sso::SsoError;

/// Answers "is this principal an admin".
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn is_admin(&self, principal: &Principal) -> Result<bool, SsoError>;
}

/// Gateway configuration shared by all requests.
#[derive(Clone)]
pub struct AuthGateway {
    codec: TokenCodec,
    permissions: Arc<dyn PermissionProvider>,
    lookup: PrincipalLookup,
    lookup_budget: Option<Duration>,
}

impl AuthGateway {
    pub fn new(
        codec: TokenCodec,
        permissions: Arc<dyn PermissionProvider>,
        lookup: PrincipalLookup,
    ) -> Self {
        Self {
            codec,
            permissions,
            lookup,
            lookup_budget: None,
        }
    }

    /// Give up on the SSO service after `budget`, retries included.
    ///
    /// Must be shorter than the request timeout, otherwise a slow SSO
    /// service fails the whole request instead of yielding a remote-error
    /// decision.
    pub fn with_lookup_budget(mut self, budget: Duration) -> Self {
        self.lookup_budget = Some(budget);
        self
    }

    async fn lookup(&self, principal: &Principal) -> Result<bool, String> {
        let lookup = self.permissions.is_admin(principal);
        let outcome = match self.lookup_budget {
            Some(budget) => tokio::time::timeout(budget, lookup)
                .await
                .map_err(|_| format!("no answer within {budget:?}"))?,
            None => lookup.await,
        };
        outcome.map_err(|e| e.to_string())
    }

    /// Decide for a request with the given headers.
    ///
    /// The token is verified before the SSO service is asked, and the SSO
    /// answer (or exhausted retries, or the lookup budget) comes back before
    /// the decision is returned.
    pub async fn decide(&self, headers: &HeaderMap) -> AuthorizationDecision {
        let Some(raw) = extract_bearer_token(headers) else {
            debug!("no bearer token");
            return AuthorizationDecision::undetermined(UndeterminedReason::Absent);
        };

        let credential = match self.codec.parse(raw) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "failed to parse token");
                return AuthorizationDecision::undetermined(UndeterminedReason::Invalid);
            }
        };

        if credential.is_expired_at(Utc::now()) {
            warn!(
                uid = credential.uid,
                expired_at = %credential.expires_at,
                "token expired"
            );
            return AuthorizationDecision::undetermined(UndeterminedReason::Invalid);
        }

        let principal = credential.principal(self.lookup);
        let decision = match self.lookup(&principal).await {
            Ok(true) => AuthorizationDecision::Admin { principal },
            Ok(false) => AuthorizationDecision::NotAdmin { principal },
            Err(e) => {
                error!(error = %e, principal = %principal, "failed to check if user is admin");
                return AuthorizationDecision::undetermined(UndeterminedReason::RemoteError);
            }
        };
        info!(
            uid = credential.uid,
            email = %credential.email,
            expires_at = %credential.expires_at,
            level_claim = credential.level,
            is_admin = decision.is_admin(),
            "user authorized"
        );
        decision
    }
}

/// Authorization gateway middleware function.
pub async fn auth_gateway(
    State(gateway): State<AuthGateway>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = gateway.decide(request.headers()).await;
    request.extensions_mut().insert(decision);
    next.run(request).await
}

/// The token from an `Authorization: Bearer <token>` header.
///
/// Anything that is not exactly two space-separated parts with a `Bearer`
/// scheme counts as no credential.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;

    let mut parts = value.split(' ');
    let (scheme, token) = (parts.next()?, parts.next()?);
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
