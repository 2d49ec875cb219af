// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors over the gateway's decision.
//!
//! Use `AdminOnly` in handlers that perform privileged actions:
//!
//! ```rust,ignore
//! async fn delete_url(AdminOnly(principal): AdminOnly, Path(alias): Path<String>) {
//!     // only admins reach here
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::decision::{check_permission, AuthorizationDecision, Principal};
use super::AuthError;

impl<S> FromRequestParts<S> for AuthorizationDecision
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthorizationDecision>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor that requires an admin decision.
///
/// Rejects with a generic 403; the specific reason is logged here.
pub struct AdminOnly(pub Principal);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(decision) = AuthorizationDecision::from_request_parts(parts, state).await;

        match check_permission(&decision) {
            Ok(principal) => Ok(AdminOnly(principal.clone())),
            Err(e) => {
                warn!(
                    reason = e.error_code(),
                    explicit = e.is_explicit(),
                    principal = ?decision.principal(),
                    path = %parts.uri.path(),
                    "privileged action denied: {e}"
                );
                Err(e)
            }
        }
    }
}
