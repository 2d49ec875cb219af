// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message returned for every denied privileged action.
pub const DENIAL_MESSAGE: &str = "don't have permission to action";

/// Reason a privileged action was denied.
///
/// The variants are distinguished in logs only. Every variant renders the
/// same 403 response so clients learn nothing about the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer credential was presented
    MissingCredential,
    /// Credential failed verification or has expired
    InvalidCredential,
    /// The SSO service could not be asked
    AdminCheckFailed,
    /// The SSO service says the principal is not an admin
    PermissionDenied,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
}

impl AuthError {
    /// Get the error code for this error (for logs).
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::InvalidCredential => "invalid_credential",
            AuthError::AdminCheckFailed => "admin_check_failed",
            AuthError::PermissionDenied => "permission_denied",
        }
    }

    /// Whether the denial was an explicit decision rather than a failure to
    /// decide.
    pub fn is_explicit(&self) -> bool {
        matches!(self, AuthError::PermissionDenied)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => write!(f, "no bearer credential presented"),
            AuthError::InvalidCredential => write!(f, "invalid token"),
            AuthError::AdminCheckFailed => write!(f, "failed to check if user is admin"),
            AuthError::PermissionDenied => write!(f, "user is not an admin"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(AuthErrorBody {
            error: DENIAL_MESSAGE,
        });
        (StatusCode::FORBIDDEN, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn every_variant_renders_the_same_denial() {
        for err in [
            AuthError::MissingCredential,
            AuthError::InvalidCredential,
            AuthError::AdminCheckFailed,
            AuthError::PermissionDenied,
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);

            let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
            assert_eq!(body, serde_json::json!({ "error": DENIAL_MESSAGE }));
        }
    }

    #[test]
    fn only_permission_denied_is_explicit() {
        assert!(AuthError::PermissionDenied.is_explicit());
        assert!(!AuthError::AdminCheckFailed.is_explicit());
        assert_eq!(AuthError::AdminCheckFailed.error_code(), "admin_check_failed");
    }
}
