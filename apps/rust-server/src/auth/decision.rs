// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request authorization decision.
//!
//! The gateway inserts exactly one [`AuthorizationDecision`] into the request
//! extensions. Privileged handlers enforce it with [`check_permission`]; other
//! handlers never look at it.

use std::fmt;

use super::error::AuthError;

/// Identity looked up at the SSO service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    Id(i64),
    Email(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Id(id) => write!(f, "uid:{id}"),
            Principal::Email(email) => write!(f, "email:{email}"),
        }
    }
}

/// Why no admin/non-admin decision could be made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UndeterminedReason {
    /// No bearer credential on the request
    Absent,
    /// Credential failed verification or has expired
    Invalid,
    /// The SSO service could not answer within the retry budget
    RemoteError,
}

impl UndeterminedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UndeterminedReason::Absent => "absent",
            UndeterminedReason::Invalid => "invalid",
            UndeterminedReason::RemoteError => "remote-error",
        }
    }
}

impl fmt::Display for UndeterminedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Admin { principal: Principal },
    NotAdmin { principal: Principal },
    Undetermined { reason: UndeterminedReason },
}

impl AuthorizationDecision {
    pub fn undetermined(reason: UndeterminedReason) -> Self {
        AuthorizationDecision::Undetermined { reason }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AuthorizationDecision::Admin { .. })
    }

    /// The principal, when the request carried a usable credential.
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthorizationDecision::Admin { principal }
            | AuthorizationDecision::NotAdmin { principal } => Some(principal),
            AuthorizationDecision::Undetermined { .. } => None,
        }
    }
}

impl Default for AuthorizationDecision {
    /// A request that never went through the gateway carries no credential.
    fn default() -> Self {
        AuthorizationDecision::undetermined(UndeterminedReason::Absent)
    }
}

/// Require an admin decision.
///
/// Anything other than [`AuthorizationDecision::Admin`] is a denial. The
/// returned error keeps the reason for logging; its HTTP rendering does not.
pub fn check_permission(decision: &AuthorizationDecision) -> Result<&Principal, AuthError> {
    match decision {
        AuthorizationDecision::Admin { principal } => Ok(principal),
        AuthorizationDecision::NotAdmin { .. } => Err(AuthError::PermissionDenied),
        AuthorizationDecision::Undetermined { reason } => Err(match reason {
            UndeterminedReason::Absent => AuthError::MissingCredential,
            UndeterminedReason::Invalid => AuthError::InvalidCredential,
            UndeterminedReason::RemoteError => AuthError::AdminCheckFailed,
        }),
    }
}
