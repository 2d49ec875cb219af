// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Decides, for every request, whether the caller is an admin.
//!
//! ## Flow
//!
//! 1. Client sends `Authorization: Bearer <JWT>` issued by the SSO service
//! 2. The gateway verifies the token with this app's verification key
//! 3. The SSO service is asked for the principal's level (with retries)
//! 4. The resulting [`AuthorizationDecision`] rides in the request extensions
//!
//! ## Security
//!
//! - The gateway never rejects; only privileged handlers enforce the decision
//! - Expired or forged tokens never reach the SSO service
//! - Every denial answers with the same generic 403 body

pub mod decision;
pub mod error;
pub mod extractor;
pub mod middleware;
pub mod token;

pub use decision::{check_permission, AuthorizationDecision, Principal, UndeterminedReason};
pub use error::AuthError;
pub use extractor::AdminOnly;
pub use middleware::{auth_gateway, AuthGateway, PermissionProvider};
pub use token::{Credential, ParsePrincipalLookupError, PrincipalLookup, TokenCodec, TokenError};
