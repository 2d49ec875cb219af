// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire contract with the SSO service.
//!
//! Two operations: `RegisterApp` (unauthenticated, once per app) and `Admin`
//! (authenticated with the app's API key, once per request). Failures are
//! reported as an [`RpcStatus`] carrying a gRPC-style [`RpcCode`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Principal;

/// Status code of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    Unavailable,
    Internal,
    Unauthenticated,
}

impl RpcCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcCode::Cancelled => "cancelled",
            RpcCode::Unknown => "unknown",
            RpcCode::InvalidArgument => "invalid_argument",
            RpcCode::DeadlineExceeded => "deadline_exceeded",
            RpcCode::NotFound => "not_found",
            RpcCode::AlreadyExists => "already_exists",
            RpcCode::PermissionDenied => "permission_denied",
            RpcCode::ResourceExhausted => "resource_exhausted",
            RpcCode::FailedPrecondition => "failed_precondition",
            RpcCode::Aborted => "aborted",
            RpcCode::Unavailable => "unavailable",
            RpcCode::Internal => "internal",
            RpcCode::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    pub code: RpcCode,
    #[serde(default)]
    pub message: String,
    /// Structured payload attached to the failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAppRequest {
    pub name: String,
}

/// Key material issued to a registered app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    pub api_key: String,
    pub user_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRequest {
    #[serde(rename = "uid")]
    Id(i64),
    Email(String),
}

impl From<&Principal> for AdminRequest {
    fn from(principal: &Principal) -> Self {
        match principal {
            Principal::Id(id) => AdminRequest::Id(*id),
            Principal::Email(email) => AdminRequest::Email(email.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminResponse {
    pub level: i32,
}

/// An open connection to the SSO service.
#[async_trait]
pub trait IdentityAuthority: Send + Sync {
    /// Register `name` as a client app. Fails with `AlreadyExists` when the
    /// name is taken.
    async fn register_app(&self, request: &RegisterAppRequest)
        -> Result<AppCredentials, RpcStatus>;

    /// Authorization level of a principal. Fails with `NotFound` when the
    /// principal is unknown.
    async fn admin(&self, request: &AdminRequest) -> Result<AdminResponse, RpcStatus>;
}

/// Error opening a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to connect to sso service: {0}")]
pub struct ConnectError(pub String);

/// Opens connections to the SSO service.
///
/// `api_key` is attached as a bearer credential to every call made through
/// the returned connection; `None` opens the unauthenticated connection used
/// for registration.
pub trait Connector: Send + Sync {
    fn connect(&self, api_key: Option<&str>) -> Result<Arc<dyn IdentityAuthority>, ConnectError>;
}
