// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # SSO Client Module
//!
//! Talks to the remote SSO service that owns users and their authorization
//! levels.
//!
//! ## Lifecycle
//!
//! 1. On startup, look up this app's registration in the local registry
//! 2. If missing, register the app over an unauthenticated connection and
//!    persist the returned API key and user key
//! 3. Open the authenticated connection (API key as per-call bearer)
//! 4. Per request, ask for the principal's level and compare it with the
//!    admin threshold
//!
//! Every call goes through [`RetryPolicy`].

pub mod client;
pub mod http;
pub mod retry;
pub mod rpc;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{ClientRegistry, SsoClient, SsoError, SsoSettings};
pub use http::HttpConnector;
pub use retry::RetryPolicy;
pub use rpc::{Connector, IdentityAuthority, RpcCode, RpcStatus};
