// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory SSO service for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::rpc::{
    AdminRequest, AdminResponse, AppCredentials, ConnectError, Connector, IdentityAuthority,
    RegisterAppRequest, RpcCode, RpcStatus,
};
use crate::auth::Principal;

/// Shared state of the fake service. Every connection sees the same apps
/// and levels.
#[derive(Default)]
pub struct FakeAuthority {
    apps: Mutex<HashMap<String, AppCredentials>>,
    levels: Mutex<HashMap<AdminRequest, i32>>,
    register_failure: Mutex<Option<RpcStatus>>,
    admin_failures: Mutex<VecDeque<RpcStatus>>,
    admin_delay: Mutex<Option<Duration>>,
    api_keys: Mutex<Vec<Option<String>>>,
    pub register_calls: AtomicU32,
    pub admin_calls: AtomicU32,
    /// Admin calls dropped before they answered.
    pub admin_cancelled: AtomicU32,
}

impl FakeAuthority {
    pub fn set_level(&self, principal: Principal, level: i32) {
        self.levels
            .lock()
            .unwrap()
            .insert(AdminRequest::from(&principal), level);
    }

    /// Fail every `RegisterApp` call with `status`.
    pub fn fail_register(&self, status: RpcStatus) {
        *self.register_failure.lock().unwrap() = Some(status);
    }

    /// Fail the next `Admin` call with `status`. Queued failures are used in
    /// order.
    pub fn push_admin_failure(&self, status: RpcStatus) {
        self.admin_failures.lock().unwrap().push_back(status);
    }

    /// Delay every `Admin` call, e.g. past the per-attempt timeout.
    pub fn delay_admin(&self, delay: Duration) {
        *self.admin_delay.lock().unwrap() = Some(delay);
    }

    /// API keys presented on `Admin` calls, in order.
    pub fn seen_api_keys(&self) -> Vec<Option<String>> {
        self.api_keys.lock().unwrap().clone()
    }
}

pub struct FakeConnector {
    authority: Arc<FakeAuthority>,
    reachable: bool,
}

impl FakeConnector {
    pub fn new(authority: Arc<FakeAuthority>) -> Self {
        Self {
            authority,
            reachable: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            authority: Arc::new(FakeAuthority::default()),
            reachable: false,
        }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, api_key: Option<&str>) -> Result<Arc<dyn IdentityAuthority>, ConnectError> {
        if !self.reachable {
            return Err(ConnectError("connection refused".to_string()));
        }
        Ok(Arc::new(FakeConnection {
            authority: self.authority.clone(),
            api_key: api_key.map(str::to_string),
        }))
    }
}

struct FakeConnection {
    authority: Arc<FakeAuthority>,
    api_key: Option<String>,
}

#[async_trait]
impl IdentityAuthority for FakeConnection {
    async fn register_app(
        &self,
        request: &RegisterAppRequest,
    ) -> Result<AppCredentials, RpcStatus> {
        let n = self.authority.register_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(status) = self.authority.register_failure.lock().unwrap().clone() {
            return Err(status);
        }

        let mut apps = self.authority.apps.lock().unwrap();
        if let Some(existing) = apps.get(&request.name) {
            let details = serde_json::to_value(existing).unwrap();
            return Err(
                RpcStatus::new(RpcCode::AlreadyExists, "app already exists").with_details(details)
            );
        }

        let credentials = AppCredentials {
            api_key: format!("api-{n}"),
            user_key: format!("user-{n}"),
        };
        apps.insert(request.name.clone(), credentials.clone());
        Ok(credentials)
    }

    async fn admin(&self, request: &AdminRequest) -> Result<AdminResponse, RpcStatus> {
        self.authority.admin_calls.fetch_add(1, Ordering::SeqCst);
        self.authority
            .api_keys
            .lock()
            .unwrap()
            .push(self.api_key.clone());

        let delay = *self.authority.admin_delay.lock().unwrap();
        if let Some(delay) = delay {
            let pending = Pending(&self.authority.admin_cancelled);
            tokio::time::sleep(delay).await;
            std::mem::forget(pending);
        }

        if self.api_key.is_none() {
            return Err(RpcStatus::new(RpcCode::Unauthenticated, "missing api key"));
        }

        let failure = self.authority.admin_failures.lock().unwrap().pop_front();
        if let Some(status) = failure {
            return Err(status);
        }

        match self.authority.levels.lock().unwrap().get(request) {
            Some(level) => Ok(AdminResponse { level: *level }),
            None => Err(RpcStatus::new(RpcCode::NotFound, "user not found")),
        }
    }
}

/// Counts a call as cancelled when dropped while still waiting.
struct Pending<'a>(&'a AtomicU32);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}
