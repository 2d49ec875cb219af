// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SSO client: one-time app registration and per-request admin lookups.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::retry::RetryPolicy;
use super::rpc::{
    AdminRequest, AppCredentials, ConnectError, Connector, IdentityAuthority, RegisterAppRequest,
    RpcCode, RpcStatus,
};
use crate::auth::{PermissionProvider, Principal};
use crate::storage::{RegisteredClient, StorageError};

/// Persistence of this app's registration.
///
/// `client` fails with [`StorageError::NotFound`] when nothing is stored and
/// `save_client` with [`StorageError::AlreadyExists`] on a duplicate name.
pub trait ClientRegistry: Send + Sync {
    fn client(&self, name: &str) -> Result<RegisteredClient, StorageError>;
    fn save_client(&self, client: &RegisteredClient) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    #[error("{op}: {status}")]
    Rpc {
        op: &'static str,
        #[source]
        status: RpcStatus,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("client registry: {0}")]
    Registry(#[from] StorageError),
}

/// Settings for [`SsoClient::bootstrap`].
#[derive(Debug, Clone)]
pub struct SsoSettings {
    /// Name this app registers under
    pub app_name: String,
    pub retry: RetryPolicy,
    /// A principal is an admin when its level is strictly above this
    pub admin_level_threshold: i32,
}

pub struct SsoClient {
    api: Arc<dyn IdentityAuthority>,
    retry: RetryPolicy,
    admin_level_threshold: i32,
    registration: RegisteredClient,
}

impl SsoClient {
    /// Load or create this app's registration, then open the authenticated
    /// connection.
    ///
    /// Safe to run from several processes at once against the same registry
    /// and SSO service: `AlreadyExists` from either side counts as success.
    pub async fn bootstrap(
        settings: SsoSettings,
        connector: &dyn Connector,
        registry: &dyn ClientRegistry,
    ) -> Result<Self, SsoError> {
        let registration = match registry.client(&settings.app_name) {
            Ok(client) => {
                info!(app = %client.name, "using stored sso registration");
                client
            }
            Err(StorageError::NotFound(_)) => {
                info!(app = %settings.app_name, "registering app with sso service");
                let anonymous = connector.connect(None).inspect_err(|e| {
                    error!(error = %e, "connection to sso service failed");
                })?;
                match register_app(anonymous.as_ref(), &settings.retry, &settings.app_name)
                    .await?
                {
                    Some(credentials) => {
                        persist_registration(registry, &settings.app_name, credentials)?
                    }
                    // Not persisted, so the next start registers again.
                    None => RegisteredClient {
                        name: settings.app_name.clone(),
                        api_key: String::new(),
                        user_key: String::new(),
                    },
                }
            }
            Err(e) => return Err(SsoError::Registry(e)),
        };

        let api = connector
            .connect(Some(&registration.api_key))
            .inspect_err(|e| {
                error!(error = %e, "connection to sso service failed");
            })?;

        Ok(Self {
            api,
            retry: settings.retry,
            admin_level_threshold: settings.admin_level_threshold,
            registration,
        })
    }

    /// Whether `principal` is an admin according to the SSO service.
    ///
    /// An unknown principal is not an admin; that is not an error.
    pub async fn is_admin(&self, principal: &Principal) -> Result<bool, SsoError> {
        const OP: &str = "sso.is_admin";

        let request = AdminRequest::from(principal);
        match self.retry.call(OP, || self.api.admin(&request)).await {
            Ok(response) => Ok(response.level > self.admin_level_threshold),
            Err(status) if status.code == RpcCode::NotFound => Ok(false),
            Err(status) => Err(SsoError::Rpc { op: OP, status }),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.registration.name
    }

    /// Key the SSO service signs this app's user tokens with.
    pub fn user_key(&self) -> &str {
        &self.registration.user_key
    }
}

#[async_trait]
impl PermissionProvider for SsoClient {
    async fn is_admin(&self, principal: &Principal) -> Result<bool, SsoError> {
        SsoClient::is_admin(self, principal).await
    }
}

/// `None` when the app is already registered and the SSO service did not
/// hand the existing keys back.
async fn register_app(
    api: &dyn IdentityAuthority,
    retry: &RetryPolicy,
    name: &str,
) -> Result<Option<AppCredentials>, SsoError> {
    const OP: &str = "sso.register_app";

    let request = RegisterAppRequest {
        name: name.to_string(),
    };
    match retry.call(OP, || api.register_app(&request)).await {
        Ok(credentials) => Ok(Some(credentials)),
        Err(status) if status.code == RpcCode::AlreadyExists => {
            let credentials = status
                .details
                .clone()
                .and_then(|details| serde_json::from_value::<AppCredentials>(details).ok());
            match credentials {
                Some(credentials) => {
                    info!(app = name, "app already registered, reusing returned keys");
                    Ok(Some(credentials))
                }
                None => {
                    warn!(
                        app = name,
                        "app already registered and no keys were returned; \
                         continuing without keys and not saving the registration"
                    );
                    Ok(None)
                }
            }
        }
        Err(status) => {
            error!(app = name, error = %status, "failed to register app");
            Err(SsoError::Rpc { op: OP, status })
        }
    }
}

/// Store the registration. When another process got there first, its record
/// wins.
fn persist_registration(
    registry: &dyn ClientRegistry,
    name: &str,
    credentials: AppCredentials,
) -> Result<RegisteredClient, SsoError> {
    let client = RegisteredClient {
        name: name.to_string(),
        api_key: credentials.api_key,
        user_key: credentials.user_key,
    };

    match registry.save_client(&client) {
        Ok(()) => Ok(client),
        Err(StorageError::AlreadyExists(_)) => {
            info!(app = name, "registration already persisted");
            match registry.client(name) {
                Ok(stored) => Ok(stored),
                Err(e) => {
                    warn!(
                        app = name,
                        error = %e,
                        "failed to read persisted registration, using the one just issued"
                    );
                    Ok(client)
                }
            }
        }
        Err(e) => {
            error!(app = name, error = %e, "failed to save client");
            Err(SsoError::Registry(e))
        }
    }
}
