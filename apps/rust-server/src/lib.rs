// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! URL Shortener - link service behind a remote-authorized request gateway
//!
//! Anyone can create and follow short links. Deleting one requires an admin,
//! as decided per request by the SSO service this app registers with on
//! first start.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification, the authorization gateway, permission checks
//! - `sso` - SSO client: registration, admin lookups, retries
//! - `storage` - Links and the SSO registration (redb)

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod alias;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod sso;
pub mod state;
pub mod storage;

use auth::{AuthGateway, TokenCodec};
use config::{Config, ConfigError, LogFormat, DEFAULT_LOG_FILTER};
use sso::{Connector, HttpConnector, SsoClient, SsoError};
use state::AppState;
use storage::{Storage, StorageError};

/// Reasons the service refuses to start serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("sso: {0}")]
    Sso(#[from] SsoError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Serve(#[source] std::io::Error),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}

/// Bootstrap against the SSO service, then serve until `shutdown` fires.
///
/// Nothing is served unless registration succeeded and the authenticated
/// connection is open.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), StartupError> {
    let storage = Arc::new(Storage::open(&config.database_path())?);
    info!(path = %config.database_path().display(), "storage opened");

    let connector = HttpConnector::new(&config.sso_address, config.sso_insecure)
        .map_err(SsoError::from)?;
    info!(sso = %connector.base(), "connecting to sso service");
    let app = build_app(&config, &connector, storage).await?;

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.bind_addr,
            source,
        })?;
    info!(addr = %config.bind_addr, "URL shortener listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("shutting down gracefully");
        })
        .await
        .map_err(StartupError::Serve)
}

/// Register with the SSO service and assemble the router.
pub async fn build_app(
    config: &Config,
    connector: &dyn Connector,
    storage: Arc<Storage>,
) -> Result<Router, StartupError> {
    let sso = SsoClient::bootstrap(config.sso_settings(), connector, &*storage).await?;
    info!(app = %sso.app_name(), "sso client ready");

    let verification_key = match &config.jwt_secret {
        Some(secret) => secret.clone(),
        None => sso.user_key().to_string(),
    };
    if verification_key.is_empty() {
        warn!("token verification key is empty; every credential will be rejected");
    }

    let budget = config.authorization_budget();
    let worst_case = config.sso_timeout.saturating_mul(config.sso_retries_count);
    if worst_case > budget {
        info!(
            ?budget,
            ?worst_case,
            "sso retries can outlast the authorization budget; slow lookups end as remote errors"
        );
    }

    let gateway = AuthGateway::new(
        TokenCodec::new(&verification_key),
        Arc::new(sso),
        config.principal_lookup,
    )
    .with_lookup_budget(budget);
    let state = AppState::new(storage).with_alias_length(config.alias_length);

    Ok(api::router(state, gateway, config.request_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::DENIAL_MESSAGE;
    use crate::auth::{token::sign_test_token, Principal};
    use crate::config::{DATA_DIR_ENV, JWT_SECRET_ENV, SSO_ADDRESS_ENV};
    use crate::sso::fake::{FakeAuthority, FakeConnector};
    use axum::body::{to_bytes, Body};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    /// Default timings, with only the addresses and the key filled in.
    fn default_config(dir: &TempDir) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            (SSO_ADDRESS_ENV, "http://sso:44044".to_string()),
            (DATA_DIR_ENV, dir.path().display().to_string()),
            (JWT_SECRET_ENV, SECRET.to_string()),
        ]);
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    async fn slow_sso_app(dir: &TempDir) -> (Router, Arc<Storage>, Arc<FakeAuthority>) {
        let config = default_config(dir);
        let storage = Arc::new(Storage::open(&config.database_path()).unwrap());
        let authority = Arc::new(FakeAuthority::default());
        authority.set_level(Principal::Id(7), 9);
        authority.delay_admin(Duration::from_secs(30));

        let app = build_app(&config, &FakeConnector::new(authority.clone()), storage.clone())
            .await
            .unwrap();
        (app, storage, authority)
    }

    fn admin_bearer() -> String {
        let token = sign_test_token(
            &json!({
                "uid": 7,
                "email": "7@x.com",
                "exp": chrono::Utc::now().timestamp() + 3600,
                "level": 9
            }),
            SECRET,
        );
        format!("Bearer {token}")
    }

    fn delete_request(alias: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(format!("/url/{alias}"))
            .header(AUTHORIZATION, admin_bearer())
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sso_with_default_timings_denies_delete_and_still_saves() {
        let dir = TempDir::new().unwrap();
        let (app, storage, authority) = slow_sso_app(&dir).await;
        storage.save_url("https://google.com", "kept").unwrap();

        let response = app.clone().oneshot(delete_request("kept")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": DENIAL_MESSAGE}));
        assert!(storage.get_url("kept").is_ok());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/url")
                    .header(CONTENT_TYPE, "application/json")
                    .header(AUTHORIZATION, admin_bearer())
                    .body(Body::from(
                        json!({"url": "https://example.com", "alias": "fresh"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(storage.get_url("fresh").is_ok());

        // Every lookup that did not answer in time was dropped, none left running.
        let calls = authority.admin_calls.load(Ordering::SeqCst);
        assert!(calls > 0);
        assert_eq!(authority.admin_cancelled.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_request_drops_the_sso_call() {
        let dir = TempDir::new().unwrap();
        let (app, _storage, authority) = slow_sso_app(&dir).await;

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            app.oneshot(delete_request("any")),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(authority.admin_calls.load(Ordering::SeqCst), 1);
        assert_eq!(authority.admin_cancelled.load(Ordering::SeqCst), 1);
    }
}
