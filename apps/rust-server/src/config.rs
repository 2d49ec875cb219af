// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed [`Config`] parsed from
//! them at startup. An invalid value is a startup error, never a silent
//! fallback.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_NAME` | Name this app registers with the SSO service under | `url-shortener` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8085` |
//! | `DATA_DIR` | Directory holding the link database | `./data` |
//! | `ALIAS_LENGTH` | Length of generated aliases | `6` |
//! | `REQUEST_TIMEOUT_MS` | Whole-request timeout | `5000` |
//! | `SSO_ADDRESS` | Base URL of the SSO service | Required |
//! | `SSO_INSECURE` | Accept invalid TLS certificates from the SSO service | `false` |
//! | `SSO_TIMEOUT_MS` | Timeout of one SSO call attempt | `2000` |
//! | `SSO_RETRIES_COUNT` | Maximum attempts per SSO call | `3` |
//! | `ADMIN_LEVEL_THRESHOLD` | Admin iff level is strictly above this | `1` |
//! | `PRINCIPAL_LOOKUP` | Identity sent to the SSO service (`id` or `email`) | `id` |
//! | `JWT_SECRET` | Token verification key | Registered user key |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::PrincipalLookup;
use crate::sso::{RetryPolicy, SsoSettings};

pub const APP_NAME_ENV: &str = "APP_NAME";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory holding `storage.redb`. Created on startup if missing.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const ALIAS_LENGTH_ENV: &str = "ALIAS_LENGTH";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "REQUEST_TIMEOUT_MS";
pub const SSO_ADDRESS_ENV: &str = "SSO_ADDRESS";
pub const SSO_INSECURE_ENV: &str = "SSO_INSECURE";
pub const SSO_TIMEOUT_MS_ENV: &str = "SSO_TIMEOUT_MS";
pub const SSO_RETRIES_COUNT_ENV: &str = "SSO_RETRIES_COUNT";
pub const ADMIN_LEVEL_THRESHOLD_ENV: &str = "ADMIN_LEVEL_THRESHOLD";
pub const PRINCIPAL_LOOKUP_ENV: &str = "PRINCIPAL_LOOKUP";

/// Overrides the verification key handed out at registration.
///
/// Only needed when tokens are signed with a key other than the registered
/// user key, e.g. a shared secret across several deployments.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_APP_NAME: &str = "url-shortener";
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 8085;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_ALIAS_LENGTH: usize = 6;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SSO_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SSO_RETRIES_COUNT: u32 = 3;
pub const DEFAULT_ADMIN_LEVEL_THRESHOLD: i32 = 1;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Share of `REQUEST_TIMEOUT_MS` the gateway may spend on SSO lookups.
pub const AUTHORIZATION_BUDGET_PERCENT: u32 = 80;

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "storage.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub alias_length: usize,
    pub request_timeout: Duration,
    pub sso_address: String,
    pub sso_insecure: bool,
    pub sso_timeout: Duration,
    pub sso_retries_count: u32,
    pub admin_level_threshold: i32,
    pub principal_lookup: PrincipalLookup,
    pub jwt_secret: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host: IpAddr = parse_or(&get, HOST_ENV, DEFAULT_HOST)?;
        let port: u16 = parse_or(&get, PORT_ENV, DEFAULT_PORT)?;

        let alias_length: usize = parse_or(&get, ALIAS_LENGTH_ENV, DEFAULT_ALIAS_LENGTH)?;
        if alias_length == 0 {
            return Err(invalid(ALIAS_LENGTH_ENV, "0", "must be positive"));
        }

        let sso_retries_count: u32 =
            parse_or(&get, SSO_RETRIES_COUNT_ENV, DEFAULT_SSO_RETRIES_COUNT)?;
        if sso_retries_count == 0 {
            return Err(invalid(SSO_RETRIES_COUNT_ENV, "0", "must be positive"));
        }

        let request_timeout_ms: u64 =
            parse_or(&get, REQUEST_TIMEOUT_MS_ENV, DEFAULT_REQUEST_TIMEOUT_MS)?;
        if request_timeout_ms == 0 {
            return Err(invalid(REQUEST_TIMEOUT_MS_ENV, "0", "must be positive"));
        }

        let sso_timeout_ms: u64 = parse_or(&get, SSO_TIMEOUT_MS_ENV, DEFAULT_SSO_TIMEOUT_MS)?;
        if sso_timeout_ms == 0 {
            return Err(invalid(SSO_TIMEOUT_MS_ENV, "0", "must be positive"));
        }

        let principal_lookup: PrincipalLookup =
            parse_or(&get, PRINCIPAL_LOOKUP_ENV, PrincipalLookup::default())?;

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, other, "expected json or pretty")),
        };

        Ok(Self {
            app_name: get(APP_NAME_ENV).unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            bind_addr: SocketAddr::new(host, port),
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            alias_length,
            request_timeout: Duration::from_millis(request_timeout_ms),
            sso_address: get(SSO_ADDRESS_ENV).ok_or(ConfigError::Missing(SSO_ADDRESS_ENV))?,
            sso_insecure: parse_or(&get, SSO_INSECURE_ENV, false)?,
            sso_timeout: Duration::from_millis(sso_timeout_ms),
            sso_retries_count,
            admin_level_threshold: parse_or(
                &get,
                ADMIN_LEVEL_THRESHOLD_ENV,
                DEFAULT_ADMIN_LEVEL_THRESHOLD,
            )?,
            principal_lookup,
            jwt_secret: get(JWT_SECRET_ENV),
            log_format,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// How long the gateway may wait for the SSO service on one request.
    ///
    /// A fixed share of the request timeout, so that a slow SSO service ends
    /// in a remote-error decision while the handler still has time to run.
    pub fn authorization_budget(&self) -> Duration {
        self.request_timeout * AUTHORIZATION_BUDGET_PERCENT / 100
    }

    pub fn sso_settings(&self) -> SsoSettings {
        SsoSettings {
            app_name: self.app_name.clone(),
            retry: RetryPolicy::new(self.sso_retries_count, self.sso_timeout),
            admin_level_threshold: self.admin_level_threshold,
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &value, e.to_string())),
        None => Ok(default),
    }
}
