// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-over-HTTP binding of the SSO contract.
//!
//! Each operation is a `POST {base}/{service}/{method}` with a JSON body.
//! Non-2xx replies carry `{"code", "message", "details"?}`; when the body is
//! missing or unreadable the HTTP status is mapped to a code instead.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use super::rpc::{
    AdminRequest, AdminResponse, AppCredentials, ConnectError, Connector, IdentityAuthority,
    RegisterAppRequest, RpcCode, RpcStatus,
};

const REGISTER_APP_METHOD: &str = "auth.Auth/RegisterApp";
const ADMIN_METHOD: &str = "auth.UserInfo/Admin";

/// Builds [`HttpIdentityAuthority`] connections to one base URL.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base: Url,
    insecure: bool,
}

impl HttpConnector {
    /// Validate `address` and prepare a connector for it.
    ///
    /// `insecure` disables TLS certificate verification.
    pub fn new(address: &str, insecure: bool) -> Result<Self, ConnectError> {
        let mut base = Url::parse(address)
            .map_err(|e| ConnectError(format!("invalid address {address:?}: {e}")))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ConnectError(format!(
                "unsupported scheme {:?} in {address:?}",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base, insecure })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl Connector for HttpConnector {
    fn connect(&self, api_key: Option<&str>) -> Result<Arc<dyn IdentityAuthority>, ConnectError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .build()
            .map_err(|e| ConnectError(format!("failed to build HTTP client: {e}")))?;

        Ok(Arc::new(HttpIdentityAuthority {
            base: self.base.clone(),
            http,
            api_key: api_key.map(str::to_string),
        }))
    }
}

/// One connection; cheap to share across tasks.
#[derive(Debug, Clone)]
pub struct HttpIdentityAuthority {
    base: Url,
    http: Client,
    api_key: Option<String>,
}

impl HttpIdentityAuthority {
    async fn invoke<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp, RpcStatus>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self
            .base
            .join(method)
            .map_err(|e| RpcStatus::new(RpcCode::Internal, format!("bad method url: {e}")))?;

        let mut builder = self.http.post(url).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(transport_status)?;
        let status = response.status();

        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| {
                RpcStatus::new(RpcCode::Internal, format!("invalid response body: {e}"))
            });
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(status_from_reply(status, &body))
    }
}

#[async_trait]
impl IdentityAuthority for HttpIdentityAuthority {
    async fn register_app(
        &self,
        request: &RegisterAppRequest,
    ) -> Result<AppCredentials, RpcStatus> {
        self.invoke(REGISTER_APP_METHOD, request).await
    }

    async fn admin(&self, request: &AdminRequest) -> Result<AdminResponse, RpcStatus> {
        self.invoke(ADMIN_METHOD, request).await
    }
}

fn transport_status(e: reqwest::Error) -> RpcStatus {
    let code = if e.is_timeout() {
        RpcCode::DeadlineExceeded
    } else if e.is_connect() {
        RpcCode::Unavailable
    } else {
        RpcCode::Unknown
    };
    RpcStatus::new(code, e.to_string())
}

fn status_from_reply(status: StatusCode, body: &[u8]) -> RpcStatus {
    if let Ok(rpc_status) = serde_json::from_slice::<RpcStatus>(body) {
        return rpc_status;
    }
    RpcStatus::new(code_for_http_status(status), format!("HTTP {status}"))
}

fn code_for_http_status(status: StatusCode) -> RpcCode {
    match status {
        StatusCode::BAD_REQUEST => RpcCode::InvalidArgument,
        StatusCode::UNAUTHORIZED => RpcCode::Unauthenticated,
        StatusCode::FORBIDDEN => RpcCode::PermissionDenied,
        StatusCode::NOT_FOUND => RpcCode::NotFound,
        StatusCode::CONFLICT => RpcCode::AlreadyExists,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RpcCode::DeadlineExceeded,
        StatusCode::TOO_MANY_REQUESTS => RpcCode::ResourceExhausted,
        StatusCode::SERVICE_UNAVAILABLE => RpcCode::Unavailable,
        _ => RpcCode::Internal,
    }
}
