// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use url::Url;

use crate::{
    alias::random_alias,
    auth::AdminOnly,
    error::ApiError,
    models::{SaveUrlRequest, SaveUrlResponse},
    state::AppState,
    storage::StorageError,
};

/// Generated aliases tried before giving up on a crowded keyspace.
const MAX_ALIAS_ATTEMPTS: usize = 10;

fn validate_url(raw: &str) -> Result<(), ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::bad_request("field url is a required field"));
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ApiError::bad_request("field url is not a valid URL")),
    }
}

fn validate_alias(alias: &str) -> Result<(), ApiError> {
    if alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "alias may only contain letters, digits, '-' and '_'",
        ))
    }
}

#[utoipa::path(
    post,
    path = "/url",
    request_body = SaveUrlRequest,
    tag = "Links",
    responses(
        (status = 201, body = SaveUrlResponse),
        (status = 400, description = "Invalid URL or alias"),
        (status = 409, description = "Alias already taken")
    )
)]
pub async fn save_url(
    State(state): State<AppState>,
    Json(request): Json<SaveUrlRequest>,
) -> Result<(StatusCode, Json<SaveUrlResponse>), ApiError> {
    validate_url(&request.url)?;

    let alias = match request.alias.as_deref().map(str::trim) {
        Some(alias) if !alias.is_empty() => {
            validate_alias(alias)?;
            match state.storage.save_url(&request.url, alias) {
                Ok(_) => alias.to_string(),
                Err(StorageError::AlreadyExists(_)) => {
                    info!(alias, "alias already exists");
                    return Err(ApiError::conflict("alias already exists"));
                }
                Err(e) => return Err(e.into()),
            }
        }
        _ => save_with_generated_alias(&state, &request.url)?,
    };

    info!(alias = %alias, url = %request.url, "url added");
    Ok((
        StatusCode::CREATED,
        Json(SaveUrlResponse {
            alias,
            url: request.url,
        }),
    ))
}

fn save_with_generated_alias(state: &AppState, url: &str) -> Result<String, ApiError> {
    for _ in 0..MAX_ALIAS_ATTEMPTS {
        let alias = random_alias(state.alias_length);
        match state.storage.save_url(url, &alias) {
            Ok(_) => return Ok(alias),
            Err(StorageError::AlreadyExists(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    warn!(
        alias_length = state.alias_length,
        "no free alias after {MAX_ALIAS_ATTEMPTS} attempts"
    );
    Err(ApiError::internal())
}

#[utoipa::path(
    delete,
    path = "/url/{alias}",
    params(
        ("alias" = String, Path, description = "Alias of the link to delete")
    ),
    tag = "Links",
    security(("bearerAuth" = [])),
    responses(
        (status = 204, description = "Link deleted or never existed"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn delete_url(
    AdminOnly(principal): AdminOnly,
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.storage.delete_url(&alias) {
        Ok(()) => info!(alias = %alias, principal = %principal, "url deleted"),
        Err(StorageError::NotFound(_)) => info!(alias = %alias, "url not found"),
        Err(e) => return Err(e.into()),
    }
    Ok(StatusCode::NO_CONTENT)
}
