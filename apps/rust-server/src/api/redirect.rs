// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::{error::ApiError, state::AppState, storage::StorageError};

#[utoipa::path(
    get,
    path = "/{alias}",
    params(
        ("alias" = String, Path, description = "Alias of the link to follow")
    ),
    tag = "Links",
    responses(
        (status = 302, description = "Redirect to the saved URL"),
        (status = 404, description = "Unknown alias")
    )
)]
pub async fn redirect(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<Response, ApiError> {
    let url = match state.storage.get_url(&alias) {
        Ok(url) => url,
        Err(StorageError::NotFound(_)) => {
            info!(alias = %alias, "url not found");
            return Err(ApiError::not_found("url not found"));
        }
        Err(e) => return Err(e.into()),
    };

    info!(alias = %alias, url = %url, "got url");
    Ok((StatusCode::FOUND, [(LOCATION, url)]).into_response())
}
