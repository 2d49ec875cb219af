// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the link API. All types derive `ToSchema`
//! for the OpenAPI document.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to save a short link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveUrlRequest {
    /// Absolute `http` or `https` URL to shorten.
    pub url: String,
    /// Custom alias. Generated when omitted or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A saved short link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SaveUrlResponse {
    pub alias: String,
    pub url: String,
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}
