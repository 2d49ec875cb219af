// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single redb file under `DATA_DIR`:
//!
//! ```text
//! $DATA_DIR/
//!   storage.redb
//!     links     alias → { url, created_at }
//!     clients   app name → { name, api_key, user_key }
//! ```
//!
//! Aliases and client names are unique; inserting a duplicate fails with
//! `StorageError::AlreadyExists` instead of overwriting.

pub mod database;

pub use database::{RegisteredClient, Storage, StorageError, StorageResult, StoredLink};
