// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded link database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `links`: alias → serialized StoredLink
//! - `clients`: app name → serialized RegisteredClient

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::sso::ClientRegistry;

// =============================================================================
// Table Definitions
// =============================================================================

/// Short links: alias → StoredLink (JSON bytes).
const LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("links");

/// SSO registrations: app name → RegisteredClient (JSON bytes).
const CLIENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("clients");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Records
// =============================================================================

/// A saved short link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLink {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// This app's registration with the SSO service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    /// Unique app name
    pub name: String,
    /// Bearer credential for calls to the SSO service
    pub api_key: String,
    /// Key the SSO service signs this app's user tokens with
    pub user_key: String,
}

// =============================================================================
// Storage
// =============================================================================

pub struct Storage {
    db: Database,
}

impl Storage {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LINKS)?;
            let _ = write_txn.open_table(CLIENTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Save `url` under `alias`. Fails with `AlreadyExists` if the alias is
    /// taken.
    pub fn save_url(&self, url: &str, alias: &str) -> StorageResult<StoredLink> {
        let link = StoredLink {
            url: url.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&link)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(LINKS)?;
            if table.get(alias)?.is_some() {
                return Err(StorageError::AlreadyExists(format!("alias {alias}")));
            }
            table.insert(alias, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(link)
    }

    /// Look up the URL saved under `alias`.
    pub fn get_url(&self, alias: &str) -> StorageResult<String> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LINKS)?;
        match table.get(alias)? {
            Some(value) => {
                let link: StoredLink = serde_json::from_slice(value.value())?;
                Ok(link.url)
            }
            None => Err(StorageError::NotFound(format!("alias {alias}"))),
        }
    }

    /// Delete the link saved under `alias`.
    pub fn delete_url(&self, alias: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        let removed = write_txn.open_table(LINKS)?.remove(alias)?.is_some();
        if !removed {
            return Err(StorageError::NotFound(format!("alias {alias}")));
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Persist a registration. Fails with `AlreadyExists` if one with the same
    /// name is stored.
    pub fn save_client(&self, client: &RegisteredClient) -> StorageResult<()> {
        let json = serde_json::to_vec(client)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CLIENTS)?;
            if table.get(client.name.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("client {}", client.name)));
            }
            table.insert(client.name.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load the registration stored under `name`.
    pub fn client(&self, name: &str) -> StorageResult<RegisteredClient> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLIENTS)?;
        match table.get(name)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(StorageError::NotFound(format!("client {name}"))),
        }
    }

    /// All stored registrations.
    #[cfg(test)]
    pub fn clients(&self) -> StorageResult<Vec<RegisteredClient>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLIENTS)?;

        let mut clients = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            clients.push(serde_json::from_slice(value.value())?);
        }
        Ok(clients)
    }
}

impl ClientRegistry for Storage {
    fn client(&self, name: &str) -> Result<RegisteredClient, StorageError> {
        Storage::client(self, name)
    }

    fn save_client(&self, client: &RegisteredClient) -> Result<(), StorageError> {
        Storage::save_client(self, client)
    }
}
