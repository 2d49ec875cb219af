// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::DEFAULT_ALIAS_LENGTH;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    /// Length of generated aliases
    pub alias_length: usize,
}

impl AppState {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            alias_length: DEFAULT_ALIAS_LENGTH,
        }
    }

    pub fn with_alias_length(mut self, alias_length: usize) -> Self {
        self.alias_length = alias_length;
        self
    }
}
