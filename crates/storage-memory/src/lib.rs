// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An implementation of the storage traits, keeping everything in process
//! memory
//!
//! Each collection lives in a [`DashMap`], and uniqueness constraints are
//! enforced through secondary index maps, claimed with the entry API so that
//! two concurrent writers can't both win.
//!
//! Writes are applied as soon as they are made: saving a repository is a
//! no-op, and cancelling it does not roll anything back.
//!
//! [`DashMap`]: dashmap::DashMap

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use async_trait::async_trait;
use uaa_storage::{BoxRepository, RepositoryError, RepositoryFactory, user::UsernameScope};

mod oauth2;
mod repository;
mod revocation;
mod state;
mod user;
mod zone;

pub use self::{
    oauth2::{MemoryAuthorizationCodeRepository, MemoryClientRepository},
    repository::MemoryRepository,
    revocation::MemoryRevocationRepository,
    user::MemoryUserRepository,
    zone::MemoryZoneRepository,
};
use self::state::State;

/// Errors raised by the in-memory backend
#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    /// No more issuance sequence numbers can be handed out
    #[error("the issuance sequence is exhausted")]
    SequenceExhausted,
}

/// A store living in process memory, which also acts as a
/// [`RepositoryFactory`]
///
/// Cloning the store is cheap, and the clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<State>,
}

impl MemoryStore {
    /// Create an empty store, enforcing username uniqueness within the given
    /// scope
    #[must_use]
    pub fn new(username_scope: UsernameScope) -> Self {
        Self {
            state: Arc::new(State::new(username_scope)),
        }
    }

    /// Get a repository on this store
    #[must_use]
    pub fn repository(&self) -> MemoryRepository {
        MemoryRepository::new(Arc::clone(&self.state))
    }
}

#[async_trait]
impl RepositoryFactory for MemoryStore {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        Ok(self.repository().boxed())
    }
}
