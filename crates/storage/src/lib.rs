// Copyright 2024 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Interactions with the storage backend
//!
//! This crate provides a set of traits that can be implemented to interact with
//! the storage backend. Those traits are called repositories and are grouped by
//! the type of data they manage: zones, users, clients, authorization codes
//! and revocations.
//!
//! Each of those repositories can be accessed via the [`RepositoryAccess`]
//! trait. This trait can be wrapped in a [`BoxRepository`] to allow using it
//! without caring about the underlying storage backend, and without carrying
//! around the generic type parameter. A [`RepositoryFactory`] hands out a
//! fresh repository for each operation.
//!
//! # Conventions
//!
//!   1. Every repository defines an associated error type, and all functions
//!      are fallible and use that error type
//!   2. Lookups return a `Result<Option<T>, Self::Error>`, because 'not found'
//!      errors are handled differently by each caller
//!   3. Writes which must respect a uniqueness constraint (zone subdomain,
//!      username, client ID) report a conflict in their return value, never
//!      as an error: an `Option` for insertions, an [`Update`] for updates
//!   4. Operations that need to record the current time use a `Clock`
//!      parameter. Operations that need to generate new IDs also use a random
//!      number generator.
//!   5. All the methods use an `&mut self`. This ensures only one operation is
//!      done at a time on a single repository instance.
//!   6. Everything is scoped by a zone ID, except the zones themselves and
//!      the revocation records, whose targets carry the zone ID.

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod oauth2;
pub mod pagination;
pub(crate) mod repository;
pub mod revocation;
pub mod user;
mod utils;
pub mod zone;

pub use self::{
    pagination::{Page, Pagination},
    repository::{
        BoxRepository, BoxRepositoryFactory, Repository, RepositoryAccess, RepositoryError,
        RepositoryFactory, RepositoryTransaction,
    },
    utils::MapErr,
};

/// The outcome of an update guarded by a uniqueness constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<T> {
    /// The new value was saved
    Updated(T),

    /// There is no record to update
    NotFound,

    /// Another record already holds the unique value
    Conflict,
}

impl<T> Update<T> {
    /// Returns the updated value, if any
    #[must_use]
    pub fn updated(self) -> Option<T> {
        match self {
            Self::Updated(value) => Some(value),
            Self::NotFound | Self::Conflict => None,
        }
    }
}
