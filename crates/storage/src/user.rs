// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with user accounts

use async_trait::async_trait;
use rand_core::RngCore;
use uaa_data_model::{Clock, PendingUser, User};
use ulid::Ulid;

use crate::{Page, Pagination, Update, repository_impl};

/// Where usernames must be unique
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UsernameScope {
    /// Two zones may hold users with the same username
    #[default]
    Zone,

    /// A username may only be used once across all the zones
    Global,
}

/// A [`UserRepository`] helps interacting with [`User`] saved in the storage
/// backend
///
/// Usernames are compared case-insensitively, within the [`UsernameScope`]
/// the backend was configured with.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`User`] by its ID, in a zone
    ///
    /// Returns `None` if no [`User`] was found in that zone
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, zone_id: Ulid, id: Ulid) -> Result<Option<User>, Self::Error>;

    /// Find a [`User`] by its username, in a case-insensitive manner
    ///
    /// Returns `None` if no [`User`] was found in that zone
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_username(
        &mut self,
        zone_id: Ulid,
        username: &str,
    ) -> Result<Option<User>, Self::Error>;

    /// Persist a [`PendingUser`] in a zone
    ///
    /// Returns `None` if the username is already taken
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `zone_id`: The zone the user belongs to
    /// * `user`: The validated user to persist
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        user: PendingUser,
    ) -> Result<Option<User>, Self::Error>;

    /// Replace an existing [`User`], keyed by its zone and ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn update(&mut self, user: User) -> Result<Update<User>, Self::Error>;

    /// Remove a [`User`]
    ///
    /// Returns `false` if there was no such user in that zone
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove(&mut self, zone_id: Ulid, id: Ulid) -> Result<bool, Self::Error>;

    /// List the [`User`]s of a zone, ordered by ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list(
        &mut self,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<User>, Self::Error>;

    /// Remove every [`User`] of a zone, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error>;
}

repository_impl!(UserRepository:
    async fn lookup(&mut self, zone_id: Ulid, id: Ulid) -> Result<Option<User>, Self::Error>;
    async fn find_by_username(
        &mut self,
        zone_id: Ulid,
        username: &str,
    ) -> Result<Option<User>, Self::Error>;
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        user: PendingUser,
    ) -> Result<Option<User>, Self::Error>;
    async fn update(&mut self, user: User) -> Result<Update<User>, Self::Error>;
    async fn remove(&mut self, zone_id: Ulid, id: Ulid) -> Result<bool, Self::Error>;
    async fn list(
        &mut self,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<User>, Self::Error>;
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error>;
);
