// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with identity zones

use async_trait::async_trait;
use rand_core::RngCore;
use uaa_data_model::{Clock, IdentityZone, ZoneDefinition};
use ulid::Ulid;

use crate::{Page, Pagination, Update, repository_impl};

/// A [`ZoneRepository`] helps interacting with [`IdentityZone`] saved in the
/// storage backend
#[async_trait]
pub trait ZoneRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`IdentityZone`] by its ID
    ///
    /// Returns `None` if no [`IdentityZone`] was found
    ///
    /// # Parameters
    ///
    /// * `id`: The ID of the [`IdentityZone`] to lookup
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<IdentityZone>, Self::Error>;

    /// Find an [`IdentityZone`] by its subdomain
    ///
    /// Returns `None` if no [`IdentityZone`] was found
    ///
    /// # Parameters
    ///
    /// * `subdomain`: The normalized subdomain to look for
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_subdomain(
        &mut self,
        subdomain: &str,
    ) -> Result<Option<IdentityZone>, Self::Error>;

    /// Create a new [`IdentityZone`] from a validated definition
    ///
    /// Returns `None` if another zone already uses the same subdomain
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `definition`: The validated zone definition
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        definition: ZoneDefinition,
    ) -> Result<Option<IdentityZone>, Self::Error>;

    /// Replace an existing [`IdentityZone`], keyed by its ID
    ///
    /// # Parameters
    ///
    /// * `zone`: The new state of the zone
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn update(&mut self, zone: IdentityZone) -> Result<Update<IdentityZone>, Self::Error>;

    /// List [`IdentityZone`]s, ordered by ID
    ///
    /// # Parameters
    ///
    /// * `pagination`: The pagination parameters
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list(
        &mut self,
        pagination: Pagination,
    ) -> Result<Page<IdentityZone>, Self::Error>;

    /// Remove an [`IdentityZone`]
    ///
    /// Returns `false` if there was no such zone. This only removes the zone
    /// itself, not the entities it scopes.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove(&mut self, id: Ulid) -> Result<bool, Self::Error>;
}

repository_impl!(ZoneRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<IdentityZone>, Self::Error>;
    async fn find_by_subdomain(
        &mut self,
        subdomain: &str,
    ) -> Result<Option<IdentityZone>, Self::Error>;
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        definition: ZoneDefinition,
    ) -> Result<Option<IdentityZone>, Self::Error>;
    async fn update(&mut self, zone: IdentityZone) -> Result<Update<IdentityZone>, Self::Error>;
    async fn list(
        &mut self,
        pagination: Pagination,
    ) -> Result<Page<IdentityZone>, Self::Error>;
    async fn remove(&mut self, id: Ulid) -> Result<bool, Self::Error>;
);
