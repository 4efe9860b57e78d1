// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use rand_core::RngCore;
use uaa_data_model::{Client, ClientRegistration, Clock, SecretHandle};
use ulid::Ulid;

use crate::{Page, Pagination, Update, repository_impl};

/// A [`ClientRepository`] helps interacting with [`Client`] saved in the
/// storage backend
///
/// Clients are addressed by their `client_id`, which is unique within a zone.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Client`] by its `client_id`, in a zone
    ///
    /// Returns `None` if no [`Client`] was found
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(
        &mut self,
        zone_id: Ulid,
        client_id: &str,
    ) -> Result<Option<Client>, Self::Error>;

    /// Register a new [`Client`] in a zone
    ///
    /// The plaintext secret of the registration is ignored: only the
    /// `secret` handle is stored. Returns `None` if the `client_id` is already
    /// registered in that zone.
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `zone_id`: The zone the client belongs to
    /// * `registration`: The validated registration
    /// * `secret`: The hashed client secret, if the client is confidential
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        registration: ClientRegistration,
        secret: Option<SecretHandle>,
    ) -> Result<Option<Client>, Self::Error>;

    /// Replace an existing [`Client`], keyed by its zone and ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn update(&mut self, client: Client) -> Result<Update<Client>, Self::Error>;

    /// Remove a [`Client`]
    ///
    /// Returns `false` if there was no such client in that zone
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove(&mut self, zone_id: Ulid, client_id: &str) -> Result<bool, Self::Error>;

    /// List the [`Client`]s of a zone, ordered by ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list(
        &mut self,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<Client>, Self::Error>;

    /// Remove every [`Client`] of a zone, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error>;
}

repository_impl!(ClientRepository:
    async fn lookup(
        &mut self,
        zone_id: Ulid,
        client_id: &str,
    ) -> Result<Option<Client>, Self::Error>;
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        registration: ClientRegistration,
        secret: Option<SecretHandle>,
    ) -> Result<Option<Client>, Self::Error>;
    async fn update(&mut self, client: Client) -> Result<Update<Client>, Self::Error>;
    async fn remove(&mut self, zone_id: Ulid, client_id: &str) -> Result<bool, Self::Error>;
    async fn list(
        &mut self,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<Client>, Self::Error>;
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error>;
);
