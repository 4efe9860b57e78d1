// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use futures_util::{FutureExt, future::BoxFuture};
use uaa_storage::{
    BoxRepository, MapErr, Repository, RepositoryAccess, RepositoryError, RepositoryTransaction,
    oauth2::{AuthorizationCodeRepository, ClientRepository},
    revocation::RevocationRepository,
    user::UserRepository,
    zone::ZoneRepository,
};

use crate::{
    MemoryStoreError,
    oauth2::{MemoryAuthorizationCodeRepository, MemoryClientRepository},
    revocation::MemoryRevocationRepository,
    state::State,
    user::MemoryUserRepository,
    zone::MemoryZoneRepository,
};

/// An implementation of the [`Repository`] trait backed by a
/// [`MemoryStore`](crate::MemoryStore)
pub struct MemoryRepository {
    state: Arc<State>,
}

impl MemoryRepository {
    pub(crate) fn new(state: Arc<State>) -> Self {
        Self { state }
    }

    /// Transform the repository into a type-erased [`BoxRepository`]
    #[must_use]
    pub fn boxed(self) -> BoxRepository {
        Box::new(MapErr::new(self, RepositoryError::from_error))
    }
}

impl Repository<MemoryStoreError> for MemoryRepository {}

impl RepositoryTransaction for MemoryRepository {
    type Error = MemoryStoreError;

    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        tracing::debug!("memory.save");
        futures_util::future::ok(()).boxed()
    }

    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        // Writes were already applied, there is nothing to roll back
        tracing::debug!("memory.cancel");
        futures_util::future::ok(()).boxed()
    }
}

impl RepositoryAccess for MemoryRepository {
    type Error = MemoryStoreError;

    fn zones<'c>(&'c mut self) -> Box<dyn ZoneRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryZoneRepository::new(&self.state))
    }

    fn users<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryUserRepository::new(&self.state))
    }

    fn clients<'c>(&'c mut self) -> Box<dyn ClientRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryClientRepository::new(&self.state))
    }

    fn authorization_codes<'c>(
        &'c mut self,
    ) -> Box<dyn AuthorizationCodeRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryAuthorizationCodeRepository::new(&self.state))
    }

    fn revocations<'c>(&'c mut self) -> Box<dyn RevocationRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryRevocationRepository::new(&self.state))
    }
}
