// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::{
    oauth2::{AuthorizationCodeRepository, ClientRepository},
    revocation::RevocationRepository,
    user::UserRepository,
    zone::ZoneRepository,
};

/// A [`RepositoryFactory`] hands out a fresh [`BoxRepository`] for each
/// unit of work
#[async_trait]
pub trait RepositoryFactory {
    /// Create a new [`BoxRepository`]
    async fn create(&self) -> Result<BoxRepository, RepositoryError>;
}

/// A type-erased [`RepositoryFactory`]
pub type BoxRepositoryFactory = Box<dyn RepositoryFactory + Send + Sync + 'static>;

/// A [`Repository`] helps interacting with the underlying storage backend.
pub trait Repository<E>:
    RepositoryAccess<Error = E> + RepositoryTransaction<Error = E> + Send
where
    E: std::error::Error + Send + Sync + 'static,
{
}

/// An opaque, type-erased error
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RepositoryError {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl RepositoryError {
    /// Construct a [`RepositoryError`] from any error kind
    pub fn from_error<E>(value: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(value),
        }
    }
}

/// A type-erased [`Repository`]
pub type BoxRepository = Box<dyn Repository<RepositoryError> + Send + Sync + 'static>;

/// A [`RepositoryTransaction`] can be saved or cancelled, after a series
/// of operations.
pub trait RepositoryTransaction {
    /// The error type used by the [`Self::save`] and [`Self::cancel`]
    /// functions
    type Error;

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage backend failed to commit the
    /// transaction.
    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;

    /// Rollback the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage backend failed to rollback
    /// the transaction.
    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;
}

/// Access the various repositories the backend implements.
///
/// All the methods return a boxed trait object, which can be used to access a
/// particular repository. The lifetime of the returned object is bound to the
/// lifetime of the whole repository, so that only one mutable reference to the
/// repository is used at a time.
///
/// When adding a new repository, you should add a new method to this trait,
/// and update the implementations for [`MapErr`](crate::MapErr) and [`Box<R>`] below.
pub trait RepositoryAccess: Send {
    /// The backend-specific error type used by each repository.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get an [`ZoneRepository`]
    fn zones<'c>(&'c mut self) -> Box<dyn ZoneRepository<Error = Self::Error> + 'c>;

    /// Get an [`UserRepository`]
    fn users<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c>;

    /// Get an [`ClientRepository`]
    fn clients<'c>(&'c mut self) -> Box<dyn ClientRepository<Error = Self::Error> + 'c>;

    /// Get an [`AuthorizationCodeRepository`]
    fn authorization_codes<'c>(
        &'c mut self,
    ) -> Box<dyn AuthorizationCodeRepository<Error = Self::Error> + 'c>;

    /// Get a [`RevocationRepository`]
    fn revocations<'c>(&'c mut self) -> Box<dyn RevocationRepository<Error = Self::Error> + 'c>;
}

/// Implementations of the [`RepositoryAccess`], [`RepositoryTransaction`] and
/// [`Repository`] for the [`MapErr`](crate::MapErr) wrapper and [`Box<R>`]
mod impls {
    use futures_util::{FutureExt, TryFutureExt, future::BoxFuture};

    use super::RepositoryAccess;
    use crate::{
        MapErr, Repository, RepositoryTransaction,
        oauth2::{AuthorizationCodeRepository, ClientRepository},
        revocation::RevocationRepository,
        user::UserRepository,
        zone::ZoneRepository,
    };

    // --- Repository ---
    impl<R, F, E1, E2> Repository<E2> for MapErr<R, F>
    where
        R: Repository<E1> + RepositoryAccess<Error = E1> + RepositoryTransaction<Error = E1>,
        F: FnMut(E1) -> E2 + Send + Sync + 'static,
        E1: std::error::Error + Send + Sync + 'static,
        E2: std::error::Error + Send + Sync + 'static,
    {
    }

    // --- RepositoryTransaction --
    impl<R, F, E> RepositoryTransaction for MapErr<R, F>
    where
        R: RepositoryTransaction,
        R::Error: 'static,
        F: FnMut(R::Error) -> E + Send + Sync + 'static,
        E: std::error::Error,
    {
        type Error = E;

        fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
            let this = *self;
            Box::new(this.inner).save().map_err(this.mapper).boxed()
        }

        fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
            let this = *self;
            Box::new(this.inner).cancel().map_err(this.mapper).boxed()
        }
    }

    // --- RepositoryAccess --
    impl<R, F, E> RepositoryAccess for MapErr<R, F>
    where
        R: RepositoryAccess,
        F: FnMut(R::Error) -> E + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        type Error = E;

        fn zones<'c>(&'c mut self) -> Box<dyn ZoneRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.zones(), &mut self.mapper))
        }

        fn users<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.users(), &mut self.mapper))
        }

        fn clients<'c>(&'c mut self) -> Box<dyn ClientRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.clients(), &mut self.mapper))
        }

        fn authorization_codes<'c>(
            &'c mut self,
        ) -> Box<dyn AuthorizationCodeRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(
                self.inner.authorization_codes(),
                &mut self.mapper,
            ))
        }

        fn revocations<'c>(
            &'c mut self,
        ) -> Box<dyn RevocationRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.revocations(), &mut self.mapper))
        }
    }

    impl<R: RepositoryAccess + ?Sized> RepositoryAccess for Box<R> {
        type Error = R::Error;

        fn zones<'c>(&'c mut self) -> Box<dyn ZoneRepository<Error = Self::Error> + 'c> {
            (**self).zones()
        }

        fn users<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
            (**self).users()
        }

        fn clients<'c>(&'c mut self) -> Box<dyn ClientRepository<Error = Self::Error> + 'c> {
            (**self).clients()
        }

        fn authorization_codes<'c>(
            &'c mut self,
        ) -> Box<dyn AuthorizationCodeRepository<Error = Self::Error> + 'c> {
            (**self).authorization_codes()
        }

        fn revocations<'c>(
            &'c mut self,
        ) -> Box<dyn RevocationRepository<Error = Self::Error> + 'c> {
            (**self).revocations()
        }
    }
}
