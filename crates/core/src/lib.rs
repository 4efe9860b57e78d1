// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! The services of the authorization core: identity zones, users, clients,
//! token issuance, validation and revocation.
//!
//! Every operation is a method on [`Core`], which takes the
//! [`BoxRepository`](uaa_storage::BoxRepository) of the current unit of work,
//! a random number generator and a [`Clock`](uaa_data_model::Clock). Write
//! operations save the repository when they succeed. Reads leave it untouched.
//!
//! Operations check everything they can before writing anything. With a
//! backend which can't roll back, a failed operation still leaves no partial
//! record behind.

#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use uaa_jose::Keyset;

use self::locks::KeyLocks;

mod clients;
pub mod credentials;
mod error;
mod issuance;
mod locks;
mod passwords;
mod site_config;
mod users;
mod validation;
mod zones;

#[cfg(test)]
mod tests;

pub use self::{
    credentials::{CredentialChain, CredentialVerifier, VerifierError},
    error::{Error, ErrorKind},
    issuance::{Authorized, ClientCredentials, ImplicitResponse},
    passwords::{PasswordError, PasswordManager},
    site_config::{SiteConfig, ZoneDeletionPolicy},
    users::NewUser,
    validation::Principal,
};

/// The authorization core. Cheap to clone.
#[derive(Clone)]
pub struct Core {
    site_config: Arc<SiteConfig>,
    keyset: Keyset,
    passwords: PasswordManager,
    verifier: Arc<dyn CredentialVerifier>,
    locks: Arc<KeyLocks>,
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("site_config", &self.site_config)
            .field("signing_kid", &self.keyset.signing_kid())
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Create the core. Users log in with the passwords checked by
    /// `passwords`, until [`Core::with_verifier`] sets another verifier.
    #[must_use]
    pub fn new(site_config: SiteConfig, keyset: Keyset, passwords: PasswordManager) -> Self {
        let verifier = Arc::new(passwords.clone());
        Self {
            site_config: Arc::new(site_config),
            keyset,
            passwords,
            verifier,
            locks: Arc::default(),
        }
    }

    /// Use this verifier to check the credentials of users
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    #[must_use]
    pub fn site_config(&self) -> &SiteConfig {
        &self.site_config
    }
}
