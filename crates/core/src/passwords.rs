// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::RngCore;
use thiserror::Error;
use uaa_data_model::SecretHandle;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters")]
    Params(#[source] argon2::Error),

    #[error("could not hash the secret")]
    Hash(#[source] password_hash::Error),

    #[error("the stored hash is invalid")]
    InvalidHash(#[source] password_hash::Error),

    #[error("the hashing task failed")]
    Join(#[from] tokio::task::JoinError),
}

/// Hashes and checks the secrets of local users and confidential clients,
/// with argon2id.
///
/// The hashing happens on the blocking thread pool, so that it does not hold
/// up the async runtime.
#[derive(Clone)]
pub struct PasswordManager {
    hasher: Arc<Argon2<'static>>,

    /// Checked against when there is no stored hash, so that a missing user
    /// costs as much as a wrong password
    dummy: Arc<str>,
}

impl std::fmt::Debug for PasswordManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordManager").finish_non_exhaustive()
    }
}

impl PasswordManager {
    /// Create a password manager with the given argon2id cost parameters
    ///
    /// # Errors
    ///
    /// Returns an error if argon2 rejects the parameters
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .map_err(PasswordError::Params)?;
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::encode_b64(&[0u8; 16]).map_err(PasswordError::Hash)?;
        let dummy = hasher
            .hash_password(b"", &salt)
            .map_err(PasswordError::Hash)?
            .to_string();

        Ok(Self {
            hasher: Arc::new(hasher),
            dummy: dummy.into(),
        })
    }

    /// Hash a secret, with a salt drawn from `rng`
    ///
    /// # Errors
    ///
    /// Returns an error if the hashing failed
    #[tracing::instrument(name = "passwords.hash", skip_all)]
    pub async fn hash(
        &self,
        rng: &mut (dyn RngCore + Send),
        secret: String,
    ) -> Result<SecretHandle, PasswordError> {
        let mut salt = [0u8; 16];
        rng.fill_bytes(&mut salt);

        let hasher = self.hasher.clone();
        let hashed = tokio::task::spawn_blocking(move || {
            let salt = SaltString::encode_b64(&salt).map_err(PasswordError::Hash)?;
            hasher
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(PasswordError::Hash)
        })
        .await??;

        Ok(SecretHandle::new(hashed))
    }

    /// Check a secret against a stored hash. A mismatch is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored hash could not be parsed
    #[tracing::instrument(name = "passwords.verify", skip_all)]
    pub async fn verify(
        &self,
        handle: &SecretHandle,
        secret: String,
    ) -> Result<bool, PasswordError> {
        let hasher = self.hasher.clone();
        let stored = handle.expose().to_owned();

        tokio::task::spawn_blocking(move || {
            let hash = PasswordHash::new(&stored).map_err(PasswordError::InvalidHash)?;
            match hasher.verify_password(secret.as_bytes(), &hash) {
                Ok(()) => Ok(true),
                Err(password_hash::Error::Password) => Ok(false),
                Err(e) => Err(PasswordError::InvalidHash(e)),
            }
        })
        .await?
    }

    /// Do the work of [`PasswordManager::verify`] against a hash nobody has
    /// the secret of
    ///
    /// # Errors
    ///
    /// Returns an error if the hashing task failed
    #[tracing::instrument(name = "passwords.verify_dummy", skip_all)]
    pub async fn verify_dummy(&self, secret: String) -> Result<(), PasswordError> {
        let handle = SecretHandle::new(self.dummy.to_string());
        self.verify(&handle, secret).await.map(|_| ())
    }
}
