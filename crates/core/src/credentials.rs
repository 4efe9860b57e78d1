// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Checking the secrets users present when they log in.
//!
//! Local users have a [`Credential::Secret`], checked by the
//! [`PasswordManager`]. Users coming from an external identity provider have a
//! [`Credential::Delegated`], checked by whichever verifier was registered for
//! their origin, for example an LDAP bind.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use uaa_data_model::Credential;

use crate::passwords::PasswordManager;

#[derive(Debug, Error)]
#[error("credential verification failed")]
pub struct VerifierError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl VerifierError {
    pub fn new<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }
}

/// Checks a presented secret against a stored credential
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns `Ok(false)` when the secret does not match. Errors are reserved
    /// to failures of the verifier itself.
    async fn verify(&self, credential: &Credential, presented: &str)
    -> Result<bool, VerifierError>;
}

#[async_trait]
impl CredentialVerifier for PasswordManager {
    async fn verify(
        &self,
        credential: &Credential,
        presented: &str,
    ) -> Result<bool, VerifierError> {
        match credential {
            Credential::Secret { handle } => {
                PasswordManager::verify(self, handle, presented.to_owned())
                    .await
                    .map_err(VerifierError::new)
            }
            Credential::Delegated { .. } => Ok(false),
        }
    }
}

/// A [`CredentialVerifier`] which picks a verifier by credential origin
#[derive(Clone)]
pub struct CredentialChain {
    local: Arc<dyn CredentialVerifier>,
    delegated: HashMap<String, Arc<dyn CredentialVerifier>>,
}

impl CredentialChain {
    /// Check local credentials with the given verifier, and refuse every
    /// delegated one until [`CredentialChain::with_origin`] registers one
    #[must_use]
    pub fn new(local: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            local,
            delegated: HashMap::new(),
        }
    }

    /// Check credentials delegated to `origin` with the given verifier
    #[must_use]
    pub fn with_origin(
        mut self,
        origin: impl Into<String>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        self.delegated.insert(origin.into(), verifier);
        self
    }
}

#[async_trait]
impl CredentialVerifier for CredentialChain {
    async fn verify(
        &self,
        credential: &Credential,
        presented: &str,
    ) -> Result<bool, VerifierError> {
        match credential {
            Credential::Secret { .. } => self.local.verify(credential, presented).await,
            Credential::Delegated { origin } => {
                let Some(verifier) = self.delegated.get(origin) else {
                    tracing::debug!(%origin, "No verifier for this credential origin");
                    return Ok(false);
                };
                verifier.verify(credential, presented).await
            }
        }
    }
}
