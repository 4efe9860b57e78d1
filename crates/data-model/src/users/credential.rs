// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::{Deserialize, Serialize};

/// An opaque, verifiable secret, typically a password hash in PHC format.
///
/// The value never shows up in debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretHandle(String);

impl SecretHandle {
    #[must_use]
    pub fn new(handle: String) -> Self {
        Self(handle)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretHandle(<redacted>)")
    }
}

/// How a user proves who they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// A secret checked locally against the stored handle.
    Secret { handle: SecretHandle },

    /// Authentication is delegated to an external identity provider; the
    /// user has no local secret.
    Delegated { origin: String },
}

impl Credential {
    #[must_use]
    pub fn secret(handle: impl Into<String>) -> Self {
        Self::Secret {
            handle: SecretHandle::new(handle.into()),
        }
    }

    /// The origin whose verifier handles this credential.
    #[must_use]
    pub fn origin(&self) -> &str {
        match self {
            Self::Secret { .. } => crate::users::LOCAL_ORIGIN,
            Self::Delegated { origin } => origin,
        }
    }
}
