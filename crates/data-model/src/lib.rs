// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

mod clock;
pub mod oauth2;
mod revocation;
mod tokens;
mod users;
mod zones;

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// The field is empty, or only contains whitespace.
    Empty,

    /// The field has a value, but not an acceptable one.
    Malformed,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("must not be empty"),
            Self::Malformed => f.write_str("is malformed"),
        }
    }
}

/// Error when a record fails validation. Names the first offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: ValidationReason,
}

impl ValidationError {
    #[must_use]
    pub const fn empty(field: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::Empty,
        }
    }

    #[must_use]
    pub const fn malformed(field: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::Malformed,
        }
    }
}

/// Check that a required text field has some non-whitespace content.
pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::empty(field))
    } else {
        Ok(())
    }
}

pub use ulid::Ulid;

pub use self::{
    clock::{Clock, MockClock, SystemClock},
    oauth2::{
        AuthorizationCode, Client, ClientPatch, ClientRegistration, InvalidRedirectUriError, Pkce,
    },
    revocation::{RevocationRecord, RevocationTarget},
    tokens::{Subject, SubjectKind, TokenClaims, TokenKind},
    users::{
        AlreadyPersistedError, Credential, ExternalIdentity, PendingUser, ProfileUpdate,
        ScimEmail, ScimMeta, ScimName, ScimUser, SecretHandle, User, UserRecord,
    },
    zones::{IdentityZone, ZoneDefinition, ZoneUpdate},
};
