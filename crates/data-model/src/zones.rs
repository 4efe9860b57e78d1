// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use ulid::Ulid;

use crate::{ValidationError, require_text};

/// An identity zone, the unit of tenancy. Every user, client and token
/// belongs to exactly one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityZone {
    pub id: Ulid,
    pub subdomain: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// The data needed to provision a new zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDefinition {
    pub subdomain: String,
    pub name: String,
}

/// A partial edit of a zone. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneUpdate {
    pub subdomain: Option<String>,
    pub name: Option<String>,
}

/// Subdomains are DNS labels: lowercase ASCII letters, digits and inner
/// hyphens.
fn normalize_subdomain(subdomain: &str) -> Result<String, ValidationError> {
    require_text("subdomain", subdomain)?;
    let subdomain = subdomain.trim().to_ascii_lowercase();

    let valid_chars = subdomain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars
        || subdomain.starts_with('-')
        || subdomain.ends_with('-')
        || subdomain.len() > 63
    {
        return Err(ValidationError::malformed("subdomain"));
    }

    Ok(subdomain)
}

impl ZoneDefinition {
    /// Validate the definition, normalizing the subdomain to lowercase.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first invalid field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let subdomain = normalize_subdomain(&self.subdomain)?;
        require_text("name", &self.name)?;
        Ok(Self {
            subdomain,
            name: self.name,
        })
    }
}

impl IdentityZone {
    /// Apply an update, producing a new zone value. The id never changes.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first invalid field.
    pub fn with_update(
        self,
        update: ZoneUpdate,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let subdomain = match update.subdomain {
            Some(subdomain) => normalize_subdomain(&subdomain)?,
            None => self.subdomain,
        };

        let name = match update.name {
            Some(name) => {
                require_text("name", &name)?;
                name
            }
            None => self.name,
        };

        Ok(Self {
            subdomain,
            name,
            modified_at: now,
            ..self
        })
    }

    #[doc(hidden)]
    #[must_use]
    pub fn samples(now: DateTime<Utc>, rng: &mut impl RngCore) -> Vec<Self> {
        vec![
            Self {
                id: Ulid::from_datetime_with_source(now.into(), rng),
                subdomain: "acme".to_owned(),
                name: "ACME Corp".to_owned(),
                created_at: now,
                modified_at: now,
            },
            Self {
                id: Ulid::from_datetime_with_source(now.into(), rng),
                subdomain: "globex".to_owned(),
                name: "Globex".to_owned(),
                created_at: now,
                modified_at: now,
            },
        ]
    }
}
