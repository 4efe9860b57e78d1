// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Projection of users to and from their [SCIM] representation.
//!
//! [SCIM]: https://www.rfc-editor.org/rfc/rfc7643#section-4.1

use chrono::{DateTime, Utc};
use oauth2_types::scope::Scope;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::{Credential, PendingUser, User};
use crate::ValidationError;

const CORE_SCHEMA: &str = "urn:scim:schemas:core:1.0";

fn default_schemas() -> Vec<String> {
    vec![CORE_SCHEMA.to_owned()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    pub given_name: String,
    pub family_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimEmail {
    pub value: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimMeta {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A user as exchanged with an external directory.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub user_name: String,
    pub name: ScimName,
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    pub origin: Option<String>,
    pub zone_id: Option<String>,
    pub meta: Option<ScimMeta>,
}

impl ScimUser {
    /// The primary email, or the first one listed if none is marked primary.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|email| email.primary)
            .or_else(|| self.emails.first())
            .map(|email| email.value.as_str())
    }

    /// Turn the SCIM representation into a pending user, with the given
    /// credential and authorities. Ids and metadata are dropped: the store
    /// assigns them.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first empty required field.
    pub fn into_pending(
        self,
        credential: Credential,
        authorities: Scope,
    ) -> Result<PendingUser, ValidationError> {
        let email = self.primary_email().unwrap_or_default().to_owned();
        let mut pending = PendingUser::new(
            self.user_name,
            credential,
            email,
            self.name.given_name,
            self.name.family_name,
            authorities,
        )?;

        if let Some(origin) = self.origin {
            pending.origin = origin;
        }
        pending.external_id = self.external_id;
        Ok(pending)
    }
}

impl User {
    /// Project this user to its SCIM representation. The credential is never
    /// part of it.
    #[must_use]
    pub fn to_scim(&self) -> ScimUser {
        ScimUser {
            schemas: default_schemas(),
            id: Some(self.id.to_string()),
            external_id: self.external_id.clone(),
            user_name: self.username.clone(),
            name: ScimName {
                given_name: self.given_name.clone(),
                family_name: self.family_name.clone(),
            },
            emails: vec![ScimEmail {
                value: self.email.clone(),
                primary: true,
            }],
            origin: Some(self.origin.clone()),
            zone_id: Some(self.zone_id.to_string()),
            meta: Some(ScimMeta {
                created: self.created_at,
                last_modified: self.modified_at,
            }),
        }
    }
}
