// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use oauth2_types::scope::Scope;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use ulid::Ulid;

use crate::{ValidationError, require_text};

mod credential;
mod external;
mod scim;

pub use self::{
    credential::{Credential, SecretHandle},
    external::ExternalIdentity,
    scim::{ScimEmail, ScimMeta, ScimName, ScimUser},
};

/// Origin of the users managed by the local store.
pub(crate) const LOCAL_ORIGIN: &str = "uaa";

/// A validated user record which was not saved yet, and therefore has no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUser {
    pub username: String,
    pub credential: Credential,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub authorities: Scope,
    pub origin: String,
    pub external_id: Option<String>,
}

fn validate_profile(
    username: &str,
    email: &str,
    given_name: &str,
    family_name: &str,
) -> Result<(), ValidationError> {
    require_text("username", username)?;
    require_text("email", email)?;
    require_text("given_name", given_name)?;
    require_text("family_name", family_name)?;
    Ok(())
}

impl PendingUser {
    /// Build a pending user from raw signup data.
    ///
    /// `authorities` are the default authorities configured for new users.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first empty field, checked in
    /// the order username, email, given name, family name.
    pub fn new(
        username: String,
        credential: Credential,
        email: String,
        given_name: String,
        family_name: String,
        authorities: Scope,
    ) -> Result<Self, ValidationError> {
        validate_profile(&username, &email, &given_name, &family_name)?;

        let origin = credential.origin().to_owned();
        Ok(Self {
            username,
            credential,
            email,
            given_name,
            family_name,
            authorities,
            origin,
            external_id: None,
        })
    }

    /// Assign an id to this record, producing the persisted user.
    #[must_use]
    pub fn promote(self, zone_id: Ulid, id: Ulid, now: DateTime<Utc>) -> User {
        User {
            id,
            zone_id,
            username: self.username,
            credential: self.credential,
            email: self.email,
            given_name: self.given_name,
            family_name: self.family_name,
            authorities: self.authorities,
            origin: self.origin,
            external_id: self.external_id,
            created_at: now,
            modified_at: now,
        }
    }
}

/// A user which was saved by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Ulid,
    pub zone_id: Ulid,
    pub username: String,
    #[serde(skip)]
    pub credential: Credential,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub authorities: Scope,
    pub origin: String,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// A partial edit of a user profile. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl User {
    /// Apply a profile update, producing a new user value.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the update would leave a required
    /// field empty. The original value is consumed either way.
    pub fn with_profile(
        self,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let username = update.username.unwrap_or(self.username);
        let email = update.email.unwrap_or(self.email);
        let given_name = update.given_name.unwrap_or(self.given_name);
        let family_name = update.family_name.unwrap_or(self.family_name);

        validate_profile(&username, &email, &given_name, &family_name)?;

        Ok(Self {
            username,
            email,
            given_name,
            family_name,
            modified_at: now,
            ..self
        })
    }

    /// Replace the credential of this user.
    #[must_use]
    pub fn with_credential(self, credential: Credential, now: DateTime<Utc>) -> Self {
        Self {
            credential,
            modified_at: now,
            ..self
        }
    }

    /// Replace the granted authorities of this user.
    #[must_use]
    pub fn with_authorities(self, authorities: Scope, now: DateTime<Utc>) -> Self {
        Self {
            authorities,
            modified_at: now,
            ..self
        }
    }

    #[doc(hidden)]
    #[must_use]
    pub fn samples(
        zone_id: Ulid,
        now: DateTime<Utc>,
        rng: &mut impl RngCore,
    ) -> Vec<Self> {
        let authorities: Scope = "ROLE_USER".parse().unwrap_or_default();
        vec![
            Self {
                id: Ulid::from_datetime_with_source(now.into(), rng),
                zone_id,
                username: "marissa".to_owned(),
                credential: Credential::secret("$argon2id$sample"),
                email: "marissa@example.com".to_owned(),
                given_name: "Marissa".to_owned(),
                family_name: "Bloggs".to_owned(),
                authorities: authorities.clone(),
                origin: LOCAL_ORIGIN.to_owned(),
                external_id: None,
                created_at: now,
                modified_at: now,
            },
            Self {
                id: Ulid::from_datetime_with_source(now.into(), rng),
                zone_id,
                username: "joe@corp.example".to_owned(),
                credential: Credential::Delegated {
                    origin: "ldap".to_owned(),
                },
                email: "joe@corp.example".to_owned(),
                given_name: "Joe".to_owned(),
                family_name: "Smith".to_owned(),
                authorities,
                origin: "ldap".to_owned(),
                external_id: Some("cn=joe,ou=people".to_owned()),
                created_at: now,
                modified_at: now,
            },
        ]
    }
}

/// Error when trying to assign an id to a record which already has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("user record already persisted with id {id}")]
pub struct AlreadyPersistedError {
    pub id: Ulid,
}

/// A user record as handed to a store: either not saved yet, or already
/// saved and holding its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRecord {
    Pending(PendingUser),
    Persisted(User),
}

impl UserRecord {
    /// Assign an id to this record. This can only ever happen once.
    ///
    /// # Errors
    ///
    /// Returns an [`AlreadyPersistedError`] if the record already has an id.
    pub fn promote(
        self,
        zone_id: Ulid,
        id: Ulid,
        now: DateTime<Utc>,
    ) -> Result<User, AlreadyPersistedError> {
        match self {
            Self::Pending(pending) => Ok(pending.promote(zone_id, id, now)),
            Self::Persisted(user) => Err(AlreadyPersistedError { id: user.id }),
        }
    }

    /// Returns `true` if the record is [`Persisted`].
    ///
    /// [`Persisted`]: UserRecord::Persisted
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Pending(pending) => &pending.username,
            Self::Persisted(user) => &user.username,
        }
    }
}

impl From<PendingUser> for UserRecord {
    fn from(pending: PendingUser) -> Self {
        Self::Pending(pending)
    }
}

impl From<User> for UserRecord {
    fn from(user: User) -> Self {
        Self::Persisted(user)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn authorities() -> Scope {
        "ROLE_USER".parse().unwrap()
    }

    fn pending() -> PendingUser {
        PendingUser::new(
            "marissa".to_owned(),
            Credential::secret("hash"),
            "marissa@example.com".to_owned(),
            "Marissa".to_owned(),
            "Bloggs".to_owned(),
            authorities(),
        )
        .unwrap()
    }

    #[test]
    fn empty_fields_are_named() {
        let cases = [
            ("", "m@example.com", "M", "B", "username"),
            ("m", " ", "M", "B", "email"),
            ("m", "m@example.com", "", "B", "given_name"),
            ("m", "m@example.com", "M", "\t", "family_name"),
            // The first empty field wins
            ("", "", "", "", "username"),
        ];

        for (username, email, given_name, family_name, field) in cases {
            let err = PendingUser::new(
                username.to_owned(),
                Credential::secret("hash"),
                email.to_owned(),
                given_name.to_owned(),
                family_name.to_owned(),
                authorities(),
            )
            .unwrap_err();
            assert_eq!(err, ValidationError::empty(field));
        }
    }

    #[test]
    fn local_users_have_the_local_origin() {
        let pending = pending();
        assert_eq!(pending.origin, LOCAL_ORIGIN);
        assert!(pending.authorities.contains("ROLE_USER"));
    }

    #[test]
    fn promote_only_once() {
        let zone_id = Ulid::from_parts(0, 1);
        let id = Ulid::from_parts(0, 2);
        let now = DateTime::default();

        let record = UserRecord::from(pending());
        assert!(!record.is_persisted());
        let user = record.promote(zone_id, id, now).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.zone_id, zone_id);
        assert_eq!(user.username, "marissa");

        let record = UserRecord::from(user);
        assert!(record.is_persisted());
        assert_matches!(
            record.promote(zone_id, Ulid::from_parts(0, 3), now),
            Err(AlreadyPersistedError { id: existing }) if existing == id
        );
    }

    #[test]
    fn profile_update_is_pure() {
        let now = DateTime::default();
        let later = now + chrono::Duration::seconds(30);
        let user = pending().promote(Ulid::from_parts(0, 1), Ulid::from_parts(0, 2), now);

        let updated = user
            .clone()
            .with_profile(
                ProfileUpdate {
                    email: Some("marissa@corp.example".to_owned()),
                    ..ProfileUpdate::default()
                },
                later,
            )
            .unwrap();

        assert_eq!(user.email, "marissa@example.com");
        assert_eq!(updated.email, "marissa@corp.example");
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.created_at, now);
        assert_eq!(updated.modified_at, later);

        let err = user
            .with_profile(
                ProfileUpdate {
                    given_name: Some(String::new()),
                    ..ProfileUpdate::default()
                },
                later,
            )
            .unwrap_err();
        assert_eq!(err, ValidationError::empty("given_name"));
    }

    #[test]
    fn credentials_are_not_debug_printed() {
        let user = pending().promote(Ulid::nil(), Ulid::nil(), DateTime::default());
        let user =
            user.with_credential(Credential::secret("$argon2id$topsecret"), DateTime::default());
        assert!(!format!("{user:?}").contains("topsecret"));
    }
}
