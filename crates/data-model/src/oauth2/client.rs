// Copyright 2024 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Duration, Utc};
use oauth2_types::{requests::GrantType, scope::Scope};
use rand::RngCore;
use serde::Serialize;
use serde_with::{DurationSeconds, serde_as};
use thiserror::Error;
use ulid::Ulid;
use url::Url;

use crate::{SecretHandle, ValidationError, require_text};

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: Ulid,

    /// The zone this client is registered in
    pub zone_id: Ulid,

    /// Client identifier, unique within the zone
    pub client_id: String,

    /// Handle on the client secret. Public clients have none.
    #[serde(skip)]
    pub secret: Option<SecretHandle>,

    /// Name of the Client to be presented to the End-User
    pub name: Option<String>,

    /// The OAuth 2.0 Grant Types the client may use
    pub grant_types: Vec<GrantType>,

    /// The widest scope this client can be granted
    pub scope: Scope,

    /// Array of Redirection URI values used by the Client
    pub redirect_uris: Vec<Url>,

    /// Overrides the default access token lifetime
    #[serde_as(as = "Option<DurationSeconds<i64>>")]
    pub access_token_validity: Option<Duration>,

    /// Overrides the default refresh token lifetime
    #[serde_as(as = "Option<DurationSeconds<i64>>")]
    pub refresh_token_validity: Option<Duration>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// What an administrator submits to register a client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientRegistration {
    pub client_id: String,

    /// The plain client secret. It gets hashed before being stored. `None`
    /// registers a public client.
    pub client_secret: Option<String>,

    pub name: Option<String>,
    pub grant_types: Vec<GrantType>,
    pub scope: Scope,
    pub redirect_uris: Vec<Url>,
    pub access_token_validity: Option<Duration>,
    pub refresh_token_validity: Option<Duration>,
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field("public", &self.client_secret.is_none())
            .field("name", &self.name)
            .field("grant_types", &self.grant_types)
            .field("scope", &self.scope)
            .field("redirect_uris", &self.redirect_uris)
            .field("access_token_validity", &self.access_token_validity)
            .field("refresh_token_validity", &self.refresh_token_validity)
            .finish()
    }
}

/// A partial edit of a client registration. `None` leaves the field
/// untouched. The secret is changed through a separate rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub grant_types: Option<Vec<GrantType>>,
    pub scope: Option<Scope>,
    pub redirect_uris: Option<Vec<Url>>,
    pub access_token_validity: Option<Duration>,
    pub refresh_token_validity: Option<Duration>,
}

fn validate_validity(
    field: &'static str,
    validity: Option<Duration>,
) -> Result<(), ValidationError> {
    match validity {
        Some(validity) if validity <= Duration::zero() => Err(ValidationError::malformed(field)),
        _ => Ok(()),
    }
}

fn validate_grant_types(grant_types: &[GrantType]) -> Result<(), ValidationError> {
    if grant_types.is_empty() {
        Err(ValidationError::empty("grant_types"))
    } else {
        Ok(())
    }
}

impl ClientRegistration {
    /// Check the registration before it reaches a store.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("client_id", &self.client_id)?;
        if self.client_id.chars().any(char::is_whitespace) {
            return Err(ValidationError::malformed("client_id"));
        }

        if let Some(secret) = &self.client_secret {
            require_text("client_secret", secret)?;
        }

        validate_grant_types(&self.grant_types)?;
        validate_validity("access_token_validity", self.access_token_validity)?;
        validate_validity("refresh_token_validity", self.refresh_token_validity)?;
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRedirectUriError {
    #[error("redirect_uri is not allowed for this client")]
    NotAllowed,

    #[error("multiple redirect_uris registered for this client")]
    MultipleRegistered,

    #[error("client has no redirect_uri registered")]
    NoneRegistered,
}

impl Client {
    /// Public clients have no secret, and must prove possession of the
    /// authorization code with PKCE instead.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.secret.is_none()
    }

    #[must_use]
    pub fn allows_grant(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// The access token lifetime for this client, falling back to `default`.
    #[must_use]
    pub fn access_token_ttl(&self, default: Duration) -> Duration {
        self.access_token_validity.unwrap_or(default)
    }

    /// The refresh token lifetime for this client, falling back to `default`.
    #[must_use]
    pub fn refresh_token_ttl(&self, default: Duration) -> Duration {
        self.refresh_token_validity.unwrap_or(default)
    }

    /// Determine which redirect URI to use for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    ///  - no URL was given but multiple redirect URIs are registered,
    ///  - no URL was registered, or
    ///  - the given URL is not registered
    pub fn resolve_redirect_uri<'a>(
        &'a self,
        redirect_uri: Option<&'a Url>,
    ) -> Result<&'a Url, InvalidRedirectUriError> {
        match (&self.redirect_uris[..], redirect_uri) {
            ([], _) => Err(InvalidRedirectUriError::NoneRegistered),
            ([one], None) => Ok(one),
            (_, None) => Err(InvalidRedirectUriError::MultipleRegistered),
            (uris, Some(uri)) if uri_matches_one_of(uri, uris) => Ok(uri),
            _ => Err(InvalidRedirectUriError::NotAllowed),
        }
    }

    /// Apply a patch, producing a new client value. The identifiers and the
    /// secret never change here.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first invalid field.
    pub fn with_patch(
        self,
        patch: ClientPatch,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if let Some(grant_types) = &patch.grant_types {
            validate_grant_types(grant_types)?;
        }
        validate_validity("access_token_validity", patch.access_token_validity)?;
        validate_validity("refresh_token_validity", patch.refresh_token_validity)?;

        Ok(Self {
            name: patch.name.or(self.name),
            grant_types: patch.grant_types.unwrap_or(self.grant_types),
            scope: patch.scope.unwrap_or(self.scope),
            redirect_uris: patch.redirect_uris.unwrap_or(self.redirect_uris),
            access_token_validity: patch.access_token_validity.or(self.access_token_validity),
            refresh_token_validity: patch.refresh_token_validity.or(self.refresh_token_validity),
            modified_at: now,
            ..self
        })
    }

    /// Replace the secret handle, producing a new client value.
    #[must_use]
    pub fn with_secret(self, secret: Option<SecretHandle>, now: DateTime<Utc>) -> Self {
        Self {
            secret,
            modified_at: now,
            ..self
        }
    }

    #[doc(hidden)]
    pub fn samples(zone_id: Ulid, now: DateTime<Utc>, rng: &mut impl RngCore) -> Vec<Client> {
        vec![
            // A confidential client, allowed every grant
            Self {
                id: Ulid::from_datetime_with_source(now.into(), rng),
                zone_id,
                client_id: "app".to_owned(),
                secret: Some(SecretHandle::new("$argon2id$sample".to_owned())),
                name: Some("App".to_owned()),
                redirect_uris: vec![
                    Url::parse("https://app.example.com/callback").unwrap(),
                    Url::parse("http://127.0.0.1/callback").unwrap(),
                ],
                grant_types: vec![
                    GrantType::AuthorizationCode,
                    GrantType::Password,
                    GrantType::ClientCredentials,
                    GrantType::RefreshToken,
                ],
                scope: "read write".parse().unwrap_or_default(),
                access_token_validity: None,
                refresh_token_validity: None,
                created_at: now,
                modified_at: now,
            },
            // A public client with a single redirect URI
            Self {
                id: Ulid::from_datetime_with_source(now.into(), rng),
                zone_id,
                client_id: "cli".to_owned(),
                secret: None,
                name: None,
                redirect_uris: vec![
                    Url::parse("http://localhost/callback").unwrap(),
                ],
                grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
                scope: "read".parse().unwrap_or_default(),
                access_token_validity: Some(Duration::seconds(3600)),
                refresh_token_validity: None,
                created_at: now,
                modified_at: now,
            },
        ]
    }
}

/// The hosts that match the loopback interface.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Whether the given URI matches one of the registered URIs.
///
/// If the URI host is one if `localhost`, `127.0.0.1` or `[::1]`, any port is
/// accepted.
fn uri_matches_one_of(uri: &Url, registered_uris: &[Url]) -> bool {
    if LOCAL_HOSTS.contains(&uri.host_str().unwrap_or_default()) {
        let mut uri = uri.clone();
        // Try matching without the port first
        if uri.set_port(None).is_ok() && registered_uris.contains(&uri) {
            return true;
        }
    }

    registered_uris.contains(uri)
}
