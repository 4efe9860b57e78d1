// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use oauth2_types::{
    pkce::{CodeChallengeError, CodeChallengeMethodExt, PkceCodeChallengeMethod},
    scope::Scope,
};
use rand::{
    RngCore,
    distributions::{Alphanumeric, DistString},
};
use serde::Serialize;
use ulid::Ulid;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pkce {
    pub challenge_method: PkceCodeChallengeMethod,
    pub challenge: String,
}

impl Pkce {
    /// Create a new PKCE challenge, with the given method and challenge.
    #[must_use]
    pub fn new(challenge_method: PkceCodeChallengeMethod, challenge: String) -> Self {
        Pkce {
            challenge_method,
            challenge,
        }
    }

    /// Verify the PKCE challenge.
    ///
    /// # Errors
    ///
    /// Returns an error if the verifier is invalid.
    pub fn verify(&self, verifier: &str) -> Result<(), CodeChallengeError> {
        self.challenge_method.verify(&self.challenge, verifier)
    }
}

/// A single-use authorization code, handed to a client after the end user
/// approved its request. It is removed from the store on redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationCode {
    #[serde(skip)]
    pub code: String,
    pub zone_id: Ulid,
    pub client_id: String,
    pub user_id: Ulid,

    /// The `redirect_uri` given in the authorization request, if any. When
    /// set, the token request must repeat it exactly.
    pub redirect_uri: Option<Url>,

    pub scope: Scope,
    pub pkce: Option<Pkce>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Length of generated codes
    pub const LENGTH: usize = 32;

    /// Generate a random code value.
    #[must_use]
    pub fn generate_code(rng: &mut (impl RngCore + ?Sized)) -> String {
        Alphanumeric.sample_string(rng, Self::LENGTH)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Whether the token request's `redirect_uri` is acceptable for this
    /// code.
    #[must_use]
    pub fn redirect_uri_matches(&self, redirect_uri: Option<&Url>) -> bool {
        match &self.redirect_uri {
            Some(expected) => redirect_uri == Some(expected),
            None => true,
        }
    }
}
