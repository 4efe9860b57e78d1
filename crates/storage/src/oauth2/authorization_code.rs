// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::Duration;
use oauth2_types::scope::Scope;
use rand_core::RngCore;
use uaa_data_model::{AuthorizationCode, Clock, Pkce};
use ulid::Ulid;
use url::Url;

use crate::repository_impl;

/// Parameters used to issue a new [`AuthorizationCode`]
pub struct AuthorizationCodeParams<'a> {
    /// The zone the code is issued in
    pub zone_id: Ulid,

    /// The `client_id` of the client which asked for the code
    pub client_id: &'a str,

    /// The user who approved the request
    pub user_id: Ulid,

    /// The redirect URI given in the authorization request, if any
    pub redirect_uri: Option<Url>,

    /// The scope which was granted
    pub scope: Scope,

    /// The PKCE challenge, if the client sent one
    pub pkce: Option<Pkce>,

    /// How long the code stays redeemable
    pub expires_in: Duration,
}

/// An [`AuthorizationCodeRepository`] stores single-use
/// [`AuthorizationCode`]s between the authorization request and the token
/// request
#[async_trait]
pub trait AuthorizationCodeRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Issue a new [`AuthorizationCode`], with a random code
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `params`: The parameters of the code
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        params: AuthorizationCodeParams<'_>,
    ) -> Result<AuthorizationCode, Self::Error>;

    /// Remove and return an [`AuthorizationCode`]
    ///
    /// A code can only be consumed once, even by concurrent callers: the
    /// second consumer gets `None`. Expired codes are still returned, it is
    /// up to the caller to check for expiration.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn consume(&mut self, code: &str) -> Result<Option<AuthorizationCode>, Self::Error>;

    /// Remove every pending [`AuthorizationCode`] of a zone, returning how
    /// many were removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error>;
}

repository_impl!(AuthorizationCodeRepository:
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        params: AuthorizationCodeParams<'_>,
    ) -> Result<AuthorizationCode, Self::Error>;
    async fn consume(&mut self, code: &str) -> Result<Option<AuthorizationCode>, Self::Error>;
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error>;
);
