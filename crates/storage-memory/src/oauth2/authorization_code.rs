// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use uaa_data_model::{AuthorizationCode, Clock};
use uaa_storage::oauth2::{AuthorizationCodeParams, AuthorizationCodeRepository};
use ulid::Ulid;

use crate::{MemoryStoreError, state::State};

/// An implementation of [`AuthorizationCodeRepository`] for the in-memory
/// store
pub struct MemoryAuthorizationCodeRepository<'c> {
    state: &'c State,
}

impl<'c> MemoryAuthorizationCodeRepository<'c> {
    pub(crate) fn new(state: &'c State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl AuthorizationCodeRepository for MemoryAuthorizationCodeRepository<'_> {
    type Error = MemoryStoreError;

    #[tracing::instrument(
        name = "memory.authorization_code.add",
        skip_all,
        fields(zone.id = %params.zone_id, client.id = params.client_id, user.id = %params.user_id),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        params: AuthorizationCodeParams<'_>,
    ) -> Result<AuthorizationCode, Self::Error> {
        let created_at = clock.now();

        // Never overwrite a pending code
        loop {
            let code = AuthorizationCode::generate_code(rng);
            let Entry::Vacant(entry) = self.state.authorization_codes.entry(code.clone()) else {
                continue;
            };

            let authorization_code = AuthorizationCode {
                code,
                zone_id: params.zone_id,
                client_id: params.client_id.to_owned(),
                user_id: params.user_id,
                redirect_uri: params.redirect_uri,
                scope: params.scope,
                pkce: params.pkce,
                created_at,
                expires_at: created_at + params.expires_in,
            };
            entry.insert(authorization_code.clone());

            return Ok(authorization_code);
        }
    }

    #[tracing::instrument(name = "memory.authorization_code.consume", skip_all, err)]
    async fn consume(&mut self, code: &str) -> Result<Option<AuthorizationCode>, Self::Error> {
        Ok(self
            .state
            .authorization_codes
            .remove(code)
            .map(|(_, code)| code))
    }

    #[tracing::instrument(
        name = "memory.authorization_code.remove_all_in_zone",
        skip_all,
        fields(zone.id = %zone_id),
        err,
    )]
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error> {
        let mut removed = 0;
        self.state.authorization_codes.retain(|_, code| {
            let keep = code.zone_id != zone_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
