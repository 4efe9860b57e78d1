// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use uaa_data_model::{Client, ClientRegistration, Clock, SecretHandle};
use uaa_storage::{Page, Pagination, Update, oauth2::ClientRepository};
use ulid::Ulid;

use crate::{MemoryStoreError, state::State};

/// An implementation of [`ClientRepository`] for the in-memory store
pub struct MemoryClientRepository<'c> {
    state: &'c State,
}

impl<'c> MemoryClientRepository<'c> {
    pub(crate) fn new(state: &'c State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ClientRepository for MemoryClientRepository<'_> {
    type Error = MemoryStoreError;

    #[tracing::instrument(
        name = "memory.oauth2_client.lookup",
        skip_all,
        fields(zone.id = %zone_id, client.id = client_id),
        err,
    )]
    async fn lookup(
        &mut self,
        zone_id: Ulid,
        client_id: &str,
    ) -> Result<Option<Client>, Self::Error> {
        Ok(self
            .state
            .clients
            .get(&(zone_id, client_id.to_owned()))
            .map(|client| client.clone()))
    }

    #[tracing::instrument(
        name = "memory.oauth2_client.add",
        skip_all,
        fields(zone.id = %zone_id, client.id = %registration.client_id),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        registration: ClientRegistration,
        secret: Option<SecretHandle>,
    ) -> Result<Option<Client>, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);

        let entry = self
            .state
            .clients
            .entry((zone_id, registration.client_id.clone()));
        let Entry::Vacant(entry) = entry else {
            return Ok(None);
        };

        let client = Client {
            id,
            zone_id,
            client_id: registration.client_id,
            secret,
            name: registration.name,
            grant_types: registration.grant_types,
            scope: registration.scope,
            redirect_uris: registration.redirect_uris,
            access_token_validity: registration.access_token_validity,
            refresh_token_validity: registration.refresh_token_validity,
            created_at,
            modified_at: created_at,
        };
        entry.insert(client.clone());

        Ok(Some(client))
    }

    #[tracing::instrument(
        name = "memory.oauth2_client.update",
        skip_all,
        fields(zone.id = %client.zone_id, client.id = %client.client_id),
        err,
    )]
    async fn update(&mut self, client: Client) -> Result<Update<Client>, Self::Error> {
        let key = (client.zone_id, client.client_id.clone());
        let Some(mut existing) = self.state.clients.get_mut(&key) else {
            return Ok(Update::NotFound);
        };

        // The client_id is the key, a different record means a different client
        if existing.id != client.id {
            return Ok(Update::Conflict);
        }

        *existing = client.clone();
        Ok(Update::Updated(client))
    }

    #[tracing::instrument(
        name = "memory.oauth2_client.remove",
        skip_all,
        fields(zone.id = %zone_id, client.id = client_id),
        err,
    )]
    async fn remove(&mut self, zone_id: Ulid, client_id: &str) -> Result<bool, Self::Error> {
        Ok(self
            .state
            .clients
            .remove(&(zone_id, client_id.to_owned()))
            .is_some())
    }

    #[tracing::instrument(
        name = "memory.oauth2_client.list",
        skip_all,
        fields(zone.id = %zone_id),
        err,
    )]
    async fn list(
        &mut self,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<Client>, Self::Error> {
        let mut clients: Vec<Client> = self
            .state
            .clients
            .iter()
            .filter(|client| client.zone_id == zone_id)
            .map(|client| client.value().clone())
            .collect();
        clients.sort_by_key(|client| client.id);

        Ok(pagination.process(pagination.window(clients.into_iter())))
    }

    #[tracing::instrument(
        name = "memory.oauth2_client.remove_all_in_zone",
        skip_all,
        fields(zone.id = %zone_id),
        err,
    )]
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error> {
        let mut removed = 0;
        self.state.clients.retain(|(client_zone, _), _| {
            let keep = *client_zone != zone_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
