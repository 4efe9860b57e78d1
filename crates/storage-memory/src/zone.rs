// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use uaa_data_model::{Clock, IdentityZone, ZoneDefinition};
use uaa_storage::{Page, Pagination, Update, zone::ZoneRepository};
use ulid::Ulid;

use crate::{MemoryStoreError, state::State};

/// An implementation of [`ZoneRepository`] for the in-memory store
pub struct MemoryZoneRepository<'c> {
    state: &'c State,
}

impl<'c> MemoryZoneRepository<'c> {
    pub(crate) fn new(state: &'c State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ZoneRepository for MemoryZoneRepository<'_> {
    type Error = MemoryStoreError;

    #[tracing::instrument(name = "memory.zone.lookup", skip_all, fields(zone.id = %id), err)]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<IdentityZone>, Self::Error> {
        Ok(self.state.zones.get(&id).map(|zone| zone.clone()))
    }

    #[tracing::instrument(
        name = "memory.zone.find_by_subdomain",
        skip_all,
        fields(zone.subdomain = subdomain),
        err,
    )]
    async fn find_by_subdomain(
        &mut self,
        subdomain: &str,
    ) -> Result<Option<IdentityZone>, Self::Error> {
        let Some(id) = self.state.zone_subdomains.get(subdomain).map(|id| *id) else {
            return Ok(None);
        };

        Ok(self.state.zones.get(&id).map(|zone| zone.clone()))
    }

    #[tracing::instrument(
        name = "memory.zone.add",
        skip_all,
        fields(zone.subdomain = %definition.subdomain, zone.id),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        definition: ZoneDefinition,
    ) -> Result<Option<IdentityZone>, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("zone.id", tracing::field::display(id));

        match self.state.zone_subdomains.entry(definition.subdomain.clone()) {
            Entry::Occupied(_) => return Ok(None),
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        let zone = IdentityZone {
            id,
            subdomain: definition.subdomain,
            name: definition.name,
            created_at,
            modified_at: created_at,
        };
        self.state.zones.insert(id, zone.clone());

        Ok(Some(zone))
    }

    #[tracing::instrument(name = "memory.zone.update", skip_all, fields(zone.id = %zone.id), err)]
    async fn update(&mut self, zone: IdentityZone) -> Result<Update<IdentityZone>, Self::Error> {
        let Some(previous) = self.state.zones.get(&zone.id).map(|zone| zone.subdomain.clone())
        else {
            return Ok(Update::NotFound);
        };

        if previous != zone.subdomain {
            match self.state.zone_subdomains.entry(zone.subdomain.clone()) {
                Entry::Occupied(_) => return Ok(Update::Conflict),
                Entry::Vacant(entry) => {
                    entry.insert(zone.id);
                }
            }
            self.state.zone_subdomains.remove(&previous);
        }

        self.state.zones.insert(zone.id, zone.clone());
        Ok(Update::Updated(zone))
    }

    #[tracing::instrument(name = "memory.zone.list", skip_all, err)]
    async fn list(&mut self, pagination: Pagination) -> Result<Page<IdentityZone>, Self::Error> {
        let mut zones: Vec<IdentityZone> = self
            .state
            .zones
            .iter()
            .map(|zone| zone.value().clone())
            .collect();
        zones.sort_by_key(|zone| zone.id);

        Ok(pagination.process(pagination.window(zones.into_iter())))
    }

    #[tracing::instrument(name = "memory.zone.remove", skip_all, fields(zone.id = %id), err)]
    async fn remove(&mut self, id: Ulid) -> Result<bool, Self::Error> {
        let Some((_, zone)) = self.state.zones.remove(&id) else {
            return Ok(false);
        };

        self.state
            .zone_subdomains
            .remove_if(&zone.subdomain, |_, owner| *owner == id);
        Ok(true)
    }
}
