// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use rand::RngCore;
use uaa_data_model::{Clock, PendingUser, User};
use uaa_storage::{Page, Pagination, Update, user::UserRepository};
use ulid::Ulid;

use crate::{MemoryStoreError, state::State};

/// An implementation of [`UserRepository`] for the in-memory store
pub struct MemoryUserRepository<'c> {
    state: &'c State,
}

impl<'c> MemoryUserRepository<'c> {
    pub(crate) fn new(state: &'c State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository<'_> {
    type Error = MemoryStoreError;

    #[tracing::instrument(
        name = "memory.user.lookup",
        skip_all,
        fields(zone.id = %zone_id, user.id = %id),
        err,
    )]
    async fn lookup(&mut self, zone_id: Ulid, id: Ulid) -> Result<Option<User>, Self::Error> {
        Ok(self
            .state
            .users
            .get(&id)
            .filter(|user| user.zone_id == zone_id)
            .map(|user| user.clone()))
    }

    #[tracing::instrument(
        name = "memory.user.find_by_username",
        skip_all,
        fields(zone.id = %zone_id, user.username = username),
        err,
    )]
    async fn find_by_username(
        &mut self,
        zone_id: Ulid,
        username: &str,
    ) -> Result<Option<User>, Self::Error> {
        let key = self.state.username_key(zone_id, username);
        let Some(id) = self.state.usernames.get(&key).map(|id| *id) else {
            return Ok(None);
        };

        // With a global scope, the username may belong to another zone
        Ok(self
            .state
            .users
            .get(&id)
            .filter(|user| user.zone_id == zone_id)
            .map(|user| user.clone()))
    }

    #[tracing::instrument(
        name = "memory.user.add",
        skip_all,
        fields(zone.id = %zone_id, user.username = %user.username, user.id),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        user: PendingUser,
    ) -> Result<Option<User>, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("user.id", tracing::field::display(id));

        let key = self.state.username_key(zone_id, &user.username);
        match self.state.usernames.entry(key) {
            Entry::Occupied(_) => return Ok(None),
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }

        let user = user.promote(zone_id, id, created_at);
        self.state.users.insert(id, user.clone());

        Ok(Some(user))
    }

    #[tracing::instrument(name = "memory.user.update", skip_all, fields(user.id = %user.id), err)]
    async fn update(&mut self, user: User) -> Result<Update<User>, Self::Error> {
        // The record stays locked until it is written, so that a concurrent
        // removal can't be undone
        let Some(mut existing) = self
            .state
            .users
            .get_mut(&user.id)
            .filter(|existing| existing.zone_id == user.zone_id)
        else {
            return Ok(Update::NotFound);
        };

        let previous_key = self.state.username_key(user.zone_id, &existing.username);
        let key = self.state.username_key(user.zone_id, &user.username);
        if previous_key != key {
            match self.state.usernames.entry(key) {
                Entry::Occupied(_) => return Ok(Update::Conflict),
                Entry::Vacant(entry) => {
                    entry.insert(user.id);
                }
            }
            self.state
                .usernames
                .remove_if(&previous_key, |_, owner| *owner == user.id);
        }

        *existing = user.clone();
        Ok(Update::Updated(user))
    }

    #[tracing::instrument(
        name = "memory.user.remove",
        skip_all,
        fields(zone.id = %zone_id, user.id = %id),
        err,
    )]
    async fn remove(&mut self, zone_id: Ulid, id: Ulid) -> Result<bool, Self::Error> {
        let Some((_, user)) = self
            .state
            .users
            .remove_if(&id, |_, user| user.zone_id == zone_id)
        else {
            return Ok(false);
        };

        let key = self.state.username_key(zone_id, &user.username);
        self.state.usernames.remove_if(&key, |_, owner| *owner == id);
        Ok(true)
    }

    #[tracing::instrument(name = "memory.user.list", skip_all, fields(zone.id = %zone_id), err)]
    async fn list(
        &mut self,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<User>, Self::Error> {
        let mut users: Vec<User> = self
            .state
            .users
            .iter()
            .filter(|user| user.zone_id == zone_id)
            .map(|user| user.value().clone())
            .collect();
        users.sort_by_key(|user| user.id);

        Ok(pagination.process(pagination.window(users.into_iter())))
    }

    #[tracing::instrument(
        name = "memory.user.remove_all_in_zone",
        skip_all,
        fields(zone.id = %zone_id),
        err,
    )]
    async fn remove_all_in_zone(&mut self, zone_id: Ulid) -> Result<usize, Self::Error> {
        let mut removed = Vec::new();
        self.state.users.retain(|_, user| {
            if user.zone_id == zone_id {
                removed.push((user.id, user.username.clone()));
                false
            } else {
                true
            }
        });

        for (id, username) in &removed {
            let key = self.state.username_key(zone_id, username);
            self.state.usernames.remove_if(&key, |_, owner| owner == id);
        }

        Ok(removed.len())
    }
}
