// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Per-key serialization between token issuance and the operations which
//! revoke tokens.
//!
//! Issuance holds read locks on the zone, the client and the user for the
//! whole grant, from the first lookup to the signature. Deleting one of them,
//! rotating a client secret or changing a password holds the write lock. A
//! token is therefore either minted before the revocation is recorded, and
//! covered by it, or minted after, from the new state of the store.
//!
//! Locks are always taken in the zone, client, user order, at most one per
//! level.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Zone(Ulid),
    Client(Ulid, String),
    User(Ulid, Ulid),
}

impl LockKey {
    pub fn client(zone_id: Ulid, client_id: &str) -> Self {
        Self::Client(zone_id, client_id.to_owned())
    }
}

#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: DashMap<LockKey, Arc<RwLock<()>>>,
}

/// A held lock. The entry is dropped from the map once nobody holds or waits
/// for it anymore.
#[must_use]
pub(crate) struct KeyGuard<'a, G> {
    locks: &'a KeyLocks,
    key: LockKey,
    guard: Option<G>,
}

impl<G> Drop for KeyGuard<'_, G> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl KeyLocks {
    fn lock_for(&self, key: &LockKey) -> Arc<RwLock<()>> {
        self.locks.entry(key.clone()).or_default().value().clone()
    }

    pub async fn read(&self, key: LockKey) -> KeyGuard<'_, OwnedRwLockReadGuard<()>> {
        let guard = self.lock_for(&key).read_owned().await;
        KeyGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    pub async fn write(&self, key: LockKey) -> KeyGuard<'_, OwnedRwLockWriteGuard<()>> {
        let guard = self.lock_for(&key).write_owned().await;
        KeyGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
