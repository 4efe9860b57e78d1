// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::atomic::Ordering;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use uaa_data_model::{Clock, RevocationRecord, RevocationTarget};
use uaa_storage::revocation::RevocationRepository;

use crate::{MemoryStoreError, state::State};

/// An implementation of [`RevocationRepository`] for the in-memory store
pub struct MemoryRevocationRepository<'c> {
    state: &'c State,
}

impl<'c> MemoryRevocationRepository<'c> {
    pub(crate) fn new(state: &'c State) -> Self {
        Self { state }
    }

    fn new_record(&self, clock: &dyn Clock, target: RevocationTarget) -> RevocationRecord {
        RevocationRecord {
            target,
            sequence: self.state.sequence.load(Ordering::SeqCst),
            revoked_at: clock.now(),
        }
    }
}

#[async_trait]
impl RevocationRepository for MemoryRevocationRepository<'_> {
    type Error = MemoryStoreError;

    #[tracing::instrument(name = "memory.revocation.allocate_sequence", skip_all, err)]
    async fn allocate_sequence(&mut self) -> Result<u64, Self::Error> {
        let previous = self
            .state
            .sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(1)
            })
            .map_err(|_| MemoryStoreError::SequenceExhausted)?;

        Ok(previous + 1)
    }

    async fn current_sequence(&mut self) -> Result<u64, Self::Error> {
        Ok(self.state.sequence.load(Ordering::SeqCst))
    }

    #[tracing::instrument(
        name = "memory.revocation.record",
        skip_all,
        fields(revocation.target = ?target),
        err,
    )]
    async fn record(
        &mut self,
        clock: &dyn Clock,
        target: RevocationTarget,
    ) -> Result<RevocationRecord, Self::Error> {
        let record = self.new_record(clock, target.clone());

        let record = match self.state.revocations.entry(target) {
            Entry::Occupied(mut entry) => {
                let merged = entry.get().clone().merge(&record);
                entry.insert(merged.clone());
                merged
            }
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                record
            }
        };

        Ok(record)
    }

    #[tracing::instrument(
        name = "memory.revocation.revoke_once",
        skip_all,
        fields(revocation.target = ?target),
        err,
    )]
    async fn revoke_once(
        &mut self,
        clock: &dyn Clock,
        target: RevocationTarget,
    ) -> Result<Option<RevocationRecord>, Self::Error> {
        let record = self.new_record(clock, target.clone());

        match self.state.revocations.entry(target) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                Ok(Some(record))
            }
        }
    }

    async fn lookup(
        &mut self,
        target: &RevocationTarget,
    ) -> Result<Option<RevocationRecord>, Self::Error> {
        Ok(self
            .state
            .revocations
            .get(target)
            .map(|record| record.clone()))
    }
}
