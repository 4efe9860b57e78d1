// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to record token revocations
//!
//! Tokens are self-contained, so the store never holds them. What it holds is
//! the issuance sequence, a counter stamped into every token, and a record per
//! revoked target. A set revocation (user, client or zone) captures the
//! current value of the sequence, so that tokens issued afterwards are not
//! covered by it.

use async_trait::async_trait;
use uaa_data_model::{Clock, RevocationRecord, RevocationTarget};

use crate::repository_impl;

/// A [`RevocationRepository`] helps interacting with [`RevocationRecord`]s
/// and the issuance sequence
#[async_trait]
pub trait RevocationRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Allocate the next issuance sequence number
    ///
    /// Numbers are strictly increasing across the whole store, and the first
    /// one allocated is `1`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn allocate_sequence(&mut self) -> Result<u64, Self::Error>;

    /// The last issuance sequence number allocated, `0` if none was
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn current_sequence(&mut self) -> Result<u64, Self::Error>;

    /// Revoke a target
    ///
    /// Revoking the same target again merges with the existing record: the
    /// record then covers everything issued up to now, and keeps the first
    /// revocation time.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn record(
        &mut self,
        clock: &dyn Clock,
        target: RevocationTarget,
    ) -> Result<RevocationRecord, Self::Error>;

    /// Revoke a target, only if it was not already revoked
    ///
    /// Returns `None` if a record already exists for this target. Of two
    /// concurrent callers, exactly one gets the record.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn revoke_once(
        &mut self,
        clock: &dyn Clock,
        target: RevocationTarget,
    ) -> Result<Option<RevocationRecord>, Self::Error>;

    /// Lookup the [`RevocationRecord`] of a target
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(
        &mut self,
        target: &RevocationTarget,
    ) -> Result<Option<RevocationRecord>, Self::Error>;
}

repository_impl!(RevocationRepository:
    async fn allocate_sequence(&mut self) -> Result<u64, Self::Error>;
    async fn current_sequence(&mut self) -> Result<u64, Self::Error>;
    async fn record(
        &mut self,
        clock: &dyn Clock,
        target: RevocationTarget,
    ) -> Result<RevocationRecord, Self::Error>;
    async fn revoke_once(
        &mut self,
        clock: &dyn Clock,
        target: RevocationTarget,
    ) -> Result<Option<RevocationRecord>, Self::Error>;
    async fn lookup(
        &mut self,
        target: &RevocationTarget,
    ) -> Result<Option<RevocationRecord>, Self::Error>;
);
