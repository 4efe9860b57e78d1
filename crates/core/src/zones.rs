// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use rand::RngCore;
use tracing::info;
use uaa_data_model::{Clock, IdentityZone, RevocationTarget, ZoneDefinition, ZoneUpdate};
use uaa_storage::{BoxRepository, Page, Pagination, RepositoryAccess, Update};
use ulid::Ulid;

use crate::{Core, Error, ZoneDeletionPolicy, locks::LockKey};

impl Core {
    /// Provision a new identity zone
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid definition, and
    /// [`Error::ZoneConflict`] if the subdomain is already used
    #[tracing::instrument(
        name = "core.zone.create",
        skip_all,
        fields(zone.subdomain = %definition.subdomain, zone.id),
        err,
    )]
    pub async fn create_zone(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        definition: ZoneDefinition,
    ) -> Result<IdentityZone, Error> {
        let definition = definition.validate()?;

        let zone = repo
            .zones()
            .add(rng, clock, definition)
            .await?
            .ok_or(Error::ZoneConflict)?;

        repo.save().await?;

        tracing::Span::current().record("zone.id", tracing::field::display(zone.id));
        info!("Created identity zone");
        Ok(zone)
    }

    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`] if there is no such zone
    pub async fn get_zone(&self, mut repo: BoxRepository, id: Ulid) -> Result<IdentityZone, Error> {
        repo.zones().lookup(id).await?.ok_or(Error::ZoneNotFound)
    }

    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`] if there is no zone on this subdomain
    pub async fn find_zone(
        &self,
        mut repo: BoxRepository,
        subdomain: &str,
    ) -> Result<IdentityZone, Error> {
        repo.zones()
            .find_by_subdomain(&subdomain.trim().to_ascii_lowercase())
            .await?
            .ok_or(Error::ZoneNotFound)
    }

    /// Edit the subdomain or the name of a zone. Its id never changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`], [`Error::Validation`], or
    /// [`Error::ZoneConflict`] if the new subdomain is taken
    #[tracing::instrument(name = "core.zone.update", skip_all, fields(zone.id = %id), err)]
    pub async fn update_zone(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        id: Ulid,
        update: ZoneUpdate,
    ) -> Result<IdentityZone, Error> {
        let zone = repo.zones().lookup(id).await?.ok_or(Error::ZoneNotFound)?;
        let zone = zone.with_update(update, clock.now())?;

        let zone = match repo.zones().update(zone).await? {
            Update::Updated(zone) => zone,
            Update::NotFound => return Err(Error::ZoneNotFound),
            Update::Conflict => return Err(Error::ZoneConflict),
        };

        repo.save().await?;
        Ok(zone)
    }

    /// # Errors
    ///
    /// Returns an error if the repository fails
    pub async fn list_zones(
        &self,
        mut repo: BoxRepository,
        pagination: Pagination,
    ) -> Result<Page<IdentityZone>, Error> {
        Ok(repo.zones().list(pagination).await?)
    }

    /// Delete a zone and everything in it.
    ///
    /// Every token of the zone is revoked before its users and clients are
    /// removed, so that no token outlives the principal it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneDeletionDisabled`] if the policy forbids it, and
    /// [`Error::ZoneNotFound`] if there is no such zone
    #[tracing::instrument(name = "core.zone.delete", skip_all, fields(zone.id = %id), err)]
    pub async fn delete_zone(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        id: Ulid,
    ) -> Result<(), Error> {
        if self.site_config.zone_deletion == ZoneDeletionPolicy::Disabled {
            return Err(Error::ZoneDeletionDisabled);
        }

        let _zone = self.locks.write(LockKey::Zone(id)).await;
        let zone = repo.zones().lookup(id).await?.ok_or(Error::ZoneNotFound)?;

        repo.revocations()
            .record(clock, RevocationTarget::Zone { zone_id: zone.id })
            .await?;

        let codes = repo.authorization_codes().remove_all_in_zone(zone.id).await?;
        let clients = repo.clients().remove_all_in_zone(zone.id).await?;
        let users = repo.users().remove_all_in_zone(zone.id).await?;
        repo.zones().remove(zone.id).await?;

        repo.save().await?;

        info!(codes, clients, users, "Deleted identity zone");
        Ok(())
    }

    pub(crate) async fn require_zone(
        &self,
        repo: &mut BoxRepository,
        zone_id: Ulid,
    ) -> Result<IdentityZone, Error> {
        repo.zones()
            .lookup(zone_id)
            .await?
            .ok_or(Error::ZoneNotFound)
    }
}
