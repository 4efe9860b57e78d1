// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use oauth2_types::requests::GrantType;
use rand::RngCore;
use tracing::info;
use uaa_data_model::{
    Client, ClientPatch, ClientRegistration, Clock, RevocationTarget, SecretHandle,
    ValidationError,
};
use uaa_storage::{BoxRepository, Page, Pagination, RepositoryAccess, Update};
use ulid::Ulid;
use url::Url;

use crate::{Core, Error, locks::LockKey};

/// Public clients can't authenticate, so they only get the grants where a
/// PKCE proof or a refresh token stands in for the secret
pub(crate) const PUBLIC_CLIENT_GRANTS: [GrantType; 2] =
    [GrantType::AuthorizationCode, GrantType::RefreshToken];

fn check_client_shape(
    grant_types: &[GrantType],
    redirect_uris: &[Url],
    public: bool,
) -> Result<(), ValidationError> {
    if public
        && grant_types
            .iter()
            .any(|grant_type| !PUBLIC_CLIENT_GRANTS.contains(grant_type))
    {
        return Err(ValidationError::malformed("grant_types"));
    }

    let redirects = grant_types
        .iter()
        .any(|grant_type| matches!(grant_type, GrantType::AuthorizationCode | GrantType::Implicit));
    if redirects && redirect_uris.is_empty() {
        return Err(ValidationError::empty("redirect_uris"));
    }

    Ok(())
}

impl Core {
    async fn hash_client_secret(
        &self,
        rng: &mut (dyn RngCore + Send),
        secret: Option<String>,
    ) -> Result<Option<SecretHandle>, Error> {
        match secret {
            Some(secret) => Ok(Some(
                self.passwords
                    .hash(rng, secret)
                    .await
                    .map_err(Error::internal)?,
            )),
            None => Ok(None),
        }
    }

    /// Register a client in a zone. Its secret, if any, is hashed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`], [`Error::ZoneNotFound`], or
    /// [`Error::ClientConflict`] if the client ID is taken in this zone
    #[tracing::instrument(
        name = "core.client.register",
        skip_all,
        fields(zone.id = %zone_id, client.id = %registration.client_id),
        err,
    )]
    pub async fn register_client(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        mut registration: ClientRegistration,
    ) -> Result<Client, Error> {
        registration.validate()?;
        check_client_shape(
            &registration.grant_types,
            &registration.redirect_uris,
            registration.client_secret.is_none(),
        )?;

        self.require_zone(&mut repo, zone_id).await?;

        // Refuse early, before hashing the secret
        if repo
            .clients()
            .lookup(zone_id, &registration.client_id)
            .await?
            .is_some()
        {
            return Err(Error::ClientConflict);
        }

        let secret = self
            .hash_client_secret(rng, registration.client_secret.take())
            .await?;

        let client = repo
            .clients()
            .add(rng, clock, zone_id, registration, secret)
            .await?
            .ok_or(Error::ClientConflict)?;

        repo.save().await?;

        info!(public = client.is_public(), "Registered client");
        Ok(client)
    }

    /// # Errors
    ///
    /// Returns [`Error::ClientMetadataNotFound`] if the client is not
    /// registered in this zone
    pub async fn get_client(
        &self,
        mut repo: BoxRepository,
        zone_id: Ulid,
        client_id: &str,
    ) -> Result<Client, Error> {
        repo.clients()
            .lookup(zone_id, client_id)
            .await?
            .ok_or(Error::ClientMetadataNotFound)
    }

    /// # Errors
    ///
    /// Returns [`Error::ClientMetadataNotFound`] or [`Error::Validation`]
    #[tracing::instrument(
        name = "core.client.update",
        skip_all,
        fields(zone.id = %zone_id, client.id = %client_id),
        err,
    )]
    pub async fn update_client(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        client_id: &str,
        patch: ClientPatch,
    ) -> Result<Client, Error> {
        let client = repo
            .clients()
            .lookup(zone_id, client_id)
            .await?
            .ok_or(Error::ClientMetadataNotFound)?;

        let client = client.with_patch(patch, clock.now())?;
        check_client_shape(&client.grant_types, &client.redirect_uris, client.is_public())?;

        let client = Self::store_client_update(&mut repo, client).await?;
        repo.save().await?;
        Ok(client)
    }

    /// Delete a client, revoking every token issued through it first
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientMetadataNotFound`]
    #[tracing::instrument(
        name = "core.client.delete",
        skip_all,
        fields(zone.id = %zone_id, client.id = %client_id),
        err,
    )]
    pub async fn delete_client(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        client_id: &str,
    ) -> Result<(), Error> {
        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = self.locks.write(LockKey::client(zone_id, client_id)).await;

        let client = repo
            .clients()
            .lookup(zone_id, client_id)
            .await?
            .ok_or(Error::ClientMetadataNotFound)?;

        repo.revocations()
            .record(
                clock,
                RevocationTarget::Client {
                    zone_id,
                    client_id: client.client_id.clone(),
                },
            )
            .await?;

        if !repo.clients().remove(zone_id, &client.client_id).await? {
            return Err(Error::ClientMetadataNotFound);
        }

        repo.save().await?;
        info!("Deleted client");
        Ok(())
    }

    /// Replace the secret of a client, and revoke every token issued through
    /// it. `None` turns it into a public client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientMetadataNotFound`], or [`Error::Validation`]
    /// if the client would end up public with grants public clients can't use
    #[tracing::instrument(
        name = "core.client.rotate_secret",
        skip_all,
        fields(zone.id = %zone_id, client.id = %client_id),
        err,
    )]
    pub async fn rotate_client_secret(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        client_id: &str,
        secret: Option<String>,
    ) -> Result<Client, Error> {
        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = self.locks.write(LockKey::client(zone_id, client_id)).await;

        let client = repo
            .clients()
            .lookup(zone_id, client_id)
            .await?
            .ok_or(Error::ClientMetadataNotFound)?;

        if let Some(secret) = &secret
            && secret.trim().is_empty()
        {
            return Err(ValidationError::empty("client_secret").into());
        }
        check_client_shape(&client.grant_types, &client.redirect_uris, secret.is_none())?;

        let secret = self.hash_client_secret(rng, secret).await?;
        let client = client.with_secret(secret, clock.now());
        let client = Self::store_client_update(&mut repo, client).await?;

        repo.revocations()
            .record(
                clock,
                RevocationTarget::Client {
                    zone_id,
                    client_id: client.client_id.clone(),
                },
            )
            .await?;

        repo.save().await?;
        info!("Rotated client secret, revoked every token of the client");
        Ok(client)
    }

    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`]
    pub async fn list_clients(
        &self,
        mut repo: BoxRepository,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<Client>, Error> {
        self.require_zone(&mut repo, zone_id).await?;
        Ok(repo.clients().list(zone_id, pagination).await?)
    }

    async fn store_client_update(
        repo: &mut BoxRepository,
        client: Client,
    ) -> Result<Client, Error> {
        match repo.clients().update(client).await? {
            Update::Updated(client) => Ok(client),
            Update::NotFound => Err(Error::ClientMetadataNotFound),
            Update::Conflict => Err(Error::ClientConflict),
        }
    }
}
