// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use oauth2_types::{requests::AccessTokenResponse, scope::Scope};
use rand::RngCore;
use tracing::info;
use uaa_data_model::{
    AlreadyPersistedError, Clock, Credential, ExternalIdentity, PendingUser, ProfileUpdate,
    RevocationTarget, ScimUser, User, UserRecord, ValidationError,
};
use uaa_storage::{BoxRepository, Page, Pagination, RepositoryAccess, Update};
use ulid::Ulid;

use crate::{Core, Error, locks::LockKey};

/// Sign-up data of a local user
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Build a pending user with the default authorities
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first empty field
    pub fn pending_user(
        &self,
        username: String,
        credential: Credential,
        email: String,
        given_name: String,
        family_name: String,
    ) -> Result<PendingUser, Error> {
        Ok(PendingUser::new(
            username,
            credential,
            email,
            given_name,
            family_name,
            self.site_config.default_authorities.clone(),
        )?)
    }

    /// Turn an identity asserted by an external provider into a pending user
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first empty field
    pub fn normalize_from_external(
        &self,
        identity: ExternalIdentity,
    ) -> Result<PendingUser, Error> {
        Ok(identity.normalize(self.site_config.default_authorities.clone())?)
    }

    /// Sign up a local user
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first empty field,
    /// [`Error::ZoneNotFound`] or [`Error::UserConflict`]
    #[tracing::instrument(
        name = "core.user.create",
        skip_all,
        fields(zone.id = %zone_id, user.username = %new_user.username, user.id),
        err,
    )]
    pub async fn create_user(
        &self,
        repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        new_user: NewUser,
    ) -> Result<User, Error> {
        // Check the profile before paying for the hash
        let mut pending = self.pending_user(
            new_user.username,
            Credential::secret(String::new()),
            new_user.email,
            new_user.given_name,
            new_user.family_name,
        )?;

        if new_user.password.is_empty() {
            return Err(ValidationError::empty("password").into());
        }

        let handle = self
            .passwords
            .hash(rng, new_user.password)
            .await
            .map_err(Error::internal)?;
        pending.credential = Credential::Secret { handle };

        self.save_user(repo, rng, clock, zone_id, pending.into()).await
    }

    /// Persist a user record, assigning it an id. Records which already have
    /// one are refused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyPersisted`], [`Error::ZoneNotFound`] or
    /// [`Error::UserConflict`] if the username is taken
    pub async fn save_user(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        record: UserRecord,
    ) -> Result<User, Error> {
        let pending = match record {
            UserRecord::Pending(pending) => pending,
            UserRecord::Persisted(user) => {
                return Err(AlreadyPersistedError { id: user.id }.into());
            }
        };

        self.require_zone(&mut repo, zone_id).await?;

        let user = repo
            .users()
            .add(rng, clock, zone_id, pending)
            .await?
            .ok_or(Error::UserConflict)?;

        repo.save().await?;

        tracing::Span::current().record("user.id", tracing::field::display(user.id));
        info!(user.id = %user.id, "Saved new user");
        Ok(user)
    }

    /// Create or refresh the local shadow of an externally authenticated
    /// user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`], [`Error::ZoneNotFound`], or
    /// [`Error::UserConflict`] if the username belongs to a user of another
    /// origin
    #[tracing::instrument(
        name = "core.user.provision_external",
        skip_all,
        fields(zone.id = %zone_id, user.origin = %identity.origin),
        err,
    )]
    pub async fn provision_external_user(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        identity: ExternalIdentity,
    ) -> Result<User, Error> {
        let pending = self.normalize_from_external(identity)?;
        self.require_zone(&mut repo, zone_id).await?;

        let Some(existing) = repo
            .users()
            .find_by_username(zone_id, &pending.username)
            .await?
        else {
            return self.save_user(repo, rng, clock, zone_id, pending.into()).await;
        };

        if existing.origin != pending.origin {
            return Err(Error::UserConflict);
        }

        let update = ProfileUpdate {
            username: None,
            email: Some(pending.email),
            given_name: Some(pending.given_name),
            family_name: Some(pending.family_name),
        };
        let mut user = existing.with_profile(update, clock.now())?;
        user.external_id = pending.external_id;

        let user = Self::store_update(&mut repo, user).await?;
        repo.save().await?;
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if there is no such user in the zone
    pub async fn get_user(
        &self,
        mut repo: BoxRepository,
        zone_id: Ulid,
        id: Ulid,
    ) -> Result<User, Error> {
        repo.users()
            .lookup(zone_id, id)
            .await?
            .ok_or(Error::UserNotFound)
    }

    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if there is no such user in the zone
    pub async fn find_user(
        &self,
        mut repo: BoxRepository,
        zone_id: Ulid,
        username: &str,
    ) -> Result<User, Error> {
        repo.users()
            .find_by_username(zone_id, username)
            .await?
            .ok_or(Error::UserNotFound)
    }

    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`], [`Error::Validation`], or
    /// [`Error::UserConflict`] when renaming to a taken username
    #[tracing::instrument(
        name = "core.user.update_profile",
        skip_all,
        fields(zone.id = %zone_id, user.id = %id),
        err,
    )]
    pub async fn update_user_profile(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        id: Ulid,
        update: ProfileUpdate,
    ) -> Result<User, Error> {
        let user = repo
            .users()
            .lookup(zone_id, id)
            .await?
            .ok_or(Error::UserNotFound)?;

        let user = user.with_profile(update, clock.now())?;
        let user = Self::store_update(&mut repo, user).await?;

        repo.save().await?;
        Ok(user)
    }

    /// Replace the authorities of a user. Tokens already issued keep the
    /// scope they were granted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`]
    pub async fn set_user_authorities(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        id: Ulid,
        authorities: Scope,
    ) -> Result<User, Error> {
        let user = repo
            .users()
            .lookup(zone_id, id)
            .await?
            .ok_or(Error::UserNotFound)?;

        let user = user.with_authorities(authorities, clock.now());
        let user = Self::store_update(&mut repo, user).await?;

        repo.save().await?;
        Ok(user)
    }

    /// Change the password of a local user, and revoke every token issued to
    /// them.
    ///
    /// If `current_password` is given, it must match. If `reissue_for` names a
    /// client, a new token pair is minted for it after the revocation, and
    /// stays valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`], [`Error::InvalidGrant`] if the current
    /// password doesn't match, [`Error::InvalidRequest`] for users whose
    /// credential is managed elsewhere, and [`Error::InvalidClient`] if the
    /// client to reissue for does not exist
    #[tracing::instrument(
        name = "core.user.change_password",
        skip_all,
        fields(zone.id = %zone_id, user.id = %user_id),
        err,
    )]
    #[allow(clippy::too_many_arguments)]
    pub async fn change_password(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        user_id: Ulid,
        current_password: Option<String>,
        new_password: String,
        reissue_for: Option<&str>,
    ) -> Result<Option<AccessTokenResponse>, Error> {
        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = match reissue_for {
            Some(client_id) => Some(self.locks.read(LockKey::client(zone_id, client_id)).await),
            None => None,
        };
        let _user = self.locks.write(LockKey::User(zone_id, user_id)).await;

        let user = repo
            .users()
            .lookup(zone_id, user_id)
            .await?
            .ok_or(Error::UserNotFound)?;

        if matches!(user.credential, Credential::Delegated { .. }) {
            return Err(Error::InvalidRequest(
                "the credential of this user is managed by an external provider",
            ));
        }

        if new_password.is_empty() {
            return Err(ValidationError::empty("password").into());
        }

        if let Some(current_password) = current_password
            && !self.verifier.verify(&user.credential, &current_password).await?
        {
            info!("Current password mismatch");
            return Err(Error::InvalidGrant);
        }

        let client = match reissue_for {
            Some(client_id) => Some(
                repo.clients()
                    .lookup(zone_id, client_id)
                    .await?
                    .ok_or(Error::InvalidClient)?,
            ),
            None => None,
        };

        let handle = self
            .passwords
            .hash(rng, new_password)
            .await
            .map_err(Error::internal)?;
        let user = user.with_credential(Credential::Secret { handle }, clock.now());
        let user = Self::store_update(&mut repo, user).await?;

        repo.revocations()
            .record(
                clock,
                RevocationTarget::User {
                    zone_id,
                    user_id: user.id,
                },
            )
            .await?;
        info!("Password changed, revoked every token of the user");

        let reply = match client {
            Some(client) => Some(
                self.mint_for_user(&mut repo, rng, clock, &client, &user, None)
                    .await?,
            ),
            None => None,
        };

        repo.save().await?;
        Ok(reply)
    }

    /// Delete a user, revoking its tokens first
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`]
    #[tracing::instrument(
        name = "core.user.delete",
        skip_all,
        fields(zone.id = %zone_id, user.id = %id),
        err,
    )]
    pub async fn delete_user(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        id: Ulid,
    ) -> Result<(), Error> {
        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _user = self.locks.write(LockKey::User(zone_id, id)).await;

        let user = repo
            .users()
            .lookup(zone_id, id)
            .await?
            .ok_or(Error::UserNotFound)?;

        repo.revocations()
            .record(
                clock,
                RevocationTarget::User {
                    zone_id,
                    user_id: user.id,
                },
            )
            .await?;

        if !repo.users().remove(zone_id, user.id).await? {
            return Err(Error::UserNotFound);
        }

        repo.save().await?;
        info!("Deleted user");
        Ok(())
    }

    /// List the users of a zone, in their SCIM representation
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZoneNotFound`]
    pub async fn list_users(
        &self,
        mut repo: BoxRepository,
        zone_id: Ulid,
        pagination: Pagination,
    ) -> Result<Page<ScimUser>, Error> {
        self.require_zone(&mut repo, zone_id).await?;
        let page = repo.users().list(zone_id, pagination).await?;
        Ok(page.map(|user| user.to_scim()))
    }

    async fn store_update(repo: &mut BoxRepository, user: User) -> Result<User, Error> {
        match repo.users().update(user).await? {
            Update::Updated(user) => Ok(user),
            Update::NotFound => Err(Error::UserNotFound),
            Update::Conflict => Err(Error::UserConflict),
        }
    }
}
