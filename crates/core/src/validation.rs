// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use oauth2_types::{
    requests::{GrantType, IntrospectionResponse},
    scope::Scope,
};
use tracing::{debug, info};
use uaa_data_model::{Clock, RevocationTarget, Subject, TokenClaims, TokenKind};
use uaa_storage::{BoxRepository, RepositoryAccess};
use ulid::Ulid;

use crate::{Core, Error, locks::LockKey};

/// Who presented a valid access token, and what they may do with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub token_id: Ulid,
    pub subject: Subject,
    pub client_id: String,
    pub zone_id: Ulid,
    pub scope: Scope,
    pub grant_type: GrantType,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    fn from_claims(claims: TokenClaims, subject: Subject) -> Self {
        Self {
            token_id: claims.jti,
            subject,
            client_id: claims.client_id,
            zone_id: claims.zid,
            scope: claims.scope,
            grant_type: claims.grant_type,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

impl Core {
    /// Check the signature and the structure of a token of the given kind,
    /// and its expiry. The store is not touched.
    pub(crate) fn parse_token(
        &self,
        clock: &dyn Clock,
        token: &str,
        kind: TokenKind,
    ) -> Result<TokenClaims, Error> {
        let claims: TokenClaims = self.keyset.verify(token).map_err(|e| {
            debug!(error = &e as &dyn std::error::Error, "Rejected token");
            Error::TokenMalformed
        })?;

        if claims.kind != kind {
            debug!(expected = %kind, got = %claims.kind, "Wrong kind of token");
            return Err(Error::TokenMalformed);
        }

        if claims.is_expired(clock.now()) {
            return Err(Error::TokenExpired);
        }

        Ok(claims)
    }

    /// Look for a revocation covering these claims
    pub(crate) async fn check_revocations(
        &self,
        repo: &mut BoxRepository,
        claims: &TokenClaims,
    ) -> Result<(), Error> {
        for target in RevocationTarget::candidates(claims) {
            if let Some(record) = repo.revocations().lookup(&target).await?
                && record.covers(claims)
            {
                debug!(?target, "Token revoked");
                return Err(Error::TokenRevoked);
            }
        }

        Ok(())
    }

    /// Validate an access token presented on a resource request.
    ///
    /// Every revocation which completed before this call is observed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenMalformed`] if the token is not one of our
    /// access tokens, [`Error::TokenExpired`], or [`Error::TokenRevoked`]
    #[tracing::instrument(name = "core.token.validate", skip_all, err(level = "debug"))]
    pub async fn validate(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        token: &str,
    ) -> Result<Principal, Error> {
        let claims = self.parse_token(clock, token, TokenKind::Access)?;
        self.check_revocations(&mut repo, &claims).await?;
        let subject = claims.subject().ok_or(Error::TokenMalformed)?;

        Ok(Principal::from_claims(claims, subject))
    }

    /// Like [`Core::validate`], but describing invalid tokens as inactive
    /// instead of failing.
    ///
    /// # Errors
    ///
    /// Only fails if the store does
    pub async fn introspect(
        &self,
        repo: BoxRepository,
        clock: &dyn Clock,
        token: &str,
    ) -> Result<IntrospectionResponse, Error> {
        match self.validate(repo, clock, token).await {
            Ok(principal) => Ok(IntrospectionResponse {
                active: true,
                scope: Some(principal.scope),
                client_id: Some(principal.client_id),
                sub: Some(principal.subject.to_string()),
                zid: Some(principal.zone_id.to_string()),
                iat: Some(principal.issued_at),
                exp: Some(principal.expires_at),
            }),
            Err(e) if e.is_internal() => Err(e),
            Err(_) => Ok(IntrospectionResponse::inactive()),
        }
    }

    /// Revoke a presented token. A refresh token takes the access token it
    /// was minted with down too.
    ///
    /// Expired or already revoked tokens can still be revoked, and revoking
    /// twice is the same as revoking once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenMalformed`] if the token was not signed by us,
    /// or belongs to another zone
    #[tracing::instrument(name = "core.token.revoke", skip_all, fields(zone.id = %zone_id), err)]
    pub async fn revoke_token(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        token: &str,
    ) -> Result<(), Error> {
        let claims: TokenClaims = self.keyset.verify(token).map_err(|e| {
            debug!(error = &e as &dyn std::error::Error, "Rejected token");
            Error::TokenMalformed
        })?;

        if claims.zid != zone_id {
            info!("Token belongs to another zone");
            return Err(Error::TokenMalformed);
        }

        let target = match claims.kind {
            TokenKind::Access => RevocationTarget::Token {
                token_id: claims.jti,
            },
            TokenKind::Refresh => RevocationTarget::Issuance {
                issuance_id: claims.iid,
            },
        };

        repo.revocations().record(clock, target).await?;
        repo.save().await?;

        info!(token.id = %claims.jti, kind = %claims.kind, "Revoked token");
        Ok(())
    }

    /// # Errors
    ///
    /// Only fails if the store does
    #[tracing::instrument(
        name = "core.token.revoke_by_id",
        skip_all,
        fields(token.id = %token_id),
        err,
    )]
    pub async fn revoke_token_by_id(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        token_id: Ulid,
    ) -> Result<(), Error> {
        repo.revocations()
            .record(clock, RevocationTarget::Token { token_id })
            .await?;
        repo.save().await?;
        Ok(())
    }

    /// Revoke every token issued so far to a user in a zone. Tokens minted
    /// afterwards are not affected.
    ///
    /// # Errors
    ///
    /// Only fails if the store does
    #[tracing::instrument(
        name = "core.token.revoke_user",
        skip_all,
        fields(zone.id = %zone_id, user.id = %user_id),
        err,
    )]
    pub async fn revoke_all_for_user(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        user_id: Ulid,
    ) -> Result<(), Error> {
        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _user = self.locks.write(LockKey::User(zone_id, user_id)).await;

        let record = repo
            .revocations()
            .record(clock, RevocationTarget::User { zone_id, user_id })
            .await?;
        repo.save().await?;

        info!(sequence = record.sequence, "Revoked every token of the user");
        Ok(())
    }

    /// Revoke every token issued so far through a client in a zone.
    ///
    /// # Errors
    ///
    /// Only fails if the store does
    #[tracing::instrument(
        name = "core.token.revoke_client",
        skip_all,
        fields(zone.id = %zone_id, client.id = %client_id),
        err,
    )]
    pub async fn revoke_all_for_client(
        &self,
        mut repo: BoxRepository,
        clock: &dyn Clock,
        zone_id: Ulid,
        client_id: &str,
    ) -> Result<(), Error> {
        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = self.locks.write(LockKey::client(zone_id, client_id)).await;

        let record = repo
            .revocations()
            .record(
                clock,
                RevocationTarget::Client {
                    zone_id,
                    client_id: client_id.to_owned(),
                },
            )
            .await?;
        repo.save().await?;

        info!(sequence = record.sequence, "Revoked every token of the client");
        Ok(())
    }
}
