// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! The grant state machine: from a token request or an authorization request
//! to a freshly signed token pair.

use chrono::{DateTime, Duration, Utc};
use oauth2_types::{
    pkce::PkceCodeChallengeMethod,
    requests::{
        AccessTokenRequest, AccessTokenResponse, AuthorizationCodeGrant, AuthorizationRequest,
        AuthorizationResponse, ClientCredentialsGrant, GrantType, PasswordGrant,
        RefreshTokenGrant, ResponseType,
    },
    scope::Scope,
};
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info};
use uaa_data_model::{Client, Clock, Pkce, RevocationTarget, Subject, TokenClaims, TokenKind, User};
use uaa_storage::{BoxRepository, RepositoryAccess, oauth2::AuthorizationCodeParams};
use ulid::Ulid;
use url::Url;

use crate::{
    Core, Error,
    clients::PUBLIC_CLIENT_GRANTS,
    locks::LockKey,
};

/// How a client authenticated on a token request
#[derive(Clone, PartialEq, Eq)]
pub enum ClientCredentials {
    /// Only the `client_id` was presented. Public clients authenticate this
    /// way.
    None { client_id: String },

    /// The `client_id` and its secret
    ClientSecret {
        client_id: String,
        client_secret: String,
    },
}

impl ClientCredentials {
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::None { client_id } | Self::ClientSecret { client_id, .. } => client_id,
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None { client_id } => f
                .debug_struct("None")
                .field("client_id", client_id)
                .finish(),
            Self::ClientSecret { client_id, .. } => f
                .debug_struct("ClientSecret")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// A successful authorization request: what to send back, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized<T> {
    /// The redirect URI resolved for the client
    pub redirect_uri: Url,

    /// The parameters to deliver on that redirect URI
    pub response: T,
}

/// The response of the authorization endpoint for the `token` response type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImplicitResponse {
    #[serde(flatten)]
    pub token: AccessTokenResponse,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Everything a token is minted from, once the grant is settled
struct Grant<'a> {
    client: &'a Client,
    subject: Subject,
    scope: Scope,
    grant_type: GrantType,
}

impl Grant<'_> {
    fn claims(
        &self,
        rng: &mut (dyn RngCore + Send),
        kind: TokenKind,
        issuance_id: Ulid,
        sequence: u64,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> TokenClaims {
        TokenClaims {
            jti: Ulid::from_datetime_with_source(issued_at.into(), rng),
            iid: issuance_id,
            seq: sequence,
            kind,
            sub: self.subject.to_string(),
            sub_kind: self.subject.kind(),
            client_id: self.client.client_id.clone(),
            zid: self.client.zone_id,
            scope: self.scope.clone(),
            grant_type: self.grant_type,
            iat: issued_at,
            exp: issued_at + ttl,
        }
    }
}

/// Compute the scope to grant.
///
/// A request reaching outside what the client is allowed is rejected. No
/// request means the whole client scope. For user grants, the result is
/// then narrowed down to the authorities of the user.
fn grant_scope(
    requested: Option<&Scope>,
    client_scope: &Scope,
    eligible: Option<&Scope>,
) -> Result<Scope, Error> {
    let scope = match requested {
        Some(requested) if !requested.is_subset(client_scope) => {
            info!(
                denied = %requested.difference(client_scope),
                "Requested scope outside of the client scope"
            );
            return Err(Error::InvalidScope);
        }
        Some(requested) => requested.clone(),
        None => client_scope.clone(),
    };

    let scope = match eligible {
        Some(eligible) => scope.intersection(eligible),
        None => scope,
    };

    if scope.is_empty() {
        info!("Nothing left to grant");
        return Err(Error::InvalidScope);
    }

    Ok(scope)
}

/// Narrow a scope granted earlier down to what the client and the user are
/// allowed now
fn narrow_scope(
    granted: &Scope,
    client_scope: &Scope,
    eligible: Option<&Scope>,
) -> Result<Scope, Error> {
    let scope = granted.intersection(client_scope);
    let scope = match eligible {
        Some(eligible) => scope.intersection(eligible),
        None => scope,
    };

    if scope.is_empty() {
        info!("Nothing left of the original grant");
        return Err(Error::InvalidScope);
    }

    Ok(scope)
}

impl Core {
    /// Exchange a grant for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClient`] if the client is unknown or may not
    /// use this grant, [`Error::InvalidClientCredentials`] if it failed to
    /// authenticate, [`Error::InvalidGrant`] if the grant itself is bad, and
    /// [`Error::InvalidScope`] if the requested scope can't be granted
    #[tracing::instrument(
        name = "core.token.issue",
        skip_all,
        fields(
            zone.id = %zone_id,
            client.id = %credentials.client_id(),
            grant_type = %request.grant_type(),
        ),
        err,
    )]
    pub async fn issue_token(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        credentials: ClientCredentials,
        request: AccessTokenRequest,
    ) -> Result<AccessTokenResponse, Error> {
        let grant_type = request.grant_type();

        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = self
            .locks
            .read(LockKey::client(zone_id, credentials.client_id()))
            .await;

        let Some(client) = repo
            .clients()
            .lookup(zone_id, credentials.client_id())
            .await?
        else {
            info!("Unknown client");
            return Err(Error::InvalidClient);
        };

        if !client.allows_grant(grant_type) {
            info!("Grant type not allowed for this client");
            return Err(Error::InvalidClient);
        }

        self.authenticate_client(&client, &credentials, grant_type)
            .await?;

        let reply = match request {
            AccessTokenRequest::AuthorizationCode(grant) => {
                self.authorization_code_grant(&mut repo, rng, clock, &client, grant)
                    .await?
            }
            AccessTokenRequest::Password(grant) => {
                self.password_grant(&mut repo, rng, clock, &client, grant)
                    .await?
            }
            AccessTokenRequest::ClientCredentials(grant) => {
                self.client_credentials_grant(&mut repo, rng, clock, &client, grant)
                    .await?
            }
            AccessTokenRequest::RefreshToken(grant) => {
                self.refresh_token_grant(&mut repo, rng, clock, &client, grant)
                    .await?
            }
            _ => return Err(Error::InvalidRequest("unsupported grant_type")),
        };

        repo.save().await?;
        Ok(reply)
    }

    async fn authenticate_client(
        &self,
        client: &Client,
        credentials: &ClientCredentials,
        grant_type: GrantType,
    ) -> Result<(), Error> {
        match (&client.secret, credentials) {
            (Some(handle), ClientCredentials::ClientSecret { client_secret, .. }) => {
                let valid = self
                    .passwords
                    .verify(handle, client_secret.clone())
                    .await
                    .map_err(Error::internal)?;

                if !valid {
                    info!("Client secret mismatch");
                    return Err(Error::InvalidClientCredentials);
                }
            }

            (Some(_), ClientCredentials::None { .. }) => {
                info!("Confidential client presented no secret");
                return Err(Error::InvalidClientCredentials);
            }

            (None, ClientCredentials::ClientSecret { .. }) => {
                info!("Public client presented a secret");
                return Err(Error::InvalidClientCredentials);
            }

            // The code verifier or the refresh token authenticates those
            (None, ClientCredentials::None { .. }) => {
                if !PUBLIC_CLIENT_GRANTS.contains(&grant_type) {
                    info!("Public client used a grant needing authentication");
                    return Err(Error::InvalidClientCredentials);
                }
            }
        }

        Ok(())
    }

    async fn password_grant(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client: &Client,
        grant: PasswordGrant,
    ) -> Result<AccessTokenResponse, Error> {
        // Unknown users and bad passwords are the same error to the caller,
        // and cost the same
        let Some(user_id) = repo
            .users()
            .find_by_username(client.zone_id, &grant.username)
            .await?
            .map(|user| user.id)
        else {
            self.passwords
                .verify_dummy(grant.password)
                .await
                .map_err(Error::internal)?;
            info!("Login attempt for an unknown user");
            return Err(Error::InvalidGrant);
        };

        let _user = self.locks.read(LockKey::User(client.zone_id, user_id)).await;
        let Some(user) = repo.users().lookup(client.zone_id, user_id).await? else {
            info!(user.id = %user_id, "User deleted during the login attempt");
            return Err(Error::InvalidGrant);
        };

        if !self.verifier.verify(&user.credential, &grant.password).await? {
            info!(user.id = %user.id, "Login attempt with invalid credentials");
            return Err(Error::InvalidGrant);
        }

        self.mint_for_user(repo, rng, clock, client, &user, grant.scope.as_ref())
            .await
    }

    async fn client_credentials_grant(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client: &Client,
        grant: ClientCredentialsGrant,
    ) -> Result<AccessTokenResponse, Error> {
        let scope = grant_scope(grant.scope.as_ref(), &client.scope, None)?;
        let grant = Grant {
            client,
            subject: Subject::Client(client.client_id.clone()),
            scope,
            grant_type: GrantType::ClientCredentials,
        };

        self.mint(repo, rng, clock, &grant).await
    }

    async fn authorization_code_grant(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client: &Client,
        grant: AuthorizationCodeGrant,
    ) -> Result<AccessTokenResponse, Error> {
        // Consuming first makes the redemption atomic. A code which then
        // fails a check is gone for good.
        let Some(code) = repo.authorization_codes().consume(&grant.code).await? else {
            info!("Unknown or already redeemed authorization code");
            return Err(Error::InvalidGrant);
        };

        if code.zone_id != client.zone_id || code.client_id != client.client_id {
            info!("Authorization code issued to another client");
            return Err(Error::InvalidGrant);
        }

        if code.is_expired(clock.now()) {
            info!("Authorization code expired");
            return Err(Error::InvalidGrant);
        }

        if !code.redirect_uri_matches(grant.redirect_uri.as_ref()) {
            info!("redirect_uri does not match the authorization request");
            return Err(Error::InvalidGrant);
        }

        match (&code.pkce, &grant.code_verifier) {
            (Some(pkce), Some(verifier)) => {
                if let Err(e) = pkce.verify(verifier) {
                    info!(error = &e as &dyn std::error::Error, "PKCE verification failed");
                    return Err(Error::InvalidGrant);
                }
            }
            (Some(_), None) => {
                info!("Missing code_verifier");
                return Err(Error::InvalidGrant);
            }
            (None, Some(_)) => {
                info!("Unexpected code_verifier");
                return Err(Error::InvalidGrant);
            }
            (None, None) if client.is_public() => {
                info!("Public client redeemed a code without PKCE");
                return Err(Error::InvalidGrant);
            }
            (None, None) => {}
        }

        let _user = self.locks.read(LockKey::User(code.zone_id, code.user_id)).await;
        let Some(user) = repo.users().lookup(code.zone_id, code.user_id).await? else {
            info!(user.id = %code.user_id, "The user of this code is gone");
            return Err(Error::InvalidGrant);
        };

        let grant = Grant {
            client,
            subject: Subject::User(user.id),
            scope: narrow_scope(&code.scope, &client.scope, Some(&user.authorities))?,
            grant_type: GrantType::AuthorizationCode,
        };

        self.mint(repo, rng, clock, &grant).await
    }

    async fn refresh_token_grant(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client: &Client,
        grant: RefreshTokenGrant,
    ) -> Result<AccessTokenResponse, Error> {
        let invalid = |e: Error| {
            if e.is_internal() {
                return e;
            }
            info!(error = &e as &dyn std::error::Error, "Invalid refresh token");
            Error::InvalidGrant
        };

        let claims = self
            .parse_token(clock, &grant.refresh_token, TokenKind::Refresh)
            .map_err(invalid)?;

        if claims.zid != client.zone_id || claims.client_id != client.client_id {
            info!("Refresh token issued to another client");
            return Err(Error::InvalidGrant);
        }

        let Some(subject) = claims.subject() else {
            return Err(Error::InvalidGrant);
        };

        // Revocations are checked under the lock of the user, so that a
        // concurrent password change can't be missed
        let _user = match &subject {
            Subject::User(user_id) => {
                Some(self.locks.read(LockKey::User(claims.zid, *user_id)).await)
            }
            Subject::Client(_) => None,
        };

        self.check_revocations(repo, &claims)
            .await
            .map_err(invalid)?;

        // The subject must still exist, a deleted user can't refresh
        let eligible = match &subject {
            Subject::User(user_id) => {
                let Some(user) = repo.users().lookup(claims.zid, *user_id).await? else {
                    info!(user.id = %user_id, "The user of this refresh token is gone");
                    return Err(Error::InvalidGrant);
                };
                Some(user.authorities)
            }
            Subject::Client(_) => None,
        };

        let scope = match grant.scope {
            Some(scope) if !scope.is_subset(&claims.scope) => {
                info!("Refresh requested a wider scope than the original grant");
                return Err(Error::InvalidScope);
            }
            Some(scope) => scope,
            None => claims.scope.clone(),
        };

        // The client or the user may have lost some of it since
        let scope = narrow_scope(&scope, &client.scope, eligible.as_ref())?;

        let refreshed = Grant {
            client,
            subject,
            scope,
            grant_type: claims.grant_type,
        };

        if !self.site_config.refresh_token_rotation {
            return self
                .mint_access_only(repo, rng, clock, &refreshed, claims.iid)
                .await
                .map(|reply| reply.with_refresh_token(grant.refresh_token));
        }

        // Of two concurrent refreshes with the same token, only one wins
        if repo
            .revocations()
            .revoke_once(
                clock,
                RevocationTarget::Token {
                    token_id: claims.jti,
                },
            )
            .await?
            .is_none()
        {
            info!(token.id = %claims.jti, "Refresh token replayed");
            return Err(Error::InvalidGrant);
        }

        self.mint(repo, rng, clock, &refreshed).await
    }

    /// Mint a token pair for a user, through a client.
    pub(crate) async fn mint_for_user(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client: &Client,
        user: &User,
        requested: Option<&Scope>,
    ) -> Result<AccessTokenResponse, Error> {
        let scope = grant_scope(requested, &client.scope, Some(&user.authorities))?;
        let grant = Grant {
            client,
            subject: Subject::User(user.id),
            scope,
            grant_type: GrantType::Password,
        };

        self.mint(repo, rng, clock, &grant).await
    }

    /// Mint an access token with a fresh issuance ID, and the refresh token
    /// sharing it if the client may refresh
    async fn mint(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        grant: &Grant<'_>,
    ) -> Result<AccessTokenResponse, Error> {
        let issuance_id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        let reply = self
            .mint_access_only(repo, rng, clock, grant, issuance_id)
            .await?;

        if grant.grant_type == GrantType::Implicit
            || !grant.client.allows_grant(GrantType::RefreshToken)
        {
            return Ok(reply);
        }

        let sequence = repo.revocations().allocate_sequence().await?;
        let ttl = grant
            .client
            .refresh_token_ttl(self.site_config.refresh_token_ttl);
        let claims = grant.claims(
            rng,
            TokenKind::Refresh,
            issuance_id,
            sequence,
            clock.now(),
            ttl,
        );
        let refresh_token = self.sign(&claims)?;

        Ok(reply.with_refresh_token(refresh_token))
    }

    async fn mint_access_only(
        &self,
        repo: &mut BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        grant: &Grant<'_>,
        issuance_id: Ulid,
    ) -> Result<AccessTokenResponse, Error> {
        let sequence = repo.revocations().allocate_sequence().await?;
        let ttl = grant
            .client
            .access_token_ttl(self.site_config.access_token_ttl);
        let claims = grant.claims(
            rng,
            TokenKind::Access,
            issuance_id,
            sequence,
            clock.now(),
            ttl,
        );
        let access_token = self.sign(&claims)?;

        debug!(
            token.id = %claims.jti,
            issuance.id = %issuance_id,
            sub = %grant.subject,
            scope = %grant.scope,
            "Minted access token"
        );

        Ok(AccessTokenResponse::new(access_token)
            .with_expires_in(ttl)
            .with_scope(grant.scope.clone()))
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, Error> {
        self.keyset.sign(claims).map_err(Error::internal)
    }

    /// Check an authorization request for a user who is already
    /// authenticated, and store a single-use authorization code for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClient`] if the client is unknown or may not
    /// use the authorization code grant, [`Error::InvalidRequest`] for a bad
    /// redirect URI or PKCE parameters, [`Error::UserNotFound`], and
    /// [`Error::InvalidScope`]
    #[tracing::instrument(
        name = "core.authorize.code",
        skip_all,
        fields(zone.id = %zone_id, client.id = %request.client_id, user.id = %user_id),
        err,
    )]
    pub async fn authorize(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        user_id: Ulid,
        request: AuthorizationRequest,
    ) -> Result<Authorized<AuthorizationResponse>, Error> {
        if request.response_type != ResponseType::Code {
            return Err(Error::InvalidRequest("unsupported response_type"));
        }

        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = self
            .locks
            .read(LockKey::client(zone_id, &request.client_id))
            .await;
        let _user = self.locks.read(LockKey::User(zone_id, user_id)).await;

        let (client, user) = self
            .resolve_authorization(
                &mut repo,
                zone_id,
                user_id,
                &request,
                GrantType::AuthorizationCode,
            )
            .await?;
        let redirect_uri = client
            .resolve_redirect_uri(request.redirect_uri.as_ref())?
            .clone();
        let scope = grant_scope(
            request.scope.as_ref(),
            &client.scope,
            Some(&user.authorities),
        )?;

        let pkce = match (request.code_challenge, request.code_challenge_method) {
            (Some(challenge), method) => Some(Pkce::new(
                method.unwrap_or(PkceCodeChallengeMethod::Plain),
                challenge,
            )),
            (None, Some(_)) => {
                return Err(Error::InvalidRequest(
                    "code_challenge_method given without a code_challenge",
                ));
            }
            (None, None) if client.is_public() => {
                return Err(Error::InvalidRequest("public clients must use PKCE"));
            }
            (None, None) => None,
        };

        let code = repo
            .authorization_codes()
            .add(
                rng,
                clock,
                AuthorizationCodeParams {
                    zone_id,
                    client_id: &client.client_id,
                    user_id: user.id,
                    redirect_uri: request.redirect_uri,
                    scope,
                    pkce,
                    expires_in: self.site_config.authorization_code_ttl,
                },
            )
            .await?;

        repo.save().await?;

        info!(scope = %code.scope, "Issued authorization code");
        Ok(Authorized {
            redirect_uri,
            response: AuthorizationResponse {
                code: code.code,
                state: request.state,
            },
        })
    }

    /// Check an authorization request with the `token` response type, and
    /// mint an access token right away. No refresh token is ever handed out
    /// this way.
    ///
    /// # Errors
    ///
    /// Same as [`Core::authorize`]
    #[tracing::instrument(
        name = "core.authorize.implicit",
        skip_all,
        fields(zone.id = %zone_id, client.id = %request.client_id, user.id = %user_id),
        err,
    )]
    pub async fn authorize_implicit(
        &self,
        mut repo: BoxRepository,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        zone_id: Ulid,
        user_id: Ulid,
        request: AuthorizationRequest,
    ) -> Result<Authorized<ImplicitResponse>, Error> {
        if request.response_type != ResponseType::Token {
            return Err(Error::InvalidRequest("unsupported response_type"));
        }

        let _zone = self.locks.read(LockKey::Zone(zone_id)).await;
        let _client = self
            .locks
            .read(LockKey::client(zone_id, &request.client_id))
            .await;
        let _user = self.locks.read(LockKey::User(zone_id, user_id)).await;

        let (client, user) = self
            .resolve_authorization(
                &mut repo,
                zone_id,
                user_id,
                &request,
                GrantType::Implicit,
            )
            .await?;
        let redirect_uri = client
            .resolve_redirect_uri(request.redirect_uri.as_ref())?
            .clone();
        let scope = grant_scope(
            request.scope.as_ref(),
            &client.scope,
            Some(&user.authorities),
        )?;

        let grant = Grant {
            client: &client,
            subject: Subject::User(user.id),
            scope,
            grant_type: GrantType::Implicit,
        };
        let token = self.mint(&mut repo, rng, clock, &grant).await?;

        repo.save().await?;

        Ok(Authorized {
            redirect_uri,
            response: ImplicitResponse {
                token,
                state: request.state,
            },
        })
    }

    async fn resolve_authorization(
        &self,
        repo: &mut BoxRepository,
        zone_id: Ulid,
        user_id: Ulid,
        request: &AuthorizationRequest,
        grant_type: GrantType,
    ) -> Result<(Client, User), Error> {
        let client = repo
            .clients()
            .lookup(zone_id, &request.client_id)
            .await?
            .filter(|client| client.allows_grant(grant_type))
            .ok_or(Error::InvalidClient)?;

        let user = repo
            .users()
            .lookup(zone_id, user_id)
            .await?
            .ok_or(Error::UserNotFound)?;

        Ok((client, user))
    }
}
