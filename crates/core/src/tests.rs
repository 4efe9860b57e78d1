// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Service-level scenarios, on top of the in-memory store

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use assert_matches::assert_matches;
use chrono::Duration;
use oauth2_types::{
    pkce::{CodeChallengeMethodExt, PkceCodeChallengeMethod},
    requests::{
        AccessTokenRequest, AccessTokenResponse, AuthorizationCodeGrant, AuthorizationRequest,
        ClientCredentialsGrant, GrantType, PasswordGrant, RefreshTokenGrant, ResponseType,
    },
    scope::Scope,
};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use uaa_data_model::{
    Client, ClientPatch, ClientRegistration, Credential, IdentityZone, MockClock, Subject,
    TokenKind, User, UserRecord, ValidationError, ZoneDefinition,
};
use uaa_jose::{
    Keyset,
    jwa::{JsonWebSignatureAlg, SymmetricKey},
};
use uaa_storage::{BoxRepository, Pagination, RepositoryAccess};
use uaa_storage_memory::MemoryStore;
use ulid::Ulid;
use url::Url;

use crate::{
    ClientCredentials, Core, Error, NewUser, PasswordManager, SiteConfig, ZoneDeletionPolicy,
};

const PASSWORD: &str = "koala";
const CLIENT_SECRET: &str = "app-secret";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

pub(crate) fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

struct TestState {
    store: MemoryStore,
    clock: Arc<MockClock>,
    rng: Arc<Mutex<ChaChaRng>>,
    core: Core,
}

impl TestState {
    fn new() -> Self {
        Self::with_site_config(|_| {})
    }

    fn with_site_config(tweak: impl FnOnce(&mut SiteConfig)) -> Self {
        setup();

        let mut site_config = SiteConfig {
            default_authorities: "ROLE_USER read write openid".parse().unwrap(),
            ..SiteConfig::default()
        };
        tweak(&mut site_config);

        let key = SymmetricKey::new(JsonWebSignatureAlg::Hs256, vec![0x42; 32]).unwrap();
        let keyset = Keyset::new(vec![("test".to_owned(), key)]).unwrap();
        let passwords = PasswordManager::new(8, 1, 1).unwrap();

        Self {
            store: MemoryStore::default(),
            clock: Arc::new(MockClock::default()),
            rng: Arc::new(Mutex::new(ChaChaRng::seed_from_u64(42))),
            core: Core::new(site_config, keyset, passwords),
        }
    }

    fn repo(&self) -> BoxRepository {
        self.store.repository().boxed()
    }

    fn rng(&self) -> ChaChaRng {
        let mut parent = self.rng.lock().unwrap();
        ChaChaRng::from_rng(&mut *parent).unwrap()
    }

    async fn zone(&self, subdomain: &str) -> IdentityZone {
        self.core
            .create_zone(
                self.repo(),
                &mut self.rng(),
                &*self.clock,
                ZoneDefinition {
                    subdomain: subdomain.to_owned(),
                    name: format!("Zone {subdomain}"),
                },
            )
            .await
            .unwrap()
    }

    async fn user(&self, zone_id: Ulid, username: &str) -> User {
        self.core
            .create_user(
                self.repo(),
                &mut self.rng(),
                &*self.clock,
                zone_id,
                NewUser {
                    username: username.to_owned(),
                    password: PASSWORD.to_owned(),
                    email: format!("{username}@example.com"),
                    given_name: "Marissa".to_owned(),
                    family_name: "Bloggs".to_owned(),
                },
            )
            .await
            .unwrap()
    }

    async fn register(&self, zone_id: Ulid, registration: ClientRegistration) -> Client {
        self.core
            .register_client(
                self.repo(),
                &mut self.rng(),
                &*self.clock,
                zone_id,
                registration,
            )
            .await
            .unwrap()
    }

    /// A confidential client allowed every grant but the implicit one
    async fn confidential_client(&self, zone_id: Ulid) -> Client {
        self.register(zone_id, registration("app", Some(CLIENT_SECRET)))
            .await
    }

    /// A public client, for the authorization code grant with PKCE
    async fn public_client(&self, zone_id: Ulid) -> Client {
        let mut registration = registration("spa", None);
        registration.grant_types = vec![GrantType::AuthorizationCode, GrantType::RefreshToken];
        self.register(zone_id, registration).await
    }

    async fn issue(
        &self,
        zone_id: Ulid,
        credentials: ClientCredentials,
        request: AccessTokenRequest,
    ) -> Result<AccessTokenResponse, Error> {
        self.core
            .issue_token(
                self.repo(),
                &mut self.rng(),
                &*self.clock,
                zone_id,
                credentials,
                request,
            )
            .await
    }

    async fn login(
        &self,
        zone_id: Ulid,
        scope: Option<&str>,
    ) -> Result<AccessTokenResponse, Error> {
        self.issue(
            zone_id,
            app_credentials(),
            AccessTokenRequest::Password(PasswordGrant {
                username: "marissa".to_owned(),
                password: PASSWORD.to_owned(),
                scope: scope.map(|s| s.parse().unwrap()),
            }),
        )
        .await
    }

    async fn validate(&self, token: &str) -> Result<crate::Principal, Error> {
        self.core.validate(self.repo(), &*self.clock, token).await
    }

    async fn code(&self, zone_id: Ulid, user_id: Ulid, client_id: &str) -> String {
        let authorized = self
            .core
            .authorize(
                self.repo(),
                &mut self.rng(),
                &*self.clock,
                zone_id,
                user_id,
                AuthorizationRequest {
                    response_type: ResponseType::Code,
                    client_id: client_id.to_owned(),
                    redirect_uri: Some(redirect_uri()),
                    scope: Some("read".parse().unwrap()),
                    state: Some("xyz".to_owned()),
                    code_challenge: Some(
                        PkceCodeChallengeMethod::S256
                            .compute_challenge(VERIFIER)
                            .unwrap()
                            .into_owned(),
                    ),
                    code_challenge_method: Some(PkceCodeChallengeMethod::S256),
                },
            )
            .await
            .unwrap();

        assert_eq!(authorized.redirect_uri, redirect_uri());
        assert_eq!(authorized.response.state.as_deref(), Some("xyz"));
        authorized.response.code
    }
}

fn redirect_uri() -> Url {
    "https://app.example.com/callback".parse().unwrap()
}

fn registration(client_id: &str, secret: Option<&str>) -> ClientRegistration {
    ClientRegistration {
        client_id: client_id.to_owned(),
        client_secret: secret.map(ToOwned::to_owned),
        name: None,
        grant_types: vec![
            GrantType::AuthorizationCode,
            GrantType::Password,
            GrantType::ClientCredentials,
            GrantType::RefreshToken,
        ],
        scope: "read write".parse().unwrap(),
        redirect_uris: vec![redirect_uri()],
        access_token_validity: None,
        refresh_token_validity: None,
    }
}

fn app_credentials() -> ClientCredentials {
    ClientCredentials::ClientSecret {
        client_id: "app".to_owned(),
        client_secret: CLIENT_SECRET.to_owned(),
    }
}

fn code_grant(code: String, verifier: Option<&str>) -> AccessTokenRequest {
    AccessTokenRequest::AuthorizationCode(AuthorizationCodeGrant {
        code,
        redirect_uri: Some(redirect_uri()),
        code_verifier: verifier.map(ToOwned::to_owned),
    })
}

fn refresh_grant(refresh_token: &str) -> AccessTokenRequest {
    AccessTokenRequest::RefreshToken(RefreshTokenGrant {
        refresh_token: refresh_token.to_owned(),
        scope: None,
    })
}

#[tokio::test]
async fn empty_fields_leave_no_partial_user() {
    let state = TestState::new();
    let zone = state.zone("z1").await;

    for (field, new_user) in [
        ("username", NewUser {
            username: " ".to_owned(),
            ..sign_up()
        }),
        ("email", NewUser {
            email: String::new(),
            ..sign_up()
        }),
        ("given_name", NewUser {
            given_name: String::new(),
            ..sign_up()
        }),
        ("family_name", NewUser {
            family_name: String::new(),
            ..sign_up()
        }),
        ("password", NewUser {
            password: String::new(),
            ..sign_up()
        }),
    ] {
        let res = state
            .core
            .create_user(state.repo(), &mut state.rng(), &*state.clock, zone.id, new_user)
            .await;
        assert_matches!(
            res,
            Err(Error::Validation(ValidationError { field: f, .. })) if f == field
        );
    }

    let page = state
        .core
        .list_users(state.repo(), zone.id, Pagination::first(10))
        .await
        .unwrap();
    assert!(page.edges.is_empty());
}

fn sign_up() -> NewUser {
    NewUser {
        username: "marissa".to_owned(),
        password: PASSWORD.to_owned(),
        email: "marissa@example.com".to_owned(),
        given_name: "Marissa".to_owned(),
        family_name: "Bloggs".to_owned(),
    }
}

#[tokio::test]
async fn users_are_persisted_once() {
    let state = TestState::new();
    let zone = state.zone("z1").await;

    let pending = state
        .core
        .pending_user(
            "marissa".to_owned(),
            Credential::secret("$argon2id$opaque"),
            "marissa@example.com".to_owned(),
            "Marissa".to_owned(),
            "Bloggs".to_owned(),
        )
        .unwrap();
    assert!(pending.authorities.contains("ROLE_USER"));

    let user = state
        .core
        .save_user(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            UserRecord::from(pending.clone()),
        )
        .await
        .unwrap();

    let res = state
        .core
        .save_user(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            UserRecord::from(user.clone()),
        )
        .await;
    assert_matches!(res, Err(Error::AlreadyPersisted(e)) if e.id == user.id);

    // Same username, same zone
    let res = state
        .core
        .save_user(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            UserRecord::from(pending),
        )
        .await;
    assert_matches!(res, Err(Error::UserConflict));

    let found = state
        .core
        .find_user(state.repo(), zone.id, "MARISSA")
        .await
        .unwrap();
    assert_eq!(found, user);
}

#[tokio::test]
async fn unregistered_clients() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;

    let res = state.core.get_client(state.repo(), zone.id, "app").await;
    assert_matches!(res, Err(Error::ClientMetadataNotFound));

    let res = state.login(zone.id, None).await;
    assert_matches!(res, Err(Error::InvalidClient));

    // Registered in another zone only
    let other = state.zone("z2").await;
    state.confidential_client(other.id).await;
    let res = state.login(zone.id, None).await;
    assert_matches!(res, Err(Error::InvalidClient));
}

#[tokio::test]
async fn issue_then_validate() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, Some("read")).await.unwrap();
    assert_eq!(reply.scope, Some("read".parse().unwrap()));
    assert!(reply.refresh_token.is_some());

    let principal = state.validate(&reply.access_token).await.unwrap();
    assert_eq!(principal.subject, Subject::User(user.id));
    assert_eq!(principal.client_id, "app");
    assert_eq!(principal.zone_id, zone.id);
    assert_eq!(principal.scope, "read".parse::<Scope>().unwrap());
    assert_eq!(principal.grant_type, GrantType::Password);

    // Refresh tokens are no good on resource requests
    let res = state.validate(reply.refresh_token.as_deref().unwrap()).await;
    assert_matches!(res, Err(Error::TokenMalformed));

    let res = state.validate("not.a.token").await;
    assert_matches!(res, Err(Error::TokenMalformed));
}

#[tokio::test]
async fn token_response_shape() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, None).await.unwrap();
    insta::assert_json_snapshot!(reply, {
        ".access_token" => "[access token]",
        ".refresh_token" => "[refresh token]",
    }, @r###"
    {
      "access_token": "[access token]",
      "token_type": "bearer",
      "expires_in": 43200,
      "refresh_token": "[refresh token]",
      "scope": "read write"
    }
    "###);
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    for (username, password) in [("marissa", "wrong"), ("nobody", PASSWORD)] {
        let res = state
            .issue(
                zone.id,
                app_credentials(),
                AccessTokenRequest::Password(PasswordGrant {
                    username: username.to_owned(),
                    password: password.to_owned(),
                    scope: None,
                }),
            )
            .await;
        assert_matches!(res, Err(Error::InvalidGrant));
    }

    let res = state
        .issue(
            zone.id,
            ClientCredentials::ClientSecret {
                client_id: "app".to_owned(),
                client_secret: "nope".to_owned(),
            },
            AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None }),
        )
        .await;
    assert_matches!(res, Err(Error::InvalidClientCredentials));

    let res = state
        .issue(
            zone.id,
            ClientCredentials::None {
                client_id: "app".to_owned(),
            },
            AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None }),
        )
        .await;
    assert_matches!(res, Err(Error::InvalidClientCredentials));
}

#[tokio::test]
async fn client_credentials_grant() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.confidential_client(zone.id).await;

    let reply = state
        .issue(
            zone.id,
            app_credentials(),
            AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None }),
        )
        .await
        .unwrap();

    let principal = state.validate(&reply.access_token).await.unwrap();
    assert_eq!(principal.subject, Subject::Client("app".to_owned()));
    assert_eq!(principal.scope, "read write".parse::<Scope>().unwrap());
}

#[tokio::test]
async fn scenario_a_scope_outside_the_client() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let res = state.login(zone.id, Some("read admin")).await;
    assert_matches!(res, Err(Error::InvalidScope));
}

#[tokio::test]
async fn scenario_b_expiry_wins_over_revocation() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    let mut registration = registration("app", Some(CLIENT_SECRET));
    registration.access_token_validity = Some(Duration::seconds(3600));
    state.register(zone.id, registration).await;

    let reply = state.login(zone.id, None).await.unwrap();
    assert_eq!(reply.expires_in, Some(Duration::seconds(3600)));

    state.clock.advance(Duration::seconds(3600));
    state.validate(&reply.access_token).await.unwrap();

    state.clock.advance(Duration::seconds(1));
    let res = state.validate(&reply.access_token).await;
    assert_matches!(res, Err(Error::TokenExpired));

    // Even when revoked, an expired token reports the expiry
    state
        .core
        .revoke_all_for_user(state.repo(), &*state.clock, zone.id, user.id)
        .await
        .unwrap();
    let res = state.validate(&reply.access_token).await;
    assert_matches!(res, Err(Error::TokenExpired));
}

#[tokio::test]
async fn scenario_c_user_revocation_is_zone_scoped() {
    let state = TestState::new();
    let z1 = state.zone("z1").await;
    let z2 = state.zone("z2").await;
    let u1 = state.user(z1.id, "marissa").await;
    state.user(z2.id, "marissa").await;
    state.confidential_client(z1.id).await;
    state.confidential_client(z2.id).await;

    let in_z1 = state.login(z1.id, None).await.unwrap();
    let in_z2 = state.login(z2.id, None).await.unwrap();

    state
        .core
        .revoke_all_for_user(state.repo(), &*state.clock, z1.id, u1.id)
        .await
        .unwrap();

    let res = state.validate(&in_z1.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));
    state.validate(&in_z2.access_token).await.unwrap();

    // Logging in again gives a token which is not revoked
    let again = state.login(z1.id, None).await.unwrap();
    state.validate(&again.access_token).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_d_concurrent_code_redemption() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let code = state.code(zone.id, user.id, "app").await;

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let core = state.core.clone();
            let repo = state.repo();
            let mut rng = state.rng();
            let clock = Arc::clone(&state.clock);
            let request = code_grant(code.clone(), Some(VERIFIER));
            tokio::spawn(async move {
                core.issue_token(repo, &mut rng, &*clock, zone.id, app_credentials(), request)
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(results.iter().filter(|res| res.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|res| matches!(res, Err(Error::InvalidGrant)))
            .count(),
        1
    );
}

#[tokio::test]
async fn codes_are_single_use_and_expire() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let code = state.code(zone.id, user.id, "app").await;
    let reply = state
        .issue(zone.id, app_credentials(), code_grant(code.clone(), Some(VERIFIER)))
        .await
        .unwrap();
    assert_eq!(reply.scope, Some("read".parse().unwrap()));
    let principal = state.validate(&reply.access_token).await.unwrap();
    assert_eq!(principal.grant_type, GrantType::AuthorizationCode);

    let res = state
        .issue(zone.id, app_credentials(), code_grant(code, Some(VERIFIER)))
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));

    let code = state.code(zone.id, user.id, "app").await;
    state.clock.advance(Duration::minutes(6));
    let res = state
        .issue(zone.id, app_credentials(), code_grant(code, Some(VERIFIER)))
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));
}

#[tokio::test]
async fn public_clients_need_pkce() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.public_client(zone.id).await;
    let spa = || ClientCredentials::None {
        client_id: "spa".to_owned(),
    };

    // A wrong verifier burns the code
    let code = state.code(zone.id, user.id, "spa").await;
    let wrong_verifier = VERIFIER.replace('d', "e");
    let res = state
        .issue(zone.id, spa(), code_grant(code.clone(), Some(&wrong_verifier)))
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));
    let res = state
        .issue(zone.id, spa(), code_grant(code, Some(VERIFIER)))
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));

    let code = state.code(zone.id, user.id, "spa").await;
    let res = state.issue(zone.id, spa(), code_grant(code, None)).await;
    assert_matches!(res, Err(Error::InvalidGrant));

    let code = state.code(zone.id, user.id, "spa").await;
    let reply = state
        .issue(zone.id, spa(), code_grant(code, Some(VERIFIER)))
        .await
        .unwrap();
    state.validate(&reply.access_token).await.unwrap();

    // No challenge at all is refused upfront
    let res = state
        .core
        .authorize(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            user.id,
            AuthorizationRequest {
                response_type: ResponseType::Code,
                client_id: "spa".to_owned(),
                redirect_uri: None,
                scope: None,
                state: None,
                code_challenge: None,
                code_challenge_method: None,
            },
        )
        .await;
    assert_matches!(res, Err(Error::InvalidRequest(_)));
}

#[tokio::test]
async fn implicit_grant() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    let mut registration = registration("legacy", Some(CLIENT_SECRET));
    registration.grant_types = vec![GrantType::Implicit, GrantType::RefreshToken];
    state.register(zone.id, registration).await;

    let request = AuthorizationRequest {
        response_type: ResponseType::Token,
        client_id: "legacy".to_owned(),
        redirect_uri: None,
        scope: Some("write".parse().unwrap()),
        state: Some("abc".to_owned()),
        code_challenge: None,
        code_challenge_method: None,
    };

    let authorized = state
        .core
        .authorize_implicit(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            user.id,
            request.clone(),
        )
        .await
        .unwrap();
    assert_eq!(authorized.redirect_uri, redirect_uri());
    assert_eq!(authorized.response.state.as_deref(), Some("abc"));
    assert!(authorized.response.token.refresh_token.is_none());
    let principal = state
        .validate(&authorized.response.token.access_token)
        .await
        .unwrap();
    assert_eq!(principal.grant_type, GrantType::Implicit);

    // The code flow is not allowed for this client
    let res = state
        .core
        .authorize(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            user.id,
            AuthorizationRequest {
                response_type: ResponseType::Code,
                ..request
            },
        )
        .await;
    assert_matches!(res, Err(Error::InvalidClient));
}

#[tokio::test]
async fn revoking_twice_is_revoking_once() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, None).await.unwrap();
    let token_id = state.validate(&reply.access_token).await.unwrap().token_id;

    for _ in 0..2 {
        state
            .core
            .revoke_token_by_id(state.repo(), &*state.clock, token_id)
            .await
            .unwrap();
        let res = state.validate(&reply.access_token).await;
        assert_matches!(res, Err(Error::TokenRevoked));
    }

    // The refresh token of the pair is still good
    state
        .issue(
            zone.id,
            app_credentials(),
            refresh_grant(reply.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap();

    let mut repo = state.repo();
    let current = repo.revocations().current_sequence().await.unwrap();
    assert_eq!(current, 4);
}

#[tokio::test]
async fn revoking_a_refresh_token_takes_the_pair_down() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, None).await.unwrap();
    let refresh_token = reply.refresh_token.unwrap();

    for _ in 0..2 {
        state
            .core
            .revoke_token(state.repo(), &*state.clock, zone.id, &refresh_token)
            .await
            .unwrap();
    }

    let res = state.validate(&reply.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));
    let res = state
        .issue(zone.id, app_credentials(), refresh_grant(&refresh_token))
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));

    let other = state.zone("z2").await;
    let res = state
        .core
        .revoke_token(state.repo(), &*state.clock, other.id, &refresh_token)
        .await;
    assert_matches!(res, Err(Error::TokenMalformed));
}

#[tokio::test]
async fn refresh_tokens_rotate() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let first = state.login(zone.id, None).await.unwrap();
    let first_refresh = first.refresh_token.unwrap();

    let second = state
        .issue(zone.id, app_credentials(), refresh_grant(&first_refresh))
        .await
        .unwrap();
    let second_refresh = second.refresh_token.unwrap();
    assert_ne!(first_refresh, second_refresh);
    state.validate(&second.access_token).await.unwrap();

    // Replaying the first one fails
    let res = state
        .issue(zone.id, app_credentials(), refresh_grant(&first_refresh))
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));

    // Narrowing the scope is fine, widening it is not
    let narrowed = state
        .issue(
            zone.id,
            app_credentials(),
            AccessTokenRequest::RefreshToken(RefreshTokenGrant {
                refresh_token: second_refresh,
                scope: Some("read".parse().unwrap()),
            }),
        )
        .await
        .unwrap();
    assert_eq!(narrowed.scope, Some("read".parse().unwrap()));

    let res = state
        .issue(
            zone.id,
            app_credentials(),
            AccessTokenRequest::RefreshToken(RefreshTokenGrant {
                refresh_token: narrowed.refresh_token.unwrap(),
                scope: Some("read write".parse().unwrap()),
            }),
        )
        .await;
    assert_matches!(res, Err(Error::InvalidScope));
}

#[tokio::test]
async fn refresh_tokens_without_rotation() {
    let state = TestState::with_site_config(|config| config.refresh_token_rotation = false);
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let first = state.login(zone.id, None).await.unwrap();
    let refresh_token = first.refresh_token.unwrap();

    for _ in 0..2 {
        let reply = state
            .issue(zone.id, app_credentials(), refresh_grant(&refresh_token))
            .await
            .unwrap();
        assert_eq!(reply.refresh_token.as_deref(), Some(refresh_token.as_str()));
        state.validate(&reply.access_token).await.unwrap();
    }

    // Another client can't use it
    let mut registration = registration("other", Some(CLIENT_SECRET));
    registration.scope = "read write".parse().unwrap();
    state.register(zone.id, registration).await;
    let res = state
        .issue(
            zone.id,
            ClientCredentials::ClientSecret {
                client_id: "other".to_owned(),
                client_secret: CLIENT_SECRET.to_owned(),
            },
            refresh_grant(&refresh_token),
        )
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));
}

#[tokio::test]
async fn password_change_keeps_the_reissued_token() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let before = state.login(zone.id, None).await.unwrap();

    let res = state
        .core
        .change_password(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            user.id,
            Some("wrong".to_owned()),
            "new-password".to_owned(),
            None,
        )
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));

    let reissued = state
        .core
        .change_password(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            user.id,
            Some(PASSWORD.to_owned()),
            "new-password".to_owned(),
            Some("app"),
        )
        .await
        .unwrap()
        .unwrap();

    let res = state.validate(&before.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));
    let res = state
        .issue(
            zone.id,
            app_credentials(),
            refresh_grant(before.refresh_token.as_deref().unwrap()),
        )
        .await;
    assert_matches!(res, Err(Error::InvalidGrant));

    let principal = state.validate(&reissued.access_token).await.unwrap();
    assert_eq!(principal.subject, Subject::User(user.id));

    // The old password is gone
    let res = state.login(zone.id, None).await;
    assert_matches!(res, Err(Error::InvalidGrant));
}

#[tokio::test]
async fn deleting_a_user_revokes_its_tokens() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, None).await.unwrap();
    state
        .core
        .delete_user(state.repo(), &*state.clock, zone.id, user.id)
        .await
        .unwrap();

    let res = state.validate(&reply.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));
    let res = state.core.get_user(state.repo(), zone.id, user.id).await;
    assert_matches!(res, Err(Error::UserNotFound));
}

#[tokio::test]
async fn client_deletion_and_rotation_revoke_tokens() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let before = state.login(zone.id, None).await.unwrap();
    state
        .core
        .rotate_client_secret(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            "app",
            Some("rotated".to_owned()),
        )
        .await
        .unwrap();

    let res = state.validate(&before.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));
    let res = state.login(zone.id, None).await;
    assert_matches!(res, Err(Error::InvalidClientCredentials));

    let rotated = ClientCredentials::ClientSecret {
        client_id: "app".to_owned(),
        client_secret: "rotated".to_owned(),
    };
    let after = state
        .issue(
            zone.id,
            rotated,
            AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None }),
        )
        .await
        .unwrap();
    state.validate(&after.access_token).await.unwrap();

    state
        .core
        .delete_client(state.repo(), &*state.clock, zone.id, "app")
        .await
        .unwrap();
    let res = state.validate(&after.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));

    let res = state
        .core
        .delete_client(state.repo(), &*state.clock, zone.id, "app")
        .await;
    assert_matches!(res, Err(Error::ClientMetadataNotFound));
}

#[tokio::test]
async fn zone_deletion_cascades() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let other = state.zone("z2").await;
    let user = state.user(zone.id, "marissa").await;
    state.user(other.id, "marissa").await;
    state.confidential_client(zone.id).await;
    state.confidential_client(other.id).await;

    let doomed = state.login(zone.id, None).await.unwrap();
    let kept = state.login(other.id, None).await.unwrap();

    state
        .core
        .delete_zone(state.repo(), &*state.clock, zone.id)
        .await
        .unwrap();

    let res = state.validate(&doomed.access_token).await;
    assert_matches!(res, Err(Error::TokenRevoked));
    state.validate(&kept.access_token).await.unwrap();

    let res = state.core.get_zone(state.repo(), zone.id).await;
    assert_matches!(res, Err(Error::ZoneNotFound));
    let mut repo = state.repo();
    assert!(repo.users().lookup(zone.id, user.id).await.unwrap().is_none());
    assert!(repo.clients().lookup(zone.id, "app").await.unwrap().is_none());

    // The subdomain is free again
    state.zone("z1").await;
}

#[tokio::test]
async fn zone_deletion_can_be_disabled() {
    let state =
        TestState::with_site_config(|config| config.zone_deletion = ZoneDeletionPolicy::Disabled);
    let zone = state.zone("z1").await;

    let res = state
        .core
        .delete_zone(state.repo(), &*state.clock, zone.id)
        .await;
    assert_matches!(res, Err(Error::ZoneDeletionDisabled));
    state.core.get_zone(state.repo(), zone.id).await.unwrap();
}

#[tokio::test]
async fn zone_subdomains_are_unique() {
    let state = TestState::new();
    state.zone("z1").await;

    let res = state
        .core
        .create_zone(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            ZoneDefinition {
                subdomain: "Z1".to_owned(),
                name: "Again".to_owned(),
            },
        )
        .await;
    assert_matches!(res, Err(Error::ZoneConflict));

    let zone = state.core.find_zone(state.repo(), " z1 ").await.unwrap();
    assert_eq!(zone.subdomain, "z1");
}

#[tokio::test]
async fn introspection() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, None).await.unwrap();

    let active = state
        .core
        .introspect(state.repo(), &*state.clock, &reply.access_token)
        .await
        .unwrap();
    assert!(active.active);
    assert_eq!(active.sub, Some(user.id.to_string()));
    assert_eq!(active.client_id.as_deref(), Some("app"));
    assert_eq!(active.zid, Some(zone.id.to_string()));

    for token in [reply.refresh_token.as_deref().unwrap(), "garbage"] {
        let inactive = state
            .core
            .introspect(state.repo(), &*state.clock, token)
            .await
            .unwrap();
        assert_eq!(inactive, oauth2_types::requests::IntrospectionResponse::inactive());
    }
}

#[tokio::test]
async fn external_users_are_provisioned_once() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    state.user(zone.id, "marissa").await;

    let identity = |username: &str, given_name: &str| uaa_data_model::ExternalIdentity {
        origin: "ldap".to_owned(),
        external_id: "uid=jdoe".to_owned(),
        username: username.to_owned(),
        email: Some("jdoe@example.com".to_owned()),
        given_name: given_name.to_owned(),
        family_name: "Doe".to_owned(),
    };

    let first = state
        .core
        .provision_external_user(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            identity("jdoe", "John"),
        )
        .await
        .unwrap();
    assert_eq!(first.origin, "ldap");

    let second = state
        .core
        .provision_external_user(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            identity("jdoe", "Johnny"),
        )
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.given_name, "Johnny");

    // The name of a local user can't be taken over
    let res = state
        .core
        .provision_external_user(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            identity("marissa", "Marissa"),
        )
        .await;
    assert_matches!(res, Err(Error::UserConflict));

    // Delegated users have no password here
    let res = state
        .core
        .change_password(
            state.repo(),
            &mut state.rng(),
            &*state.clock,
            zone.id,
            first.id,
            None,
            "password".to_owned(),
            None,
        )
        .await;
    assert_matches!(res, Err(Error::InvalidRequest(_)));
}

#[tokio::test]
async fn grants_are_narrowed_to_the_user_authorities() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    state
        .core
        .set_user_authorities(
            state.repo(),
            &*state.clock,
            zone.id,
            user.id,
            "ROLE_USER read".parse().unwrap(),
        )
        .await
        .unwrap();

    let reply = state.login(zone.id, None).await.unwrap();
    assert_eq!(reply.scope, Some("read".parse().unwrap()));

    let res = state.login(zone.id, Some("write")).await;
    assert_matches!(res, Err(Error::InvalidScope));

    // Client credentials tokens only depend on the client
    let reply = state
        .issue(
            zone.id,
            app_credentials(),
            AccessTokenRequest::ClientCredentials(ClientCredentialsGrant {
                scope: Some("write".parse().unwrap()),
            }),
        )
        .await
        .unwrap();
    assert_eq!(reply.scope, Some("write".parse().unwrap()));
}

#[tokio::test]
async fn refresh_follows_the_current_client_scope() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    let reply = state.login(zone.id, Some("read write")).await.unwrap();

    state
        .core
        .update_client(
            state.repo(),
            &*state.clock,
            zone.id,
            "app",
            ClientPatch {
                scope: Some("read".parse().unwrap()),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap();

    let refreshed = state
        .issue(
            zone.id,
            app_credentials(),
            refresh_grant(reply.refresh_token.as_deref().unwrap()),
        )
        .await
        .unwrap();
    let read: Scope = "read".parse().unwrap();
    assert_eq!(refreshed.scope.as_ref(), Some(&read));
    let principal = state.validate(&refreshed.access_token).await.unwrap();
    assert_eq!(principal.scope, read);

    // Losing the authority leaves nothing to refresh
    state
        .core
        .set_user_authorities(
            state.repo(),
            &*state.clock,
            zone.id,
            user.id,
            "ROLE_USER write".parse().unwrap(),
        )
        .await
        .unwrap();

    let res = state
        .issue(
            zone.id,
            app_credentials(),
            refresh_grant(refreshed.refresh_token.as_deref().unwrap()),
        )
        .await;
    assert_matches!(res, Err(Error::InvalidScope));
}

#[tokio::test]
async fn code_redemption_follows_the_current_client_scope() {
    let state = TestState::new();
    let zone = state.zone("z1").await;
    let user = state.user(zone.id, "marissa").await;
    state.confidential_client(zone.id).await;

    // Issued for "read"
    let code = state.code(zone.id, user.id, "app").await;

    state
        .core
        .update_client(
            state.repo(),
            &*state.clock,
            zone.id,
            "app",
            ClientPatch {
                scope: Some("write".parse().unwrap()),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap();

    let res = state
        .issue(zone.id, app_credentials(), code_grant(code, Some(VERIFIER)))
        .await;
    assert_matches!(res, Err(Error::InvalidScope));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn issuance_racing_client_deletion_is_revoked() {
    let state = TestState::new();
    let zone_id = state.zone("z1").await.id;

    for round in 0..50 {
        let client_id = format!("app{round}");
        state
            .register(zone_id, registration(&client_id, Some(CLIENT_SECRET)))
            .await;

        let issue = tokio::spawn({
            let core = state.core.clone();
            let repo = state.repo();
            let mut rng = state.rng();
            let clock = Arc::clone(&state.clock);
            let credentials = ClientCredentials::ClientSecret {
                client_id: client_id.clone(),
                client_secret: CLIENT_SECRET.to_owned(),
            };
            async move {
                let request =
                    AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None });
                core.issue_token(repo, &mut rng, &*clock, zone_id, credentials, request)
                    .await
            }
        });

        let delete = tokio::spawn({
            let core = state.core.clone();
            let repo = state.repo();
            let clock = Arc::clone(&state.clock);
            async move { core.delete_client(repo, &*clock, zone_id, &client_id).await }
        });

        delete.await.unwrap().unwrap();
        match issue.await.unwrap() {
            Ok(reply) => {
                let res = state.validate(&reply.access_token).await;
                assert_matches!(res, Err(Error::TokenRevoked));
            }
            Err(e) => assert_matches!(e, Error::InvalidClient),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn login_racing_password_change_is_revoked() {
    let state = TestState::new();
    let zone_id = state.zone("z1").await.id;
    state.confidential_client(zone_id).await;

    for round in 0..25 {
        let username = format!("user{round}");
        let user = state.user(zone_id, &username).await;

        let login = tokio::spawn({
            let core = state.core.clone();
            let repo = state.repo();
            let mut rng = state.rng();
            let clock = Arc::clone(&state.clock);
            async move {
                let request = AccessTokenRequest::Password(PasswordGrant {
                    username,
                    password: PASSWORD.to_owned(),
                    scope: None,
                });
                core.issue_token(repo, &mut rng, &*clock, zone_id, app_credentials(), request)
                    .await
            }
        });

        let change = tokio::spawn({
            let core = state.core.clone();
            let repo = state.repo();
            let mut rng = state.rng();
            let clock = Arc::clone(&state.clock);
            async move {
                core.change_password(
                    repo,
                    &mut rng,
                    &*clock,
                    zone_id,
                    user.id,
                    None,
                    "new-password".to_owned(),
                    None,
                )
                .await
            }
        });

        assert!(change.await.unwrap().unwrap().is_none());
        match login.await.unwrap() {
            Ok(reply) => {
                let res = state.validate(&reply.access_token).await;
                assert_matches!(res, Err(Error::TokenRevoked));
            }
            Err(e) => assert_matches!(e, Error::InvalidGrant),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuance_ids_are_distinct() {
    let state = TestState::new();
    let zone_id = state.zone("z1").await.id;
    state.confidential_client(zone_id).await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let core = state.core.clone();
            let repo = state.repo();
            let mut rng = state.rng();
            let clock = Arc::clone(&state.clock);
            tokio::spawn(async move {
                let request =
                    AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None });
                core.issue_token(repo, &mut rng, &*clock, zone_id, app_credentials(), request)
                    .await
            })
        })
        .collect();

    let mut issuances = HashSet::new();
    let mut sequences = HashSet::new();
    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        let access = state
            .core
            .parse_token(&*state.clock, &reply.access_token, TokenKind::Access)
            .unwrap();
        let refresh = state
            .core
            .parse_token(
                &*state.clock,
                reply.refresh_token.as_deref().unwrap(),
                TokenKind::Refresh,
            )
            .unwrap();

        assert_eq!(access.iid, refresh.iid);
        assert!(issuances.insert(access.iid));
        assert!(sequences.insert(access.seq));
        assert!(sequences.insert(refresh.seq));
    }
    assert_eq!(issuances.len(), 16);
}
