// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Diagnostic utility which runs the main flows of the authorization core
//! against a throwaway in-memory store, with the keys and parameters of the
//! current configuration

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use figment::Figment;
use oauth2_types::requests::{
    AccessTokenRequest, AccessTokenResponse, ClientCredentialsGrant, GrantType, PasswordGrant,
};
use rand::{Rng, SeedableRng, distributions::Alphanumeric};
use tracing::{error, info, info_span};
use uaa_config::{ConfigurationSection, RootConfig};
use uaa_core::{ClientCredentials, Core, Error, NewUser};
use uaa_data_model::{ClientRegistration, Clock, Subject, SystemClock, ZoneDefinition};
use uaa_storage::BoxRepositoryFactory;

use crate::util::{core_from_config, repository_factory_from_config};

#[derive(Parser, Debug)]
pub(super) struct Options {}

fn random_secret(rng: &mut impl Rng) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let _span = info_span!("cli.doctor").entered();
        info!("💡 Running diagnostics against a throwaway in-memory store");

        let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;
        let core = core_from_config(&config).await?;
        let factory = repository_factory_from_config(&config.users);
        let clock = SystemClock::default();

        // XXX: we should disallow SeedableRng::from_entropy
        let mut rng = rand_chacha::ChaChaRng::from_entropy();

        let failures = diagnose(&core, &factory, &mut rng, &clock).await?;
        if failures == 0 {
            info!("✅ Everything looks good");
            Ok(ExitCode::SUCCESS)
        } else {
            error!("❌ {failures} check(s) failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Returns the number of failed checks. Errors are reserved for the checks
/// which can't go on.
async fn diagnose(
    core: &Core,
    factory: &BoxRepositoryFactory,
    rng: &mut rand_chacha::ChaChaRng,
    clock: &dyn Clock,
) -> anyhow::Result<usize> {
    let mut failures = 0;

    let zone = core
        .create_zone(
            factory.create().await?,
            rng,
            clock,
            ZoneDefinition {
                subdomain: "doctor".to_owned(),
                name: "Diagnostics".to_owned(),
            },
        )
        .await
        .context("could not create a zone")?;

    let password = random_secret(rng);
    let user = core
        .create_user(
            factory.create().await?,
            rng,
            clock,
            zone.id,
            NewUser {
                username: "doctor".to_owned(),
                password: password.clone(),
                email: "doctor@example.com".to_owned(),
                given_name: "Doctor".to_owned(),
                family_name: "Diagnostics".to_owned(),
            },
        )
        .await
        .context("could not create a user")?;
    info!("✅ Hashed a password with the configured parameters");

    let client_secret = random_secret(rng);
    let client = core
        .register_client(
            factory.create().await?,
            rng,
            clock,
            zone.id,
            ClientRegistration {
                client_id: "doctor".to_owned(),
                client_secret: Some(client_secret.clone()),
                name: None,
                grant_types: vec![
                    GrantType::Password,
                    GrantType::ClientCredentials,
                    GrantType::RefreshToken,
                ],
                scope: core.site_config().default_authorities.clone(),
                redirect_uris: Vec::new(),
                access_token_validity: None,
                refresh_token_validity: None,
            },
        )
        .await
        .context("could not register a client")?;

    let credentials = || ClientCredentials::ClientSecret {
        client_id: client.client_id.clone(),
        client_secret: client_secret.clone(),
    };

    let reply = core
        .issue_token(
            factory.create().await?,
            rng,
            clock,
            zone.id,
            credentials(),
            AccessTokenRequest::Password(PasswordGrant {
                username: "doctor".to_owned(),
                password,
                scope: None,
            }),
        )
        .await
        .context("could not log in with the password grant")?;
    info!("✅ Signed a token pair with the configured keys");

    match core
        .validate(factory.create().await?, clock, &reply.access_token)
        .await
    {
        Ok(principal) if principal.subject == Subject::User(user.id) => {
            info!("✅ Access token validates");
        }
        Ok(principal) => {
            error!(subject = %principal.subject, "❌ Access token validated for someone else");
            failures += 1;
        }
        Err(e) => {
            error!(error = &e as &dyn std::error::Error, "❌ Access token does not validate");
            failures += 1;
        }
    }

    let machine: AccessTokenResponse = core
        .issue_token(
            factory.create().await?,
            rng,
            clock,
            zone.id,
            credentials(),
            AccessTokenRequest::ClientCredentials(ClientCredentialsGrant { scope: None }),
        )
        .await
        .context("could not use the client credentials grant")?;

    core.revoke_all_for_user(factory.create().await?, clock, zone.id, user.id)
        .await?;

    match core
        .validate(factory.create().await?, clock, &reply.access_token)
        .await
    {
        Err(Error::TokenRevoked) => info!("✅ Revoked tokens are rejected"),
        Ok(_) => {
            error!("❌ Access token still validates after revoking the user tokens");
            failures += 1;
        }
        Err(e) => {
            error!(error = &e as &dyn std::error::Error, "❌ Unexpected validation error");
            failures += 1;
        }
    }

    if core
        .validate(factory.create().await?, clock, &machine.access_token)
        .await
        .is_err()
    {
        error!("❌ Revoking the user tokens took the client tokens down");
        failures += 1;
    }

    match core.delete_zone(factory.create().await?, clock, zone.id).await {
        Ok(()) => info!("✅ Zone deletion cascades"),
        Err(Error::ZoneDeletionDisabled) => info!("💡 Zone deletion is disabled"),
        Err(e) => return Err(e).context("could not delete the zone"),
    }

    Ok(failures)
}
