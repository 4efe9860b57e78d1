// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use anyhow::Context;
use oauth2_types::scope::{Scope, ScopeToken};
use uaa_config::{
    PasswordsConfig, RootConfig, TokensConfig, UsernameScope, UsersConfig, ZoneDeletionPolicy,
    ZonesConfig,
};
use uaa_core::{Core, PasswordManager, SiteConfig};
use uaa_storage::BoxRepositoryFactory;
use uaa_storage_memory::MemoryStore;

pub fn password_manager_from_config(
    config: &PasswordsConfig,
) -> Result<PasswordManager, anyhow::Error> {
    PasswordManager::new(config.memory_cost, config.time_cost, config.parallelism)
        .context("invalid password hashing parameters")
}

pub fn site_config_from_config(
    tokens_config: &TokensConfig,
    users_config: &UsersConfig,
    zones_config: &ZonesConfig,
) -> Result<SiteConfig, anyhow::Error> {
    let default_authorities = users_config
        .default_authorities
        .iter()
        .map(|authority| {
            authority
                .parse::<ScopeToken>()
                .with_context(|| format!("invalid default authority {authority:?}"))
        })
        .collect::<Result<Scope, _>>()?;

    let zone_deletion = match zones_config.deletion {
        ZoneDeletionPolicy::Cascade => uaa_core::ZoneDeletionPolicy::Cascade,
        ZoneDeletionPolicy::Disabled => uaa_core::ZoneDeletionPolicy::Disabled,
    };

    Ok(SiteConfig {
        access_token_ttl: tokens_config.access_token_ttl,
        refresh_token_ttl: tokens_config.refresh_token_ttl,
        authorization_code_ttl: tokens_config.authorization_code_ttl,
        refresh_token_rotation: tokens_config.refresh_token_rotation,
        default_authorities,
        zone_deletion,
    })
}

pub async fn core_from_config(config: &RootConfig) -> Result<Core, anyhow::Error> {
    let site_config = site_config_from_config(&config.tokens, &config.users, &config.zones)?;
    let passwords = password_manager_from_config(&config.passwords)?;
    let keyset = config
        .secrets
        .keyset()
        .await
        .context("could not load the signing keys")?;

    Ok(Core::new(site_config, keyset, passwords))
}

/// The only backend for now lives in memory, so everything is lost when the
/// process exits
pub fn repository_factory_from_config(config: &UsersConfig) -> BoxRepositoryFactory {
    let username_scope = match config.username_scope {
        UsernameScope::Zone => uaa_storage::user::UsernameScope::Zone,
        UsernameScope::Global => uaa_storage::user::UsernameScope::Global,
    };

    Box::new(MemoryStore::new(username_scope))
}
