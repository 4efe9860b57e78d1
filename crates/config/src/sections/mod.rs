// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod passwords;
mod secrets;
mod telemetry;
mod tokens;
mod users;
mod zones;

pub use self::{
    passwords::PasswordsConfig,
    secrets::{KeyConfig, SecretsConfig, SigningAlgorithm},
    telemetry::{LogConfig, LogFormat, TelemetryConfig},
    tokens::TokensConfig,
    users::{UsernameScope, UsersConfig},
    zones::{ZoneDeletionPolicy, ZonesConfig},
};
use crate::util::{BoxError, ConfigurationSection};

/// Application configuration root
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// Configuration related to the tokens issued by the service
    #[serde(default)]
    pub tokens: TokensConfig,

    /// Configuration related to user accounts
    #[serde(default)]
    pub users: UsersConfig,

    /// Configuration related to identity zones
    #[serde(default, skip_serializing_if = "ZonesConfig::is_default")]
    pub zones: ZonesConfig,

    /// Configuration related to user passwords and client secrets
    #[serde(default, skip_serializing_if = "PasswordsConfig::is_default")]
    pub passwords: PasswordsConfig,

    /// Application secrets
    pub secrets: SecretsConfig,

    /// Configuration related to sending monitoring data
    #[serde(default, skip_serializing_if = "TelemetryConfig::is_default")]
    pub telemetry: TelemetryConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        self.tokens.validate(figment)?;
        self.users.validate(figment)?;
        self.zones.validate(figment)?;
        self.passwords.validate(figment)?;
        self.secrets.validate(figment)?;
        self.telemetry.validate(figment)?;

        Ok(())
    }
}

impl RootConfig {
    /// Generate a new configuration with random secrets
    pub fn generate<R>(mut rng: R) -> Self
    where
        R: Rng + Send,
    {
        Self {
            tokens: TokensConfig::default(),
            users: UsersConfig::default(),
            zones: ZonesConfig::default(),
            passwords: PasswordsConfig::default(),
            secrets: SecretsConfig::generate(&mut rng),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Configuration used in tests
    #[must_use]
    pub fn test() -> Self {
        Self {
            tokens: TokensConfig::default(),
            users: UsersConfig::default(),
            zones: ZonesConfig::default(),
            passwords: PasswordsConfig::test(),
            secrets: SecretsConfig::test(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Serialized, Yaml},
    };
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn generated_config_round_trips_through_figment() {
        let rng = rand_chacha::ChaChaRng::seed_from_u64(42);
        let config = RootConfig::generate(rng);

        let figment = Figment::new().merge(Serialized::defaults(&config));
        let loaded = RootConfig::extract(&figment).unwrap();
        assert_eq!(loaded.tokens.access_token_ttl, config.tokens.access_token_ttl);
    }

    #[test]
    fn secrets_are_required() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    tokens:
                      access_token_ttl: 60
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            assert!(RootConfig::extract(&figment).is_err());

            Ok(())
        });
    }

    #[test]
    fn section_errors_bubble_up() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    tokens:
                      refresh_token_ttl: -5
                    secrets:
                      keys:
                        - kid: abc
                          key: 0000111122223333444455556666777788889999aaaabbbbccccddddeeeeffff
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let error = RootConfig::extract(&figment).unwrap_err();
            assert!(error.to_string().contains("refresh_token_ttl"));

            Ok(())
        });
    }
}
