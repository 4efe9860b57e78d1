// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_field},
};

fn default_access_token_ttl() -> Duration {
    Duration::hours(12)
}

fn default_refresh_token_ttl() -> Duration {
    Duration::days(30)
}

fn default_authorization_code_ttl() -> Duration {
    Duration::minutes(5)
}

fn default_true() -> bool {
    true
}

/// Configuration related to the tokens issued by the service
#[serde_as]
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
pub struct TokensConfig {
    /// Time-to-live of access tokens in seconds, for clients which don't
    /// set their own. Defaults to 12 hours.
    #[schemars(with = "u64", range(min = 1))]
    #[serde(default = "default_access_token_ttl")]
    #[serde_as(as = "serde_with::DurationSeconds<i64>")]
    pub access_token_ttl: Duration,

    /// Time-to-live of refresh tokens in seconds, for clients which don't set
    /// their own. Defaults to 30 days.
    #[schemars(with = "u64", range(min = 1))]
    #[serde(default = "default_refresh_token_ttl")]
    #[serde_as(as = "serde_with::DurationSeconds<i64>")]
    pub refresh_token_ttl: Duration,

    /// Time-to-live of authorization codes in seconds. Defaults to 5 minutes.
    #[schemars(with = "u64", range(min = 1, max = 3600))]
    #[serde(default = "default_authorization_code_ttl")]
    #[serde_as(as = "serde_with::DurationSeconds<i64>")]
    pub authorization_code_ttl: Duration,

    /// Whether refresh tokens are single-use. When enabled, using a refresh
    /// token revokes it and hands out a new one.
    #[serde(default = "default_true")]
    pub refresh_token_rotation: bool,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            authorization_code_ttl: default_authorization_code_ttl(),
            refresh_token_rotation: true,
        }
    }
}

impl ConfigurationSection for TokensConfig {
    const PATH: Option<&'static str> = Some("tokens");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        let ttls = [
            ("access_token_ttl", self.access_token_ttl),
            ("refresh_token_ttl", self.refresh_token_ttl),
            ("authorization_code_ttl", self.authorization_code_ttl),
        ];

        for (field, ttl) in ttls {
            if ttl <= Duration::zero() {
                return Err(invalid_field(
                    figment,
                    &["tokens", field],
                    format!("`{field}` must be positive"),
                ));
            }
        }

        Ok(())
    }
}
