// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_field},
};

fn default_authorities() -> Vec<String> {
    vec!["ROLE_USER".to_owned()]
}

/// Where usernames must be unique
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UsernameScope {
    /// Usernames are unique within a zone
    #[default]
    Zone,

    /// Usernames are unique across all the zones
    Global,
}

/// Configuration related to user accounts
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct UsersConfig {
    /// Authorities granted to new users. Defaults to `["ROLE_USER"]`.
    #[serde(default = "default_authorities")]
    pub default_authorities: Vec<String>,

    /// Where usernames must be unique
    #[serde(default)]
    pub username_scope: UsernameScope,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            default_authorities: default_authorities(),
            username_scope: UsernameScope::default(),
        }
    }
}

impl ConfigurationSection for UsersConfig {
    const PATH: Option<&'static str> = Some("users");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        // Authorities end up in the scope of tokens, so they follow the same
        // character rules
        let invalid = self.default_authorities.iter().find(|authority| {
            authority.is_empty()
                || !authority
                    .chars()
                    .all(|c| c == '!' || ('#'..='[').contains(&c) || (']'..='~').contains(&c))
        });

        if let Some(authority) = invalid {
            return Err(invalid_field(
                figment,
                &["users", "default_authorities"],
                format!("invalid authority {authority:?} in the config"),
            ));
        }

        Ok(())
    }
}
