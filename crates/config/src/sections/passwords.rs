// Copyright 2024 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_field},
};

fn default_memory_cost() -> u32 {
    19 * 1024
}

fn default_time_cost() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

/// Cost parameters of the argon2id hashes used for user passwords and
/// client secrets
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PasswordsConfig {
    /// Memory size, in KiB. Defaults to 19 MiB.
    #[serde(default = "default_memory_cost")]
    #[schemars(range(min = 8))]
    pub memory_cost: u32,

    /// Number of iterations. Defaults to 2.
    #[serde(default = "default_time_cost")]
    #[schemars(range(min = 1))]
    pub time_cost: u32,

    /// Degree of parallelism. Defaults to 1.
    #[serde(default = "default_parallelism")]
    #[schemars(range(min = 1))]
    pub parallelism: u32,
}

impl Default for PasswordsConfig {
    fn default() -> Self {
        Self {
            memory_cost: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordsConfig {
    /// Cheapest parameters argon2 accepts, for tests
    #[must_use]
    pub fn test() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }

    pub(crate) fn is_default(&self) -> bool {
        self.memory_cost == default_memory_cost()
            && self.time_cost == default_time_cost()
            && self.parallelism == default_parallelism()
    }
}

impl ConfigurationSection for PasswordsConfig {
    const PATH: Option<&'static str> = Some("passwords");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        for (field, value) in [("time_cost", self.time_cost), ("parallelism", self.parallelism)] {
            if value == 0 {
                return Err(invalid_field(
                    figment,
                    &["passwords", field],
                    format!("`{field}` must be at least 1"),
                ));
            }
        }

        if self.memory_cost < 8 * self.parallelism {
            return Err(invalid_field(
                figment,
                &["passwords", "memory_cost"],
                "`memory_cost` must be at least 8 times `parallelism`".to_owned(),
            ));
        }

        Ok(())
    }
}
