// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ConfigurationSection;

/// What happens when a zone is deleted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ZoneDeletionPolicy {
    /// Revoke every token of the zone, then remove its users and clients
    #[default]
    Cascade,

    /// Refuse to delete zones
    Disabled,
}

/// Configuration related to identity zones
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ZonesConfig {
    /// What happens when a zone is deleted
    #[serde(default)]
    pub deletion: ZoneDeletionPolicy,
}

impl ZonesConfig {
    /// Returns true if all fields are at their default values
    pub(crate) fn is_default(&self) -> bool {
        self.deletion == ZoneDeletionPolicy::default()
    }
}

impl ConfigurationSection for ZonesConfig {
    const PATH: Option<&'static str> = Some("zones");
}
