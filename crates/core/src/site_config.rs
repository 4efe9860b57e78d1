// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::Duration;
use oauth2_types::scope::{Scope, ScopeToken};

/// What happens when an identity zone is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZoneDeletionPolicy {
    /// Revoke every token of the zone, then remove its users and clients
    #[default]
    Cascade,

    /// Refuse to delete zones
    Disabled,
}

/// Knobs of the services, as loaded from the configuration
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Access token lifetime, for clients which don't set one
    pub access_token_ttl: Duration,

    /// Refresh token lifetime, for clients which don't set one
    pub refresh_token_ttl: Duration,

    /// How long authorization codes can be redeemed
    pub authorization_code_ttl: Duration,

    /// Whether refresh tokens are single-use
    pub refresh_token_rotation: bool,

    /// Authorities granted to new users
    pub default_authorities: Scope,

    pub zone_deletion: ZoneDeletionPolicy,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::hours(12),
            refresh_token_ttl: Duration::days(30),
            authorization_code_ttl: Duration::minutes(5),
            refresh_token_rotation: true,
            default_authorities: [ScopeToken::from_static("ROLE_USER")].into_iter().collect(),
            zone_deletion: ZoneDeletionPolicy::default(),
        }
    }
}
