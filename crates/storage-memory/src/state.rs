// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::atomic::AtomicU64;

use dashmap::DashMap;
use uaa_data_model::{
    AuthorizationCode, Client, IdentityZone, RevocationRecord, RevocationTarget, User,
};
use uaa_storage::user::UsernameScope;
use ulid::Ulid;

/// Key of the username index: the zone is left out when usernames are
/// unique across zones
pub(crate) type UsernameKey = (Option<Ulid>, String);

#[derive(Default)]
pub(crate) struct State {
    pub username_scope: UsernameScope,

    pub zones: DashMap<Ulid, IdentityZone>,
    pub zone_subdomains: DashMap<String, Ulid>,

    pub users: DashMap<Ulid, User>,
    pub usernames: DashMap<UsernameKey, Ulid>,

    pub clients: DashMap<(Ulid, String), Client>,

    pub authorization_codes: DashMap<String, AuthorizationCode>,

    pub revocations: DashMap<RevocationTarget, RevocationRecord>,
    pub sequence: AtomicU64,
}

impl State {
    pub fn new(username_scope: UsernameScope) -> Self {
        Self {
            username_scope,
            ..Self::default()
        }
    }

    pub fn username_key(&self, zone_id: Ulid, username: &str) -> UsernameKey {
        let zone = match self.username_scope {
            UsernameScope::Zone => Some(zone_id),
            UsernameScope::Global => None,
        };
        (zone, username.to_lowercase())
    }
}
