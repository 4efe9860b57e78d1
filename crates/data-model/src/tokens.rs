// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use oauth2_types::{requests::GrantType, scope::Scope};
use serde::{Deserialize, Serialize};
use serde_with::{TimestampSeconds, serde_as, skip_serializing_none};
use ulid::Ulid;

/// Type of token to generate or validate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// An access token, used by Relying Parties to authenticate requests
    Access,

    /// A refresh token, used by the refresh token grant
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access token"),
            TokenKind::Refresh => write!(f, "refresh token"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    User,
    Client,
}

/// Who a token was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// A user, through a user-facing grant
    User(Ulid),

    /// The client itself, through the client credentials grant
    Client(String),
}

impl Subject {
    #[must_use]
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::User(_) => SubjectKind::User,
            Self::Client(_) => SubjectKind::Client,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Ulid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Client(_) => None,
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "{id}"),
            Self::Client(client_id) => f.write_str(client_id),
        }
    }
}

/// The signed content of a self-contained token.
///
/// `iid` is shared by an access token and the refresh token minted with
/// it. `seq` is the issuance sequence number, strictly increasing across
/// the whole store, against which subject, client and zone revocations are
/// compared.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub jti: Ulid,
    pub iid: Ulid,
    pub seq: u64,
    pub kind: TokenKind,
    pub sub: String,
    pub sub_kind: SubjectKind,
    pub client_id: String,
    pub zid: Ulid,
    pub scope: Scope,
    pub grant_type: GrantType,
    #[serde_as(as = "TimestampSeconds")]
    pub iat: DateTime<Utc>,
    #[serde_as(as = "TimestampSeconds")]
    pub exp: DateTime<Utc>,
}

impl TokenClaims {
    /// The subject the token was issued for.
    #[must_use]
    pub fn subject(&self) -> Option<Subject> {
        match self.sub_kind {
            SubjectKind::User => self.sub.parse().ok().map(Subject::User),
            SubjectKind::Client => Some(Subject::Client(self.sub.clone())),
        }
    }

    /// Whether the token is expired
    ///
    /// # Parameters
    ///
    /// * `now` - The current time
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.exp < now
    }

    /// How long the token is still valid for, zero if already expired.
    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.exp - now).max(chrono::Duration::zero())
    }
}
