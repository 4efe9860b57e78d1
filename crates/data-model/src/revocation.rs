// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::{SubjectKind, TokenClaims};

/// What a revocation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RevocationTarget {
    /// A single token
    Token { token_id: Ulid },

    /// An access token and the refresh token minted with it
    Issuance { issuance_id: Ulid },

    /// Every token issued to a user in a zone
    User { zone_id: Ulid, user_id: Ulid },

    /// Every token issued through a client in a zone
    Client { zone_id: Ulid, client_id: String },

    /// Every token of a zone
    Zone { zone_id: Ulid },
}

impl RevocationTarget {
    /// Every target which could revoke a token with these claims, in the
    /// order they should be checked.
    #[must_use]
    pub fn candidates(claims: &TokenClaims) -> Vec<Self> {
        let mut candidates = vec![
            Self::Token {
                token_id: claims.jti,
            },
            Self::Issuance {
                issuance_id: claims.iid,
            },
        ];

        if let Some(user_id) = claims.subject().and_then(|subject| subject.user_id()) {
            candidates.push(Self::User {
                zone_id: claims.zid,
                user_id,
            });
        }

        candidates.push(Self::Client {
            zone_id: claims.zid,
            client_id: claims.client_id.clone(),
        });
        candidates.push(Self::Zone {
            zone_id: claims.zid,
        });

        candidates
    }

    /// Whether this target names a single token or token pair, rather than
    /// a whole set of them.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Token { .. } | Self::Issuance { .. })
    }
}

/// A recorded revocation.
///
/// `sequence` is the last issuance sequence number handed out when the
/// revocation was recorded. Set revocations (user, client, zone) cover the
/// tokens minted up to and including that number, not the ones minted
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevocationRecord {
    pub target: RevocationTarget,
    pub sequence: u64,
    pub revoked_at: DateTime<Utc>,
}

impl RevocationRecord {
    /// Whether this record revokes a token with these claims.
    #[must_use]
    pub fn covers(&self, claims: &TokenClaims) -> bool {
        match &self.target {
            RevocationTarget::Token { token_id } => claims.jti == *token_id,
            RevocationTarget::Issuance { issuance_id } => claims.iid == *issuance_id,
            RevocationTarget::User { zone_id, user_id } => {
                claims.zid == *zone_id
                    && claims.sub_kind == SubjectKind::User
                    && claims.subject().and_then(|subject| subject.user_id()) == Some(*user_id)
                    && claims.seq <= self.sequence
            }
            RevocationTarget::Client { zone_id, client_id } => {
                claims.zid == *zone_id
                    && claims.client_id == *client_id
                    && claims.seq <= self.sequence
            }
            RevocationTarget::Zone { zone_id } => {
                claims.zid == *zone_id && claims.seq <= self.sequence
            }
        }
    }

    /// Combine with a later revocation of the same target. The result covers
    /// everything either of them covers, and keeps the first revocation time.
    #[must_use]
    pub fn merge(self, later: &Self) -> Self {
        Self {
            sequence: self.sequence.max(later.sequence),
            revoked_at: self.revoked_at.min(later.revoked_at),
            target: self.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use oauth2_types::requests::GrantType;

    use super::*;
    use crate::{Subject, TokenKind};

    const ZONE: Ulid = Ulid::from_parts(0, 100);
    const OTHER_ZONE: Ulid = Ulid::from_parts(0, 200);
    const USER: Ulid = Ulid::from_parts(0, 1);

    fn claims(zone: Ulid, subject: &Subject, seq: u64) -> TokenClaims {
        TokenClaims {
            jti: Ulid::from_parts(seq, 1),
            iid: Ulid::from_parts(seq, 2),
            seq,
            kind: TokenKind::Access,
            sub: subject.to_string(),
            sub_kind: subject.kind(),
            client_id: "app".to_owned(),
            zid: zone,
            scope: "read".parse().unwrap(),
            grant_type: GrantType::Password,
            iat: DateTime::default(),
            exp: DateTime::default() + Duration::seconds(60),
        }
    }

    fn record(target: RevocationTarget, sequence: u64) -> RevocationRecord {
        RevocationRecord {
            target,
            sequence,
            revoked_at: DateTime::default(),
        }
    }

    #[test]
    fn user_revocation_is_zone_scoped() {
        let subject = Subject::User(USER);
        let revocation = record(
            RevocationTarget::User {
                zone_id: ZONE,
                user_id: USER,
            },
            10,
        );

        assert!(revocation.covers(&claims(ZONE, &subject, 5)));
        assert!(!revocation.covers(&claims(OTHER_ZONE, &subject, 5)));
        assert!(!revocation.covers(&claims(ZONE, &Subject::User(Ulid::from_parts(0, 2)), 5)));
    }

    #[test]
    fn set_revocations_only_cover_earlier_issuances() {
        let subject = Subject::User(USER);
        let revocation = record(RevocationTarget::Zone { zone_id: ZONE }, 10);
        assert!(revocation.covers(&claims(ZONE, &subject, 10)));
        assert!(!revocation.covers(&claims(ZONE, &subject, 11)));

        let revocation = record(
            RevocationTarget::Client {
                zone_id: ZONE,
                client_id: "app".to_owned(),
            },
            3,
        );
        assert!(revocation.covers(&claims(ZONE, &Subject::Client("app".to_owned()), 2)));
        assert!(!revocation.covers(&claims(ZONE, &subject, 4)));
    }

    #[test]
    fn exact_revocations_ignore_sequence() {
        let token = claims(ZONE, &Subject::User(USER), 50);
        let revocation = record(RevocationTarget::Token { token_id: token.jti }, 0);
        assert!(revocation.covers(&token));

        let revocation = record(
            RevocationTarget::Issuance {
                issuance_id: token.iid,
            },
            0,
        );
        assert!(revocation.covers(&token));
    }

    #[test]
    fn candidates_order() {
        let token = claims(ZONE, &Subject::User(USER), 1);
        let candidates = RevocationTarget::candidates(&token);
        assert_eq!(candidates.len(), 5);
        assert!(candidates[0].is_exact());
        assert!(candidates[1].is_exact());
        assert_eq!(
            candidates[2],
            RevocationTarget::User {
                zone_id: ZONE,
                user_id: USER
            }
        );

        let token = claims(ZONE, &Subject::Client("app".to_owned()), 1);
        assert_eq!(RevocationTarget::candidates(&token).len(), 4);
    }

    #[test]
    fn merge_is_idempotent() {
        let target = RevocationTarget::Zone { zone_id: ZONE };
        let once = record(target.clone(), 10);
        let twice = once.clone().merge(&once);
        assert_eq!(once, twice);

        let later = RevocationRecord {
            revoked_at: DateTime::default() + Duration::seconds(5),
            ..record(target, 20)
        };
        let merged = once.clone().merge(&later);
        assert_eq!(merged.sequence, 20);
        assert_eq!(merged.revoked_at, once.revoked_at);
    }
}
