// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::jwa::JsonWebSignatureAlg;

/// The `typ` of the tokens signed by a [`Keyset`](crate::Keyset)
pub const JWT_TYPE: &str = "JWT";

/// The protected header of a signed token. Members the service never reads
/// are dropped on decode.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JsonWebSignatureHeader {
    alg: JsonWebSignatureAlg,

    #[serde(default)]
    kid: Option<String>,

    #[serde(default)]
    typ: Option<String>,

    #[serde(default)]
    crit: Option<Vec<String>>,
}

impl JsonWebSignatureHeader {
    /// The header of a token signed with the key `kid`
    #[must_use]
    pub fn for_key(alg: JsonWebSignatureAlg, kid: impl Into<String>) -> Self {
        Self {
            alg,
            kid: Some(kid.into()),
            typ: Some(JWT_TYPE.to_owned()),
            crit: None,
        }
    }

    /// A header naming nothing but the algorithm
    #[must_use]
    pub fn bare(alg: JsonWebSignatureAlg) -> Self {
        Self {
            alg,
            kid: None,
            typ: None,
            crit: None,
        }
    }

    #[must_use]
    pub const fn alg(&self) -> JsonWebSignatureAlg {
        self.alg
    }

    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Headers with critical extensions are never supported. A `typ`, when
    /// present, must be `JWT`, compared without case as media types are.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.crit.is_none()
            && self
                .typ
                .as_deref()
                .is_none_or(|typ| typ.eq_ignore_ascii_case(JWT_TYPE))
    }
}
