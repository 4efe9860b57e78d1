// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    jwa::SymmetricKey,
    jwt::{JsonWebSignatureHeader, Jwt, JwtDecodeError, JwtSignatureError, JwtVerificationError},
};

#[derive(Debug, Error)]
pub enum KeysetError {
    #[error("the keyset has no key")]
    Empty,

    #[error("duplicate key ID {kid:?}")]
    DuplicateKid { kid: String },

    #[error(transparent)]
    Decode(#[from] JwtDecodeError),

    #[error(transparent)]
    Sign(#[from] JwtSignatureError),

    #[error("no key with ID {kid:?}")]
    UnknownKey { kid: String },

    #[error("the token does not name a key")]
    MissingKid,

    #[error(transparent)]
    Verification(#[from] JwtVerificationError),
}

/// A list of named symmetric keys. The first one signs new tokens, all of
/// them verify, so that keys can be rotated without invalidating the tokens
/// already out there.
#[derive(Debug, Clone)]
pub struct Keyset {
    keys: Vec<(String, SymmetricKey)>,
}

impl Keyset {
    /// Build a keyset from `(kid, key)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no key, or if two keys share an ID.
    pub fn new(keys: Vec<(String, SymmetricKey)>) -> Result<Self, KeysetError> {
        if keys.is_empty() {
            return Err(KeysetError::Empty);
        }

        for (index, (kid, _)) in keys.iter().enumerate() {
            if keys[..index].iter().any(|(other, _)| other == kid) {
                return Err(KeysetError::DuplicateKid { kid: kid.clone() });
            }
        }

        Ok(Self { keys })
    }

    /// The ID of the key used to sign new tokens.
    #[must_use]
    pub fn signing_kid(&self) -> &str {
        &self.keys[0].0
    }

    fn find(&self, kid: &str) -> Option<&SymmetricKey> {
        self.keys
            .iter()
            .find_map(|(candidate, key)| (candidate == kid).then_some(key))
    }

    /// Sign the payload with the current signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails to serialize.
    pub fn sign<T: Serialize>(&self, payload: T) -> Result<String, KeysetError> {
        let (kid, key) = &self.keys[0];
        let header = JsonWebSignatureHeader::for_key(key.alg(), kid.as_str());
        let jwt = Jwt::sign(header, payload, key)?;
        Ok(jwt.into())
    }

    /// Decode the token and check its signature against the key it names.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a well-formed JWS, names no key
    /// or an unknown one, or if its signature does not verify.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, KeysetError> {
        let jwt: Jwt<'_, T> = Jwt::try_from(token)?;
        let kid = jwt.header().kid().ok_or(KeysetError::MissingKid)?;
        let key = self.find(kid).ok_or_else(|| KeysetError::UnknownKey {
            kid: kid.to_owned(),
        })?;
        jwt.verify(key)?;
        Ok(jwt.into_payload())
    }
}
