// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use super::JsonWebSignatureAlg;

/// Keys shorter than the output of the hash function are rejected, see
/// [RFC 7518 section 3.2](https://www.rfc-editor.org/rfc/rfc7518#section-3.2).
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a key for {alg} must be at least {min} bytes long, got {got}")]
pub struct InvalidKeyLength {
    pub alg: JsonWebSignatureAlg,
    pub min: usize,
    pub got: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("signature mismatch")]
pub struct SignatureMismatch;

/// A shared secret bound to one `HS*` algorithm.
#[derive(Clone)]
pub struct SymmetricKey {
    alg: JsonWebSignatureAlg,
    key: Box<[u8]>,
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

fn min_length(alg: JsonWebSignatureAlg) -> usize {
    match alg {
        JsonWebSignatureAlg::Hs256 => 32,
        JsonWebSignatureAlg::Hs384 => 48,
        JsonWebSignatureAlg::Hs512 => 64,
    }
}

impl SymmetricKey {
    /// Create a new key for the given algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is too short for the algorithm.
    pub fn new(
        alg: JsonWebSignatureAlg,
        key: impl Into<Box<[u8]>>,
    ) -> Result<Self, InvalidKeyLength> {
        let key = key.into();
        let min = min_length(alg);
        if key.len() < min {
            return Err(InvalidKeyLength {
                alg,
                min,
                got: key.len(),
            });
        }

        Ok(Self { alg, key })
    }

    #[must_use]
    pub const fn alg(&self) -> JsonWebSignatureAlg {
        self.alg
    }

    /// Compute the MAC of the message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self.alg {
            JsonWebSignatureAlg::Hs256 => mac::<Hmac<Sha256>>(&self.key, message),
            JsonWebSignatureAlg::Hs384 => mac::<Hmac<Sha384>>(&self.key, message),
            JsonWebSignatureAlg::Hs512 => mac::<Hmac<Sha512>>(&self.key, message),
        }
    }

    /// Check the MAC of the message, in constant time.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not match.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureMismatch> {
        match self.alg {
            JsonWebSignatureAlg::Hs256 => check::<Hmac<Sha256>>(&self.key, message, signature),
            JsonWebSignatureAlg::Hs384 => check::<Hmac<Sha384>>(&self.key, message, signature),
            JsonWebSignatureAlg::Hs512 => check::<Hmac<Sha512>>(&self.key, message, signature),
        }
    }
}

fn new_mac<M: Mac + hmac::digest::KeyInit>(key: &[u8], message: &[u8]) -> M {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC can take a key of any size"));
    mac.update(message);
    mac
}

fn mac<M: Mac + hmac::digest::KeyInit>(key: &[u8], message: &[u8]) -> Vec<u8> {
    new_mac::<M>(key, message).finalize().into_bytes().to_vec()
}

fn check<M: Mac + hmac::digest::KeyInit>(
    key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureMismatch> {
    new_mac::<M>(key, message)
        .verify_slice(signature)
        .map_err(|_| SignatureMismatch)
}
