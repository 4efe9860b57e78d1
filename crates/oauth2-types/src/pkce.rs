// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Types for the [Proof Key for Code Exchange].
//!
//! [Proof Key for Code Exchange]: https://www.rfc-editor.org/rfc/rfc7636

use std::{borrow::Cow, fmt, str::FromStr};

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur when verifying a code challenge.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeChallengeError {
    /// The code verifier should be at least 43 characters long.
    #[error("code_verifier should be at least 43 characters long")]
    TooShort,

    /// The code verifier should be at most 128 characters long.
    #[error("code_verifier should be at most 128 characters long")]
    TooLong,

    /// The code verifier contains invalid characters.
    #[error("code_verifier contains invalid characters")]
    InvalidCharacters,

    /// The challenge verification failed.
    #[error("challenge verification failed")]
    VerificationFailed,
}

/// A method to compute a code challenge out of a code verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkceCodeChallengeMethod {
    /// The code challenge is the code verifier itself.
    #[serde(rename = "plain")]
    Plain,

    /// The code challenge is the URL-safe base64 of the SHA-256 digest of
    /// the code verifier.
    S256,
}

impl PkceCodeChallengeMethod {
    /// The name of the method, as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl fmt::Display for PkceCodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown code challenge method.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown code challenge method {0:?}")]
pub struct UnknownCodeChallengeMethod(String);

impl FromStr for PkceCodeChallengeMethod {
    type Err = UnknownCodeChallengeMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(UnknownCodeChallengeMethod(other.to_owned())),
        }
    }
}

fn validate_verifier(verifier: &str) -> Result<(), CodeChallengeError> {
    if verifier.len() < 43 {
        return Err(CodeChallengeError::TooShort);
    }

    if verifier.len() > 128 {
        return Err(CodeChallengeError::TooLong);
    }

    // code-verifier = 43*128unreserved
    // unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"
    if !verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    {
        return Err(CodeChallengeError::InvalidCharacters);
    }

    Ok(())
}

/// Helpers to compute and check challenges for a [`PkceCodeChallengeMethod`].
pub trait CodeChallengeMethodExt {
    /// Compute the challenge for a given verifier
    ///
    /// # Errors
    ///
    /// Returns an error if the verifier did not adhere to the rules defined by
    /// the RFC in terms of length and allowed characters
    fn compute_challenge<'a>(&self, verifier: &'a str) -> Result<Cow<'a, str>, CodeChallengeError>;

    /// Verify that a given verifier is valid for the given challenge
    ///
    /// # Errors
    ///
    /// Returns an error if the verifier did not match the challenge, or if the
    /// verifier did not adhere to the rules defined by the RFC in terms of
    /// length and allowed characters
    fn verify(&self, challenge: &str, verifier: &str) -> Result<(), CodeChallengeError> {
        if self.compute_challenge(verifier)? == challenge {
            Ok(())
        } else {
            Err(CodeChallengeError::VerificationFailed)
        }
    }
}

impl CodeChallengeMethodExt for PkceCodeChallengeMethod {
    fn compute_challenge<'a>(&self, verifier: &'a str) -> Result<Cow<'a, str>, CodeChallengeError> {
        validate_verifier(verifier)?;

        let challenge = match self {
            Self::Plain => verifier.into(),
            Self::S256 => {
                let mut hasher = Sha256::new();
                hasher.update(verifier.as_bytes());
                let hash = hasher.finalize();
                Base64UrlUnpadded::encode_string(&hash).into()
            }
        };

        Ok(challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vector from RFC 7636, appendix B
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn s256_rfc_vector() {
        let method = PkceCodeChallengeMethod::S256;
        assert_eq!(method.compute_challenge(VERIFIER).unwrap(), CHALLENGE);
        method.verify(CHALLENGE, VERIFIER).unwrap();
        assert_eq!(
            method.verify(VERIFIER, VERIFIER),
            Err(CodeChallengeError::VerificationFailed)
        );
    }

    #[test]
    fn plain_method() {
        let method = PkceCodeChallengeMethod::Plain;
        method.verify(VERIFIER, VERIFIER).unwrap();
        assert_eq!(
            method.verify(CHALLENGE, VERIFIER),
            Err(CodeChallengeError::VerificationFailed)
        );
    }

    #[test]
    fn verifier_rules() {
        let method = PkceCodeChallengeMethod::Plain;
        assert_eq!(
            method.compute_challenge("short"),
            Err(CodeChallengeError::TooShort)
        );
        assert_eq!(
            method.compute_challenge(&"a".repeat(129)),
            Err(CodeChallengeError::TooLong)
        );
        assert_eq!(
            method.compute_challenge(&format!("{}!", "a".repeat(50))),
            Err(CodeChallengeError::InvalidCharacters)
        );
    }

    #[test]
    fn parse_method() {
        assert_eq!("S256".parse(), Ok(PkceCodeChallengeMethod::S256));
        assert_eq!("plain".parse(), Ok(PkceCodeChallengeMethod::Plain));
        assert!("s256".parse::<PkceCodeChallengeMethod>().is_err());
        assert_eq!(
            serde_json::to_value(PkceCodeChallengeMethod::S256).unwrap(),
            serde_json::json!("S256")
        );
    }
}
