// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use super::{DecodeError, JsonWebSignatureHeader, RawJwt};
use crate::jwa::{JsonWebSignatureAlg, SymmetricKey};

/// A decoded compact JWS. The signature is *not* checked on decoding, call
/// [`Jwt::verify`] before trusting the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Jwt<'a, T> {
    raw: RawJwt<'a>,
    header: JsonWebSignatureHeader,
    payload: T,
    signature: Vec<u8>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Jwt<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwt")
            .field("header", &self.header)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum JwtDecodeError {
    #[error(transparent)]
    RawDecode {
        #[from]
        inner: DecodeError,
    },

    #[error("failed to decode JWT header")]
    DecodeHeader {
        #[source]
        inner: base64ct::Error,
    },

    #[error("failed to deserialize JWT header")]
    DeserializeHeader {
        #[source]
        inner: serde_json::Error,
    },

    #[error("failed to decode JWT payload")]
    DecodePayload {
        #[source]
        inner: base64ct::Error,
    },

    #[error("failed to deserialize JWT payload")]
    DeserializePayload {
        #[source]
        inner: serde_json::Error,
    },

    #[error("failed to decode JWT signature")]
    DecodeSignature {
        #[source]
        inner: base64ct::Error,
    },
}

#[derive(Debug, Error)]
pub enum JwtSignatureError {
    #[error("header says {header}, but the key is for {key}")]
    AlgorithmMismatch {
        header: JsonWebSignatureAlg,
        key: JsonWebSignatureAlg,
    },

    #[error("failed to serialize JWT header")]
    EncodeHeader {
        #[source]
        inner: serde_json::Error,
    },

    #[error("failed to serialize JWT payload")]
    EncodePayload {
        #[source]
        inner: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtVerificationError {
    #[error("header says {header}, but the key is for {key}")]
    AlgorithmMismatch {
        header: JsonWebSignatureAlg,
        key: JsonWebSignatureAlg,
    },

    #[error("JWT header has critical extensions or an unexpected type")]
    UnsupportedHeader,

    #[error("JWT signature mismatch")]
    SignatureMismatch,
}

impl<'a, T> TryFrom<&'a str> for Jwt<'a, T>
where
    T: DeserializeOwned,
{
    type Error = JwtDecodeError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        let raw = RawJwt::try_from(value)?;

        let header = Base64UrlUnpadded::decode_vec(raw.header())
            .map_err(|inner| JwtDecodeError::DecodeHeader { inner })?;
        let header: JsonWebSignatureHeader = serde_json::from_slice(&header)
            .map_err(|inner| JwtDecodeError::DeserializeHeader { inner })?;

        let payload = Base64UrlUnpadded::decode_vec(raw.payload())
            .map_err(|inner| JwtDecodeError::DecodePayload { inner })?;
        let payload: T = serde_json::from_slice(&payload)
            .map_err(|inner| JwtDecodeError::DeserializePayload { inner })?;

        let signature = Base64UrlUnpadded::decode_vec(raw.signature())
            .map_err(|inner| JwtDecodeError::DecodeSignature { inner })?;

        Ok(Self {
            raw,
            header,
            payload,
            signature,
        })
    }
}

impl<T> Jwt<'_, T> {
    #[must_use]
    pub fn header(&self) -> &JsonWebSignatureHeader {
        &self.header
    }

    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check the signature of this token against the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if the header algorithm does not match the key, if
    /// the header is not one we can process, or if the signature is wrong.
    pub fn verify(&self, key: &SymmetricKey) -> Result<(), JwtVerificationError> {
        if self.header.alg() != key.alg() {
            return Err(JwtVerificationError::AlgorithmMismatch {
                header: self.header.alg(),
                key: key.alg(),
            });
        }

        if !self.header.is_supported() {
            return Err(JwtVerificationError::UnsupportedHeader);
        }

        key.verify(self.raw.signed_part().as_bytes(), &self.signature)
            .map_err(|_| JwtVerificationError::SignatureMismatch)
    }
}

impl<T> Jwt<'static, T>
where
    T: Serialize,
{
    /// Serialize and sign the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the header algorithm does not match the key, or
    /// if the header or payload fail to serialize.
    pub fn sign(
        header: JsonWebSignatureHeader,
        payload: T,
        key: &SymmetricKey,
    ) -> Result<Self, JwtSignatureError> {
        if header.alg() != key.alg() {
            return Err(JwtSignatureError::AlgorithmMismatch {
                header: header.alg(),
                key: key.alg(),
            });
        }

        let encoded_header = serde_json::to_vec(&header)
            .map_err(|inner| JwtSignatureError::EncodeHeader { inner })?;
        let encoded_header = Base64UrlUnpadded::encode_string(&encoded_header);

        let encoded_payload = serde_json::to_vec(&payload)
            .map_err(|inner| JwtSignatureError::EncodePayload { inner })?;
        let encoded_payload = Base64UrlUnpadded::encode_string(&encoded_payload);

        let mut inner = format!("{encoded_header}.{encoded_payload}");
        let first_dot = encoded_header.len();
        let second_dot = inner.len();

        let signature = key.sign(inner.as_bytes());
        inner.push('.');
        inner.push_str(&Base64UrlUnpadded::encode_string(&signature));

        Ok(Self {
            raw: RawJwt::new(inner, first_dot, second_dot),
            header,
            payload,
            signature,
        })
    }
}

impl<T> From<Jwt<'_, T>> for String {
    fn from(val: Jwt<'_, T>) -> Self {
        val.raw.into()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Claims {
        sub: String,
        exp: i64,
    }

    fn key() -> SymmetricKey {
        SymmetricKey::new(JsonWebSignatureAlg::Hs256, b"0123456789abcdef0123456789abcdef".to_vec())
            .unwrap()
    }

    fn claims() -> Claims {
        Claims {
            sub: "marissa".to_owned(),
            exp: 1_700_000_000,
        }
    }

    #[test]
    fn sign_then_decode_and_verify() {
        let header = JsonWebSignatureHeader::for_key(JsonWebSignatureAlg::Hs256, "k1");
        let jwt = Jwt::sign(header, claims(), &key()).unwrap();
        let token: String = jwt.into();

        let decoded: Jwt<'_, Claims> = Jwt::try_from(token.as_str()).unwrap();
        decoded.verify(&key()).unwrap();
        assert_eq!(decoded.header().kid(), Some("k1"));
        assert_eq!(decoded.payload(), &claims());
    }

    #[test]
    fn compact_serialization_is_stable() {
        let header = JsonWebSignatureHeader::for_key(JsonWebSignatureAlg::Hs256, "k1");
        let jwt = Jwt::sign(header, claims(), &key()).unwrap();
        let token: String = jwt.into();
        let mut parts = token.split('.');

        let header = Base64UrlUnpadded::decode_vec(parts.next().unwrap()).unwrap();
        insta::assert_snapshot!(String::from_utf8(header).unwrap(), @r#"{"alg":"HS256","kid":"k1","typ":"JWT"}"#);
        let payload = Base64UrlUnpadded::decode_vec(parts.next().unwrap()).unwrap();
        insta::assert_snapshot!(String::from_utf8(payload).unwrap(), @r#"{"sub":"marissa","exp":1700000000}"#);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let header = JsonWebSignatureHeader::bare(JsonWebSignatureAlg::Hs256);
        let token: String = Jwt::sign(header, claims(), &key()).unwrap().into();

        let forged_payload = Base64UrlUnpadded::encode_string(
            &serde_json::to_vec(&Claims {
                sub: "admin".to_owned(),
                exp: 1_700_000_000,
            })
            .unwrap(),
        );
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_payload;
        let forged = parts.join(".");

        let decoded: Jwt<'_, Claims> = Jwt::try_from(forged.as_str()).unwrap();
        assert_eq!(
            decoded.verify(&key()),
            Err(JwtVerificationError::SignatureMismatch)
        );
    }

    #[test]
    fn algorithm_confusion_is_rejected() {
        let header = JsonWebSignatureHeader::bare(JsonWebSignatureAlg::Hs256);
        let token: String = Jwt::sign(header, claims(), &key()).unwrap().into();
        let decoded: Jwt<'_, Claims> = Jwt::try_from(token.as_str()).unwrap();

        let other = SymmetricKey::new(JsonWebSignatureAlg::Hs512, vec![7; 64]).unwrap();
        assert_matches!(
            decoded.verify(&other),
            Err(JwtVerificationError::AlgorithmMismatch { .. })
        );

        let header = JsonWebSignatureHeader::bare(JsonWebSignatureAlg::Hs512);
        assert_matches!(
            Jwt::sign(header, claims(), &key()),
            Err(JwtSignatureError::AlgorithmMismatch { .. })
        );
    }

    #[test]
    fn garbage_does_not_decode() {
        assert_matches!(
            Jwt::<Claims>::try_from("not a token"),
            Err(JwtDecodeError::RawDecode { .. })
        );
        assert_matches!(
            Jwt::<Claims>::try_from("!!.e30.AAAA"),
            Err(JwtDecodeError::DecodeHeader { .. })
        );
        assert_matches!(
            Jwt::<Claims>::try_from("e30.e30.AAAA"),
            Err(JwtDecodeError::DeserializeHeader { .. })
        );
    }
}
