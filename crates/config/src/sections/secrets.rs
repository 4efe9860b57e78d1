// Copyright 2024 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use futures_util::future::try_join_all;
use rand::{
    Rng,
    distributions::{Alphanumeric, DistString, Standard},
    prelude::Distribution as _,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::info;
use uaa_jose::{Keyset, jwa::JsonWebSignatureAlg, jwa::SymmetricKey};

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_field},
};

fn example_secret() -> &'static str {
    "0000111122223333444455556666777788889999aaaabbbbccccddddeeeeffff"
}

/// Key config option.
///
/// It either holds the hex-encoded key directly or references a file where
/// the hex-encoded key is stored.
#[derive(Clone, Debug)]
pub enum Key {
    File(Utf8PathBuf),
    Value(String),
}

/// Key fields as serialized in JSON.
#[derive(JsonSchema, Serialize, Deserialize, Clone, Debug)]
struct KeyRaw {
    #[schemars(with = "Option<String>")]
    key_file: Option<Utf8PathBuf>,
    #[schemars(regex(pattern = r"[0-9a-fA-F]+"), example = "example_secret")]
    key: Option<String>,
}

impl TryFrom<KeyRaw> for Key {
    type Error = anyhow::Error;

    fn try_from(value: KeyRaw) -> Result<Key, Self::Error> {
        match (value.key, value.key_file) {
            (None, None) => bail!("Missing `key` or `key_file`"),
            (None, Some(path)) => Ok(Key::File(path)),
            (Some(key), None) => Ok(Key::Value(key)),
            (Some(_), Some(_)) => bail!("Cannot specify both `key` and `key_file`"),
        }
    }
}

impl From<Key> for KeyRaw {
    fn from(value: Key) -> Self {
        match value {
            Key::File(path) => KeyRaw {
                key_file: Some(path),
                key: None,
            },
            Key::Value(key) => KeyRaw {
                key_file: None,
                key: Some(key),
            },
        }
    }
}

/// An HMAC algorithm used to sign tokens
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum SigningAlgorithm {
    /// HMAC using SHA-256
    #[default]
    #[serde(rename = "HS256")]
    Hs256,

    /// HMAC using SHA-384
    #[serde(rename = "HS384")]
    Hs384,

    /// HMAC using SHA-512
    #[serde(rename = "HS512")]
    Hs512,
}

impl From<SigningAlgorithm> for JsonWebSignatureAlg {
    fn from(value: SigningAlgorithm) -> Self {
        match value {
            SigningAlgorithm::Hs256 => Self::Hs256,
            SigningAlgorithm::Hs384 => Self::Hs384,
            SigningAlgorithm::Hs512 => Self::Hs512,
        }
    }
}

/// A single signing key with its key ID.
#[serde_as]
#[derive(JsonSchema, Serialize, Deserialize, Clone, Debug)]
pub struct KeyConfig {
    kid: String,

    #[serde(default)]
    alg: SigningAlgorithm,

    #[schemars(with = "KeyRaw")]
    #[serde_as(as = "serde_with::TryFromInto<KeyRaw>")]
    #[serde(flatten)]
    key: Key,
}

impl KeyConfig {
    /// Returns the raw key bytes.
    ///
    /// If `key_file` was given, the key is read from that file.
    async fn key_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let encoded = match &self.key {
            Key::File(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("could not read key file {path}"))?,
            Key::Value(key) => key.clone(),
        };

        hex::decode(encoded.trim())
            .with_context(|| format!("key {:?} is not valid hex", self.kid))
    }

    async fn symmetric_key(&self) -> anyhow::Result<(String, SymmetricKey)> {
        let bytes = self.key_bytes().await?;
        let key = SymmetricKey::new(self.alg.into(), bytes)
            .with_context(|| format!("invalid key {:?}", self.kid))?;
        Ok((self.kid.clone(), key))
    }
}

/// Application secrets
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecretsConfig {
    /// List of keys used to sign and verify tokens. The first one signs new
    /// tokens, all of them are accepted when verifying.
    keys: Vec<KeyConfig>,
}

impl SecretsConfig {
    /// Load the signing keys out of the config
    ///
    /// # Errors
    ///
    /// Returns an error when a key could not be read or imported
    #[tracing::instrument(name = "secrets.load", skip_all)]
    pub async fn keyset(&self) -> anyhow::Result<Keyset> {
        let keys = try_join_all(self.keys.iter().map(KeyConfig::symmetric_key)).await?;
        Ok(Keyset::new(keys)?)
    }

    pub(crate) fn generate<R>(mut rng: R) -> Self
    where
        R: Rng + Send,
    {
        info!("Generating keys...");

        let key: [u8; 32] = Standard.sample(&mut rng);
        let key = KeyConfig {
            kid: Alphanumeric.sample_string(&mut rng, 10),
            alg: SigningAlgorithm::Hs256,
            key: Key::Value(hex::encode(key)),
        };

        Self { keys: vec![key] }
    }

    pub(crate) fn test() -> Self {
        Self {
            keys: vec![KeyConfig {
                kid: "abcdef".to_owned(),
                alg: SigningAlgorithm::Hs256,
                key: Key::Value(example_secret().to_owned()),
            }],
        }
    }
}

impl ConfigurationSection for SecretsConfig {
    const PATH: Option<&'static str> = Some("secrets");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        if self.keys.is_empty() {
            return Err(invalid_field(
                figment,
                &["secrets", "keys"],
                "at least one key is required".to_owned(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Yaml},
    };
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn load_keys_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    secrets:
                      keys:
                        - kid: first
                          key: 0000111122223333444455556666777788889999aaaabbbbccccddddeeeeffff
                        - kid: second
                          alg: HS512
                          key_file: key.hex
                ",
            )?;
            jail.create_file("key.hex", &format!("{}\n", "ab".repeat(64)))?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let secrets = SecretsConfig::extract(&figment)
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(secrets.keys.len(), 2);

            // The key file path is relative to the jail directory
            let keyset = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(secrets.keyset())
                .unwrap();
            assert_eq!(keyset.signing_kid(), "first");

            Ok(())
        });
    }

    #[test]
    fn reject_both_key_and_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    secrets:
                      keys:
                        - kid: first
                          key: 00
                          key_file: key.hex
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            assert!(SecretsConfig::extract(&figment).is_err());

            Ok(())
        });
    }

    #[tokio::test]
    async fn generated_keys_load() {
        let rng = rand_chacha::ChaChaRng::seed_from_u64(42);
        let keyset = SecretsConfig::generate(rng).keyset().await.unwrap();
        assert_eq!(keyset.signing_kid().len(), 10);

        let keyset = SecretsConfig::test().keyset().await.unwrap();
        assert_eq!(keyset.signing_kid(), "abcdef");
    }

    #[tokio::test]
    async fn short_keys_are_rejected() {
        let config = SecretsConfig {
            keys: vec![KeyConfig {
                kid: "short".to_owned(),
                alg: SigningAlgorithm::Hs256,
                key: Key::Value("00ff".to_owned()),
            }],
        };
        assert!(config.keyset().await.is_err());
    }
}
