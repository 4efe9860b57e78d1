// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use figment::{Figment, Profile};
use serde::de::DeserializeOwned;

/// The error type of section loading and validation
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build an error pointing at a field of the configuration, so that the
/// message names the field and the file it was loaded from.
///
/// `path` is the full path to the field, like `["tokens", "access_token_ttl"]`
pub(crate) fn invalid_field(figment: &Figment, path: &[&str], message: String) -> BoxError {
    let key = path.join(".");
    let mut error = figment::Error::from(message);
    // The field itself may come from the defaults, in which case the section
    // is the best we can point at
    error.metadata = figment
        .find_metadata(&key)
        .or_else(|| path.first().and_then(|section| figment.find_metadata(section)))
        .cloned();
    error.profile = Some(Profile::Default);
    error.path = path.iter().map(|&segment| segment.to_owned()).collect();
    Box::new(error)
}

/// A section of the configuration file, loaded on its own by the parts of
/// the service which need it
pub trait ConfigurationSection: Sized + DeserializeOwned {
    /// Where this section lives in the file. `None` for the root.
    const PATH: Option<&'static str> = None;

    /// Check what the types can't express, like ranges and cross-field rules
    ///
    /// # Errors
    ///
    /// Returns an error pointing at the first invalid field
    fn validate(&self, _figment: &Figment) -> Result<(), BoxError> {
        Ok(())
    }

    /// Load and validate the section
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing, malformed or invalid
    fn extract(figment: &Figment) -> Result<Self, BoxError> {
        let this: Self = match Self::PATH {
            Some(path) => figment.extract_inner(path)?,
            None => figment.extract()?,
        };

        this.validate(figment)?;
        Ok(this)
    }
}

/// Loading for the sections which are optional in the file
pub trait ConfigurationSectionExt: ConfigurationSection + Default {
    /// Like [`ConfigurationSection::extract`], but falls back to the default
    /// value when the section is absent
    ///
    /// # Errors
    ///
    /// Returns an error if the section is present but malformed or invalid
    fn extract_or_default(figment: &Figment) -> Result<Self, BoxError> {
        match Self::PATH {
            Some(path) if !figment.contains(path) => Ok(Self::default()),
            _ => Self::extract(figment),
        }
    }
}

impl<T: ConfigurationSection + Default> ConfigurationSectionExt for T {}

#[cfg(test)]
mod tests {
    use figment::{
        Jail,
        providers::{Format, Yaml},
    };

    use super::*;

    #[test]
    fn invalid_fields_point_at_their_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    tokens:
                      access_token_ttl: 0
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let error = invalid_field(
                &figment,
                &["tokens", "access_token_ttl"],
                "must be positive".to_owned(),
            );
            let error = error.downcast::<figment::Error>().unwrap();
            assert_eq!(error.path, ["tokens", "access_token_ttl"]);
            assert!(error.metadata.is_some());

            // Nothing to point at for fields which only have defaults
            let error = invalid_field(&Figment::new(), &["zones", "deletion"], "nope".to_owned());
            let error = error.downcast::<figment::Error>().unwrap();
            assert!(error.metadata.is_none());

            Ok(())
        });
    }
}
