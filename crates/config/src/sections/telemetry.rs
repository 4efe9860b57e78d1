// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use camino::Utf8PathBuf;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigurationSection,
    util::{BoxError, invalid_field},
};

fn filter_example() -> &'static str {
    "info,uaa_core=debug"
}

/// How log lines are formatted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One line per event, with the span context
    #[default]
    Full,

    /// One line per event, without the span fields
    Compact,

    /// Multi-line, human-friendly output. Only useful for debugging
    Pretty,
}

/// Configuration related to logging
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LogConfig {
    /// Filter directives, in the `RUST_LOG` syntax. The `RUST_LOG` environment
    /// variable takes precedence when set.
    ///
    /// Defaults to `info` if not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(example = "filter_example")]
    pub filter: Option<String>,

    /// How log lines are formatted
    #[serde(default)]
    pub format: LogFormat,

    /// Write logs to this file instead of the standard error
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub file: Option<Utf8PathBuf>,
}

impl LogConfig {
    fn is_default(&self) -> bool {
        self.filter.is_none() && self.format == LogFormat::default() && self.file.is_none()
    }
}

/// Configuration related to sending monitoring data
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TelemetryConfig {
    /// Configuration related to logging
    #[serde(default, skip_serializing_if = "LogConfig::is_default")]
    pub log: LogConfig,
}

impl TelemetryConfig {
    /// Returns true if all fields are at their default values
    pub(crate) fn is_default(&self) -> bool {
        self.log.is_default()
    }
}

impl ConfigurationSection for TelemetryConfig {
    const PATH: Option<&'static str> = Some("telemetry");

    fn validate(&self, figment: &figment::Figment) -> Result<(), BoxError> {
        if let Some(filter) = &self.log.filter
            && filter.trim().is_empty()
        {
            return Err(invalid_field(
                figment,
                &["telemetry", "log", "filter"],
                "Log filter must not be empty".to_owned(),
            ));
        }

        if let Some(file) = &self.log.file
            && file.file_name().is_none()
        {
            return Err(invalid_field(
                figment,
                &["telemetry", "log", "file"],
                "Log file must point to a file name".to_owned(),
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

    use super::*;
    use crate::ConfigurationSectionExt;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    telemetry:
                      log:
                        filter: debug
                        format: compact
                        file: /var/log/uaa/uaa.log
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = TelemetryConfig::extract_or_default(&figment)
                .map_err(|e| figment::Error::from(e.to_string()))?;

            assert_eq!(config.log.filter.as_deref(), Some("debug"));
            assert_eq!(config.log.format, LogFormat::Compact);
            assert_eq!(
                config.log.file.as_ref().and_then(|f| f.file_name()),
                Some("uaa.log")
            );

            Ok(())
        });
    }

    #[test]
    fn reject_empty_filter() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
                    telemetry:
                      log:
                        filter: "  "
                "#,
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            assert!(TelemetryConfig::extract_or_default(&figment).is_err());

            Ok(())
        });
    }
}
