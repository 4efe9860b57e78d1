// Copyright 2024 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use figment::Figment;
use rand::SeedableRng;
use schemars::r#gen::SchemaSettings;
use tokio::io::AsyncWriteExt;
use tracing::{info, info_span};
use uaa_config::{ConfigurationSection, RootConfig};

use crate::util::{core_from_config, repository_factory_from_config};

#[derive(Parser, Debug)]
pub(super) struct Options {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Parser, Debug)]
enum Subcommand {
    /// Dump the current config as YAML
    Dump {
        /// The path to the config file to dump
        ///
        /// If not specified, the config will be written to stdout
        #[clap(short, long)]
        output: Option<Utf8PathBuf>,
    },

    /// Check a config file
    Check,

    /// Generate a new config file
    Generate {
        /// The path to the config file to generate
        ///
        /// If not specified, the config will be written to stdout
        #[clap(short, long)]
        output: Option<Utf8PathBuf>,
    },

    /// Print the JSON schema of the config file
    Schema {
        /// The path to the schema file to write
        ///
        /// If not specified, the schema will be written to stdout
        #[clap(short, long)]
        output: Option<Utf8PathBuf>,
    },
}

async fn write_output(output: Option<Utf8PathBuf>, contents: &str) -> anyhow::Result<()> {
    if let Some(output) = output {
        info!("Writing to {output:?}");
        let mut file = tokio::fs::File::create(&output)
            .await
            .with_context(|| format!("could not create {output}"))?;
        file.write_all(contents.as_bytes()).await?;
    } else {
        info!("Writing to standard output");
        let mut stdout = tokio::io::stdout();
        stdout.write_all(contents.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as SC;
        match self.subcommand {
            SC::Dump { output } => {
                let _span = info_span!("cli.config.dump").entered();

                let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;
                let config = serde_yaml::to_string(&config)?;

                write_output(output, &config).await?;
            }

            SC::Check => {
                let _span = info_span!("cli.config.check").entered();

                let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;

                // Building the services catches what the schema can't, like
                // bad key material or argon2 parameters
                let _core = core_from_config(&config).await?;
                let _repository_factory = repository_factory_from_config(&config.users);

                info!("Configuration file looks good");
            }

            SC::Generate { output } => {
                let _span = info_span!("cli.config.generate").entered();

                // XXX: we should disallow SeedableRng::from_entropy
                let rng = rand_chacha::ChaChaRng::from_entropy();
                let config = RootConfig::generate(rng);
                let config = serde_yaml::to_string(&config)?;

                write_output(output, &config).await?;
            }

            SC::Schema { output } => {
                let _span = info_span!("cli.config.schema").entered();

                let generator = SchemaSettings::draft07()
                    .with(|settings| settings.option_nullable = true)
                    .into_generator();
                let schema = generator.into_root_schema_for::<RootConfig>();
                let schema = serde_json::to_string_pretty(&schema)?;

                write_output(output, &schema).await?;
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
