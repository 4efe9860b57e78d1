// Copyright 2025, 2026 Element Creations Ltd.
// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Logging setup

use std::{fs::OpenOptions, io::IsTerminal};

use anyhow::Context;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, registry::LookupSpan};
use uaa_config::{LogConfig, LogFormat};

/// The `RUST_LOG` environment variable wins over the configured filter,
/// which wins over `info`
pub fn filter_layer(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter.as_deref().unwrap_or("info")))
        .context("could not setup logging filter")
}

/// Build the layer writing the log lines, to the configured file or to the
/// standard error.
///
/// Lines are written from a background thread, which stops when the returned
/// guard is dropped.
pub fn fmt_layer<S>(
    config: &LogConfig,
) -> anyhow::Result<(Box<dyn Layer<S> + Send + Sync + 'static>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let (writer, guard, with_ansi) = if let Some(path) = &config.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("could not open the log file at {path}"))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        (writer, guard, false)
    } else {
        let output = std::io::stderr();
        let with_ansi = output.is_terminal();
        let (writer, guard) = tracing_appender::non_blocking(output);
        (writer, guard, with_ansi)
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(with_ansi);

    let layer = match config.format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    };

    Ok((layer, guard))
}
