// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Invocation-scoped logging.

use regionmirror_core::{LogFormat, LoggingConfig};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Install a subscriber for the current invocation.
///
/// `RUST_LOG` overrides the configured level. Logs go to stderr so stdout
/// carries only the completion marker. Dropping the guard flushes and
/// uninstalls the subscriber.
pub fn init(config: &LoggingConfig) -> DefaultGuard {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer.json());
            tracing::subscriber::set_default(subscriber)
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
            tracing::subscriber::set_default(subscriber)
        }
    }
}
