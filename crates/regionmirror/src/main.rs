// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Regionmirror: replicates object-storage change events across regions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use regionmirror_core::{Settings, Topology};
use regionmirror_replication::{
    Cancellation, Dispatcher, Handler, Invocation, NoOpGateway, StorageGateway,
};
use regionmirror_s3::S3Gateway;
use tokio::io::AsyncRead;
use tokio::signal;
use tracing::{info, warn};

mod cli;
mod logging;

use cli::{Cli, Commands};

// One invocation per process; a single thread keeps every task under the
// invocation's scoped subscriber.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Handle(args) => run_handle(args).await,
        Commands::Topology(args) => print_topology(args),
        Commands::Version => {
            println!("regionmirror {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_handle(args: cli::HandleArgs) -> Result<()> {
    let settings = load_settings(&args.config)?;
    let _log_guard = logging::init(&settings.logging);

    let (cancel_handle, mut cancel) = Cancellation::new();
    if let Some(deadline) = args.deadline {
        let remaining = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        cancel = cancel.with_timeout(remaining);
    }

    let interrupt = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling invocation");
            cancel_handle.cancel();
        }
    });

    let gateway: Arc<dyn StorageGateway> = if args.dry_run {
        info!("Dry run enabled, storage calls are logged only");
        Arc::new(NoOpGateway)
    } else {
        Arc::new(S3Gateway::new(settings.gateway.clone()).await)
    };
    let dispatcher = Dispatcher::new(gateway, settings.dispatch.clone());
    let handler = Handler::from_env(dispatcher);

    let input = open_input(args.input.as_ref()).await?;
    let outcome = handler.handle(input, tokio::io::stdout(), &cancel).await;
    interrupt.abort();

    let invocation = match outcome {
        Ok(invocation) => invocation,
        Err(err) if err.is_config_error() => {
            return Err(err).context("Invocation failed: function configuration is invalid")
        }
        Err(err) => return Err(err).context("Invocation failed"),
    };

    match invocation {
        Invocation::Replicated(result) => info!(
            run_id = %result.run_id,
            destinations = result.outcomes.len(),
            elapsed_ms = result.elapsed().num_milliseconds(),
            "Replication complete"
        ),
        Invocation::Skipped { event_type } => {
            info!(event_type = %event_type, "Event skipped")
        }
    }

    Ok(())
}

fn load_settings(path: &Option<PathBuf>) -> Result<Settings> {
    Settings::load(path.as_deref()).context("Failed to load configuration")
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event file {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

fn print_topology(args: cli::TopologyArgs) -> Result<()> {
    let topology = Topology::from_env().context("Failed to resolve topology")?;
    let json = if args.compact {
        serde_json::to_string(&topology)?
    } else {
        serde_json::to_string_pretty(&topology)?
    };
    println!("{json}");
    Ok(())
}
