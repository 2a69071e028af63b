// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Command line interface definition.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

/// Regionmirror: replicates object-storage change events across regions.
#[derive(Parser)]
#[command(name = "regionmirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Process one change event.
    Handle(HandleArgs),
    /// Resolve the replication topology and print it as JSON.
    Topology(TopologyArgs),
    /// Print version information.
    Version,
}

/// Arguments for the handle command.
#[derive(Args)]
pub struct HandleArgs {
    /// Read the event from this file instead of stdin.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Path to the settings file.
    #[arg(short, long, env = "REGIONMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Invocation deadline (RFC 3339).
    #[arg(long, env = "FN_DEADLINE", value_parser = parse_deadline)]
    pub deadline: Option<DateTime<Utc>>,

    /// Log storage calls instead of performing them.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the topology command.
#[derive(Args)]
pub struct TopologyArgs {
    /// Print compact JSON on a single line.
    #[arg(long)]
    pub compact: bool,
}

fn parse_deadline(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|deadline| deadline.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 deadline: {e}"))
}
