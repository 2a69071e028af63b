// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Core types for regionmirror.
//!
//! regionmirror reacts to object-storage change notifications in a source
//! region and mirrors the affected object into a set of destination regions.
//! This crate holds everything that happens before any storage call:
//!
//! - [`topology`]: resolving the source region, destination regions and bucket
//! - [`event`]: the change notification envelope
//! - [`intent`]: translating a notification into a replication [`Intent`]
//! - [`config`]: logging, gateway and dispatch settings

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod intent;
pub mod region;
pub mod topology;

pub use config::{DispatchConfig, DispatchMode, GatewayConfig, LogFormat, LoggingConfig, Settings};
pub use error::{Error, Result};
pub use event::ChangeEvent;
pub use intent::{translate, ActionKind, Intent, Translation};
pub use region::RegionId;
pub use topology::{resolve, ConfigSource, EnvSource, MapSource, Topology};
