// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Replication topology and its resolution from configuration.
//!
//! The topology is read once per invocation from three required keys:
//!
//! ```text
//! OCI_BUCKETNAME            bucket mirrored across regions
//! OCI_SOURCE_REGION         region the change events originate from
//! OCI_DESTINATION_REGIONS   comma-separated list of mirror regions
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::region::RegionId;

/// Configuration key holding the bucket name.
pub const ENV_BUCKET_NAME: &str = "OCI_BUCKETNAME";

/// Configuration key holding the source region.
pub const ENV_SOURCE_REGION: &str = "OCI_SOURCE_REGION";

/// Configuration key holding the comma-separated destination regions.
pub const ENV_DESTINATION_REGIONS: &str = "OCI_DESTINATION_REGIONS";

/// A source of raw configuration values.
pub trait ConfigSource {
    /// Look up a configuration value by key.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads configuration from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory configuration values.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Static replication topology for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Region the change events originate from.
    pub source_region: RegionId,
    /// Regions to mirror into, in configuration order. Never empty.
    pub destination_regions: Vec<RegionId>,
    /// Bucket mirrored across all regions.
    pub bucket_name: String,
}

impl Topology {
    /// Resolve the topology from the process environment.
    ///
    /// # Errors
    ///
    /// See [`resolve`].
    pub fn from_env() -> Result<Self> {
        resolve(&EnvSource)
    }
}

/// Resolve the replication topology from a configuration source.
///
/// # Errors
///
/// Returns [`Error::MissingConfig`] naming the first required key that is
/// absent or blank, and [`Error::MalformedConfig`] if the destination list
/// contains an empty entry.
pub fn resolve(source: &impl ConfigSource) -> Result<Topology> {
    let bucket_name = required(source, ENV_BUCKET_NAME)?;
    let source_region = required(source, ENV_SOURCE_REGION)?;
    let destinations = required(source, ENV_DESTINATION_REGIONS)?;

    let destination_regions = parse_region_list(&destinations)?;

    Ok(Topology { source_region: RegionId::new(source_region), destination_regions, bucket_name })
}

fn required(source: &impl ConfigSource, key: &'static str) -> Result<String> {
    match source.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::MissingConfig { key }),
    }
}

fn parse_region_list(raw: &str) -> Result<Vec<RegionId>> {
    raw.split(',')
        .enumerate()
        .map(|(index, token)| {
            let token = token.trim();
            if token.is_empty() {
                Err(Error::malformed_config(
                    ENV_DESTINATION_REGIONS,
                    format!("empty region at position {}", index + 1),
                ))
            } else {
                Ok(RegionId::new(token))
            }
        })
        .collect()
}
