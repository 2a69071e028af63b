// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! S3-compatible storage gateway for regionmirror.
//!
//! Talks to each region through its S3-compatible endpoint. The endpoint is
//! rendered from a template per (region, namespace):
//!
//! ```text
//! https://{namespace}.compat.objectstorage.{region}.oraclecloud.com
//! ```
//!
//! Cross-region copies read the object from the source region and write it
//! under the same name in the destination region.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod gateway;

pub use gateway::S3Gateway;
