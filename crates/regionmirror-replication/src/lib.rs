// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Multi-destination replication dispatch for regionmirror.
//!
//! Given a replication [`Intent`](regionmirror_core::Intent) and the resolved
//! [`Topology`](regionmirror_core::Topology), the [`Dispatcher`] issues one
//! storage operation per destination region through a [`StorageGateway`]:
//!
//! ```text
//!   change event
//!        │
//!        ▼
//!  ┌────────────┐   ┌──────────┐   ┌────────────┐
//!  │ translate  │──▶│ resolve  │──▶│ Dispatcher │
//!  └────────────┘   └──────────┘   └─────┬──────┘
//!                                        │ one call per destination
//!                      ┌─────────────────┼─────────────────┐
//!                      ▼                 ▼                 ▼
//!                 us-ashburn-1     eu-frankfurt-1     ap-tokyo-1
//! ```
//!
//! Failures are attributed to their region and never stop the remaining
//! destinations. No retries happen here: a failed invocation is surfaced to
//! the invoking runtime, which may redeliver the event.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use regionmirror_core::DispatchConfig;
//! use regionmirror_replication::{Cancellation, Dispatcher, Handler, NoOpGateway};
//!
//! let dispatcher = Dispatcher::new(Arc::new(NoOpGateway), DispatchConfig::default());
//! let handler = Handler::from_env(dispatcher);
//!
//! handler.handle(tokio::io::stdin(), tokio::io::stdout(), &Cancellation::never()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod dispatcher;
mod error;
mod gateway;
mod handler;

// Re-export cancellation
pub use cancel::{CancelHandle, Cancellation};
// Re-export dispatch types
pub use dispatcher::{plan, DispatchOutcome, Dispatcher, Operation, RunResult};
// Re-export error types
pub use error::{DestinationError, DispatchError, GatewayError, GatewayResult, HandlerError};
// Re-export gateway types
pub use gateway::{CopyRequest, DeleteRequest, NoOpGateway, StorageGateway};
// Re-export invocation handling
pub use handler::{Handler, Invocation, COMPLETION_MARKER};
