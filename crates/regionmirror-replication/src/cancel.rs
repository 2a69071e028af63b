// Copyright 2024 The Rucket Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation cancellation.
//!
//! A [`Cancellation`] is handed to every storage gateway call. It fires when
//! the owning [`CancelHandle`] is triggered or when the optional deadline
//! passes, whichever comes first. Dropping the handle without triggering it
//! never cancels.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Triggers cancellation of an invocation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel the invocation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation of an invocation.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Create a linked handle and token.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx, deadline: None })
    }

    /// A token that never fires.
    pub fn never() -> Self {
        Self::new().1
    }

    /// Also fire at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Also fire after `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true if the invocation has been cancelled or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Completes once the invocation is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let signalled = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without cancelling.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signalled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signalled.await,
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::never()
    }
}
