// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Delayed events with an owner.
//!
//! A [`ScheduledEvent`] posts one event after a delay unless it is cancelled
//! first. Dropping it cancels it, so whoever holds the handle is the only
//! party that can let it fire.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::event::{EventSink, WorkspaceEvent};

#[derive(Debug)]
pub struct ScheduledEvent {
    token: CancellationToken,
}

impl ScheduledEvent {
    /// Post `event` to `sink` once `delay` has passed from now.
    ///
    /// Spawns onto the current tokio runtime.
    pub fn after(delay: Duration, sink: EventSink, event: WorkspaceEvent) -> Self {
        let deadline = Instant::now() + delay;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = cancelled.cancelled() => {
                    trace!("scheduled event cancelled");
                }

                _ = sleep_until(deadline) => {
                    let _ = sink.send(event);
                }
            }
        });

        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ScheduledEvent {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
