// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The single event stream a workspace consumes.
//!
//! Channel callbacks, the submissions feed, create acknowledgements and
//! timers all run outside the workspace; each one only posts a
//! [`WorkspaceEvent`]. The owner drains the stream and hands every event to
//! `Workspace::handle`, so state transitions happen one at a time.

use std::fmt;

use tokio::sync::mpsc;
use verdict_protocol::{ChannelEvent, SubmissionId};

use crate::bus::BusEvent;

/// Identity of one execution channel within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum WorkspaceEvent {
    /// Event from an execution channel
    Execution {
        channel: ChannelId,
        event: ChannelEvent,
    },
    /// The execution watchdog expired
    ExecutionStalled { channel: ChannelId, generation: u64 },
    /// Outcome of the one-shot create-submission call
    SubmissionCreated {
        ticket: u64,
        result: Result<SubmissionId, String>,
    },
    /// Feed event relevant to the submission tracked by submit `ticket`
    Feed { ticket: u64, event: BusEvent },
    /// Auto-hide delay of the judging status elapsed
    HideStatus { generation: u64 },
}

pub type EventSink = mpsc::UnboundedSender<WorkspaceEvent>;
pub type EventStream = mpsc::UnboundedReceiver<WorkspaceEvent>;

pub fn event_channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}
