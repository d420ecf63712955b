// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Duplex channel contract.
//!
//! A channel is a bidirectional, message-oriented connection. Opening one
//! never blocks: the transport reports progress through a single
//! [`EventHandler`] which receives, in order:
//!
//! 1. [`ChannelEvent::Ready`] once frames may be sent,
//! 2. zero or more [`ChannelEvent::Message`] frames, in receive order,
//! 3. optionally [`ChannelEvent::Error`] on a transport failure,
//! 4. exactly one [`ChannelEvent::Closed`].
//!
//! Frames that fail to parse never reach the handler (see [`deliver_text`]).
//! There is no ordering guarantee across two channels.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::envelope::Envelope;

/// Errors raised by channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid channel url: {0}")]
    InvalidUrl(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("connection timed out after {0}ms")]
    Timeout(u64),
}

/// The logical services a client opens channels to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Interactive execution, one channel per run
    Execution,
    /// Judge requests, one channel per submit
    Judge,
    /// Long-lived submissions broadcast feed
    Submissions,
}

impl Endpoint {
    /// Path segment appended to the transport base URL.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Execution => "execute",
            Endpoint::Judge => "judge",
            Endpoint::Submissions => "submissions",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Lifecycle notification delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The connection is open; sending is now defined.
    Ready,
    /// A well-formed envelope arrived.
    Message(Envelope),
    /// Transport-level failure. `Closed` follows.
    Error(String),
    /// The connection is gone, with the close code when the peer sent one.
    Closed(Option<u16>),
}

/// Receives every [`ChannelEvent`] of one channel.
pub type EventHandler = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Client side of an open channel.
pub trait DuplexChannel: Send + Sync {
    /// Queue an envelope for sending, in order.
    ///
    /// Sending before [`ChannelEvent::Ready`] is not defined by the protocol;
    /// callers wait for it before sending their first frame.
    fn send(&self, envelope: Envelope) -> Result<(), ChannelError>;

    /// Close the channel. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

impl dyn DuplexChannel {
    /// Encode a typed message and send it.
    pub fn send_message<M: Serialize>(&self, message: &M) -> Result<(), ChannelError> {
        self.send(Envelope::from_message(message)?)
    }
}

/// Opens channels to endpoints.
pub trait Transport: Send + Sync {
    /// Start opening a channel. Returns immediately; progress is reported to `handler`.
    fn open(&self, endpoint: Endpoint, handler: EventHandler) -> Box<dyn DuplexChannel>;
}

/// Supplies the access token at the moment a channel or request needs it.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Fixed token, or none for anonymous access.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Parse a text frame and hand it to `handler`, dropping it if malformed.
///
/// Every transport routes incoming text through here. Returns whether the
/// frame was delivered.
pub fn deliver_text(handler: &EventHandler, text: &str) -> bool {
    match Envelope::try_parse(text) {
        Some(envelope) => {
            handler(ChannelEvent::Message(envelope));
            true
        }
        None => {
            debug!(len = text.len(), "dropping malformed frame");
            false
        }
    }
}
