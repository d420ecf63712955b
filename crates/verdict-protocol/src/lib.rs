// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Verdict Protocol - JSON envelopes over duplex channels
//!
//! This crate provides the wire protocol between an online-judge client and:
//! - the execution service (interactive runs: stdin/stdout/stderr, kill)
//! - the judge service (one-shot judge requests)
//! - the submissions feed (broadcast of submission lifecycle changes)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    verdict-protocol                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Vocabularies: execution / judge / submissions              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Envelope: {"type": ..., "data": ...} (serde_json)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport: WebSocket (tokio-tungstenite) or in-memory      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use verdict_protocol::{
//!     ChannelEvent, Endpoint, EventHandler, ExecClientMessage, StaticToken, Transport,
//!     TransportConfig, WsTransport,
//! };
//!
//! let transport = WsTransport::new(TransportConfig::default(), Arc::new(StaticToken::new("t")));
//! let handler: EventHandler = Arc::new(|event: ChannelEvent| println!("{:?}", event));
//! let channel = transport.open(Endpoint::Execution, handler);
//! // after ChannelEvent::Ready:
//! channel.send_message(&ExecClientMessage::stdin_line("42"))?;
//! ```

pub mod channel;
pub mod envelope;
pub mod execution;
pub mod judge;
pub mod memory;
pub mod submission;
pub mod ws;

pub use channel::{
    ChannelError, ChannelEvent, DuplexChannel, Endpoint, EventHandler, StaticToken,
    TokenProvider, Transport, deliver_text,
};
pub use envelope::Envelope;
pub use execution::{Empty, ExecClientMessage, ExecComplete, ExecInit, ExecServerMessage, Language};
pub use judge::{
    Created, JudgeClientMessage, JudgeComplete, JudgeInit, JudgeServerMessage, Progress, Verdict,
};
pub use memory::{MemoryPeer, MemoryTransport};
pub use submission::{
    ContestId, ProblemId, SubmissionEvent, SubmissionId, SubmissionRecord, SubmissionStatus,
};
pub use ws::{TransportConfig, WsTransport};
