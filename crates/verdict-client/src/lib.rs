// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Verdict Client
//!
//! Interactive code execution and asynchronous judging on top of
//! `verdict-protocol` channels.
//!
//! # Architecture
//!
//! A [`Workspace`] owns everything one problem screen needs:
//! - [`ExecutionController`]: one interactive run at a time, streamed into a
//!   [`TerminalBuffer`], with stdin forwarding and advisory kill
//! - [`JudgingController`]: create a submission, then follow its updates on
//!   the shared [`SubmissionBus`] until a verdict arrives
//! - the code buffer and the rule that run and submit never overlap
//!
//! Nothing blocks. Channels, the feed, the create call and timers post
//! [`WorkspaceEvent`]s to one stream, and the owner applies them in order
//! with [`Workspace::handle`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use verdict_client::{
//!     ClientConfig, HttpSubmissionApi, SubmissionBus, Workspace, WorkspaceConfig,
//! };
//! use verdict_protocol::{Language, ProblemId, WsTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let transport = Arc::new(WsTransport::new(
//!     config.transport_config(),
//!     config.token_provider(),
//! ));
//! let api = Arc::new(HttpSubmissionApi::from_config(&config)?);
//!
//! // One feed per application, shared by every workspace
//! let bus = SubmissionBus::new();
//! let _feed = bus.connect(transport.as_ref());
//!
//! let (mut workspace, mut events) = Workspace::new(
//!     WorkspaceConfig::new(ProblemId(1), Language::Python).with_client_config(&config),
//!     transport,
//!     api,
//!     bus,
//! );
//! workspace.set_code("print(input())");
//! workspace.run()?;
//!
//! while workspace.step(&mut events).await {
//!     for line in workspace.terminal().lines() {
//!         println!("{}", line);
//!     }
//!     if !workspace.execution().is_running() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod bus;
mod config;
mod error;
mod event;
mod execution;
mod judging;
mod state;
mod terminal;
mod timer;
mod workspace;

pub use api::{ChannelSubmissionApi, CreateSubmission, HttpSubmissionApi, SubmissionApi};
pub use bus::{BusEvent, DeliveryError, FeedHandle, SubmissionBus, Subscription};
pub use config::ClientConfig;
pub use error::{ApiError, ClientError, Result};
pub use event::{ChannelId, EventSink, EventStream, WorkspaceEvent, event_channel};
pub use execution::{ExecutionController, RunRequest};
pub use judging::{CONNECTION_LOST_MESSAGE, JudgeStatus, JudgingController, SUBMIT_FAILED_MESSAGE};
pub use state::{JudgePhase, Lifecycle, Phase, RunPhase};
pub use terminal::{ExitSummary, LineKind, TerminalBuffer, TerminalLine};
pub use timer::ScheduledEvent;
pub use workspace::{Workspace, WorkspaceConfig};
