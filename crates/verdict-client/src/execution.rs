// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution controller.
//!
//! Drives one interactive run at a time over an execution channel:
//!
//! ```text
//! idle --run--> running --COMPLETE--> completed
//!                  |    --ERROR / transport failure / close--> errored
//!                  |    (any end after kill() was requested) --> killed
//!                  +--run--> (old channel killed and closed) running
//! ```
//!
//! The controller never blocks. Channel callbacks post
//! [`WorkspaceEvent::Execution`] tagged with the [`ChannelId`] they belong
//! to, and the owner feeds them back through [`ExecutionController::handle`].
//! Events from a channel that is no longer current are dropped, so a
//! discarded run can never write into the terminal of its successor.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use verdict_protocol::{
    ChannelEvent, DuplexChannel, Endpoint, EventHandler, ExecClientMessage, ExecInit,
    ExecServerMessage, Language, ProblemId, Transport,
};

use crate::error::{ClientError, Result};
use crate::event::{ChannelId, EventSink, WorkspaceEvent};
use crate::state::{Lifecycle, RunPhase};
use crate::terminal::{ExitSummary, LineKind, TerminalBuffer};
use crate::timer::ScheduledEvent;

/// What to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub problem_id: ProblemId,
    pub language: Language,
    pub code: String,
}

impl RunRequest {
    pub fn new(problem_id: ProblemId, language: Language, code: impl Into<String>) -> Self {
        Self {
            problem_id,
            language,
            code: code.into(),
        }
    }
}

struct Session {
    id: ChannelId,
    channel: Box<dyn DuplexChannel>,
    request: RunRequest,
    /// INIT has been sent
    initialized: bool,
    kill_requested: bool,
    watchdog: Option<ScheduledEvent>,
    watchdog_generation: u64,
}

impl Session {
    /// Kill (if the server knows about us) and close.
    fn discard(self) {
        if !self.channel.is_closed() {
            if self.initialized {
                if let Err(e) = self.channel.send_message(&ExecClientMessage::kill()) {
                    debug!(channel = %self.id, error = %e, "kill on discard not sent");
                }
            }
            self.channel.close();
        }
    }
}

pub struct ExecutionController {
    lifecycle: Lifecycle<RunPhase>,
    transport: Arc<dyn Transport>,
    sink: EventSink,
    terminal: TerminalBuffer,
    session: Option<Session>,
    last_request: Option<RunRequest>,
    next_channel: u64,
    watchdog: Option<Duration>,
}

impl ExecutionController {
    pub fn new(transport: Arc<dyn Transport>, sink: EventSink) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            transport,
            sink,
            terminal: TerminalBuffer::new(),
            session: None,
            last_request: None,
            next_channel: 0,
            watchdog: None,
        }
    }

    /// End a run that sees no frame for `timeout`. Off unless set.
    pub fn with_watchdog(mut self, timeout: Option<Duration>) -> Self {
        self.watchdog = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.lifecycle.phase()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn terminal(&self) -> &TerminalBuffer {
        &self.terminal
    }

    pub fn exit_summary(&self) -> Option<ExitSummary> {
        self.terminal.exit()
    }

    /// Channel of the current session, if one is open.
    pub fn active_channel(&self) -> Option<ChannelId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Request of the most recent run.
    pub fn last_request(&self) -> Option<&RunRequest> {
        self.last_request.as_ref()
    }

    /// Whether the server has been sent INIT for the current session.
    pub fn is_ready(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.initialized)
    }

    /// Start a run, discarding any run in progress first.
    pub fn run(&mut self, request: RunRequest) -> Result<ChannelId> {
        if request.code.trim().is_empty() {
            return Err(ClientError::EmptyCode);
        }

        if let Some(old) = self.session.take() {
            info!(channel = %old.id, "discarding previous run");
            old.discard();
        }
        self.lifecycle.reset();
        self.terminal.clear();
        self.terminal
            .push(LineKind::Cmd, request.language.run_command());

        self.next_channel += 1;
        let id = ChannelId(self.next_channel);
        let sink = self.sink.clone();
        let handler: EventHandler = Arc::new(move |event: ChannelEvent| {
            let _ = sink.send(WorkspaceEvent::Execution { channel: id, event });
        });
        let channel = self.transport.open(Endpoint::Execution, handler);

        self.lifecycle.advance(RunPhase::Running);
        info!(
            channel = %id,
            problem_id = %request.problem_id,
            language = %request.language,
            "run started"
        );
        self.last_request = Some(request.clone());
        self.session = Some(Session {
            id,
            channel,
            request,
            initialized: false,
            kill_requested: false,
            watchdog: None,
            watchdog_generation: 0,
        });
        self.arm_watchdog();
        Ok(id)
    }

    /// Echo a line of input and send it to the running program.
    pub fn send_stdin(&mut self, text: &str) -> Result<()> {
        if !self.is_running() {
            return Err(ClientError::NotRunning);
        }
        let session = self.session.as_ref().ok_or(ClientError::NotRunning)?;
        if !session.initialized {
            return Err(ClientError::NotReady);
        }
        self.terminal.push(LineKind::Stdin, text);
        session
            .channel
            .send_message(&ExecClientMessage::stdin_line(text))?;
        Ok(())
    }

    /// Ask the server to stop the run.
    ///
    /// Advisory: the phase changes only when the server confirms. Returns
    /// whether anything was requested; idle and finished runs are left alone.
    pub fn kill(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.kill_requested = true;
        if session.initialized {
            if let Err(e) = session.channel.send_message(&ExecClientMessage::kill()) {
                warn!(channel = %session.id, error = %e, "kill not sent");
            }
        }
        info!(channel = %session.id, "kill requested");
        true
    }

    /// Apply one event from an execution channel.
    pub fn handle(&mut self, channel: ChannelId, event: ChannelEvent) {
        match self.session.as_ref() {
            Some(session) if session.id == channel => {}
            _ => {
                debug!(%channel, "ignoring event from discarded channel");
                return;
            }
        }

        match event {
            ChannelEvent::Ready => self.on_ready(),
            ChannelEvent::Message(envelope) => match envelope.decode::<ExecServerMessage>() {
                Some(message) => self.on_message(message),
                None => debug!(kind = %envelope.kind, "ignoring frame outside execution vocabulary"),
            },
            ChannelEvent::Error(message) => {
                warn!(%channel, error = %message, "execution channel failed");
                self.end_abnormally(format!("Connection lost: {}", message));
            }
            ChannelEvent::Closed(code) => {
                let line = match code {
                    Some(code) => format!("Process terminated abnormally (close code {})", code),
                    None => "Process terminated abnormally".to_string(),
                };
                self.end_abnormally(line);
            }
        }
    }

    /// The watchdog for `channel` expired.
    pub fn on_stalled(&mut self, channel: ChannelId, generation: u64) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.id != channel || session.watchdog_generation != generation {
            return;
        }
        let secs = self.watchdog.map(|d| d.as_secs_f64()).unwrap_or_default();
        warn!(%channel, timeout_secs = secs, "execution channel stalled");
        self.terminal.push(
            LineKind::Stderr,
            format!("No response from the execution service for {}s", secs),
        );
        self.finish(RunPhase::Errored);
    }

    /// Close the current channel and forget the session.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(channel = %session.id, "shutting down execution");
            session.discard();
        }
        if self.is_running() {
            self.lifecycle.reset();
        }
    }

    fn on_ready(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.kill_requested {
            info!(channel = %session.id, "killed before start");
            self.finish(RunPhase::Killed);
            return;
        }

        let init = ExecClientMessage::Init(ExecInit {
            problem_id: session.request.problem_id,
            language: session.request.language,
            code: session.request.code.clone(),
        });
        match session.channel.send_message(&init) {
            Ok(()) => {
                session.initialized = true;
                debug!(channel = %session.id, "init sent");
                self.arm_watchdog();
            }
            Err(e) => self.end_abnormally(format!("Failed to start: {}", e)),
        }
    }

    fn on_message(&mut self, message: ExecServerMessage) {
        match message {
            ExecServerMessage::Stdout(text) => {
                self.terminal.push(LineKind::Stdout, text);
                self.arm_watchdog();
            }
            ExecServerMessage::Stderr(text) => {
                self.terminal.push(LineKind::Stderr, text);
                self.arm_watchdog();
            }
            ExecServerMessage::Complete(complete) => {
                let summary = ExitSummary::from(complete);
                self.terminal.set_exit(summary);
                info!(
                    exit_code = summary.exit_code,
                    time_ms = summary.time,
                    memory_kb = summary.memory,
                    "run finished"
                );
                let phase = self.outcome(RunPhase::Completed);
                self.finish(phase);
            }
            ExecServerMessage::Error(message) => {
                warn!(error = %message, "run failed");
                self.terminal.push(LineKind::Stderr, message);
                let phase = self.outcome(RunPhase::Errored);
                self.finish(phase);
            }
        }
    }

    fn end_abnormally(&mut self, line: String) {
        self.terminal.push(LineKind::Stderr, line);
        let phase = self.outcome(RunPhase::Errored);
        self.finish(phase);
    }

    fn outcome(&self, phase: RunPhase) -> RunPhase {
        match self.session.as_ref() {
            Some(session) if session.kill_requested => RunPhase::Killed,
            _ => phase,
        }
    }

    fn finish(&mut self, phase: RunPhase) {
        self.lifecycle.advance(phase);
        if let Some(session) = self.session.take() {
            session.channel.close();
        }
    }

    fn arm_watchdog(&mut self) {
        let Some(timeout) = self.watchdog else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.watchdog_generation += 1;
        session.watchdog = Some(ScheduledEvent::after(
            timeout,
            self.sink.clone(),
            WorkspaceEvent::ExecutionStalled {
                channel: session.id,
                generation: session.watchdog_generation,
            },
        ));
    }
}

impl Drop for ExecutionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
