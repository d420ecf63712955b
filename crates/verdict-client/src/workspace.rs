// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workspace orchestrator.
//!
//! One screen's worth of state: the code buffer, the execution controller
//! with its terminal, and the judging controller. The workspace decides
//! which of the two may act (never both at once) and is the only consumer
//! of the event stream every background source posts to.
//!
//! ```text
//! channels / feed / create call / timers
//!              │ WorkspaceEvent
//!              ▼
//!        EventStream ──► Workspace::handle ──► ExecutionController
//!                                          └─► JudgingController
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use verdict_protocol::{ContestId, Language, ProblemId, Transport};

use crate::api::{CreateSubmission, SubmissionApi};
use crate::bus::SubmissionBus;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::event::{ChannelId, EventStream, WorkspaceEvent, event_channel};
use crate::execution::{ExecutionController, RunRequest};
use crate::judging::{JudgeStatus, JudgingController};
use crate::state::{JudgePhase, RunPhase};
use crate::terminal::{ExitSummary, TerminalBuffer};

/// Per-workspace settings.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub problem_id: ProblemId,
    /// Set when the problem is opened inside a contest
    pub contest_id: Option<ContestId>,
    pub language: Language,
    pub status_hide_delay: Duration,
    pub run_watchdog: Option<Duration>,
}

impl WorkspaceConfig {
    pub fn new(problem_id: ProblemId, language: Language) -> Self {
        Self {
            problem_id,
            contest_id: None,
            language,
            status_hide_delay: Duration::from_millis(3000),
            run_watchdog: None,
        }
    }

    /// Take the timing settings from a client configuration.
    pub fn with_client_config(mut self, config: &ClientConfig) -> Self {
        self.status_hide_delay = config.status_hide_delay;
        self.run_watchdog = config.run_watchdog;
        self
    }

    pub fn with_contest(mut self, contest_id: ContestId) -> Self {
        self.contest_id = Some(contest_id);
        self
    }

    pub fn with_status_hide_delay(mut self, delay: Duration) -> Self {
        self.status_hide_delay = delay;
        self
    }

    pub fn with_run_watchdog(mut self, timeout: Option<Duration>) -> Self {
        self.run_watchdog = timeout;
        self
    }
}

pub struct Workspace {
    problem_id: ProblemId,
    contest_id: Option<ContestId>,
    language: Language,
    code: String,
    execution: ExecutionController,
    judging: JudgingController,
}

impl Workspace {
    /// Build a workspace and the event stream its owner must drain into
    /// [`Workspace::handle`].
    pub fn new(
        config: WorkspaceConfig,
        transport: Arc<dyn Transport>,
        api: Arc<dyn SubmissionApi>,
        bus: SubmissionBus,
    ) -> (Self, EventStream) {
        let (sink, events) = event_channel();
        let execution =
            ExecutionController::new(transport, sink.clone()).with_watchdog(config.run_watchdog);
        let judging = JudgingController::new(api, bus, sink, config.status_hide_delay);

        let workspace = Self {
            problem_id: config.problem_id,
            contest_id: config.contest_id,
            language: config.language,
            code: String::new(),
            execution,
            judging,
        };
        (workspace, events)
    }

    pub fn problem_id(&self) -> ProblemId {
        self.problem_id
    }

    pub fn contest_id(&self) -> Option<ContestId> {
        self.contest_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    /// Run is offered unless a submission is being judged.
    pub fn can_run(&self) -> bool {
        !self.judging.is_active()
    }

    /// Submit is offered only when nothing else is in flight.
    pub fn can_submit(&self) -> bool {
        !self.execution.is_running() && !self.judging.is_active()
    }

    /// Run the code buffer. A run already in progress is discarded.
    pub fn run(&mut self) -> Result<ChannelId> {
        if !self.can_run() {
            return Err(ClientError::Busy("a submission is being judged"));
        }
        self.execution.run(RunRequest::new(
            self.problem_id,
            self.language,
            self.code.clone(),
        ))
    }

    /// Submit the code buffer for judging.
    pub fn submit(&mut self) -> Result<()> {
        if self.execution.is_running() {
            return Err(ClientError::Busy("code is running"));
        }
        self.judging.submit(CreateSubmission {
            problem_id: self.problem_id,
            contest_id: self.contest_id,
            language: self.language,
            code: self.code.clone(),
        })
    }

    pub fn send_stdin(&mut self, text: &str) -> Result<()> {
        self.execution.send_stdin(text)
    }

    pub fn kill(&mut self) -> bool {
        self.execution.kill()
    }

    /// Apply one event from the stream.
    pub fn handle(&mut self, event: WorkspaceEvent) {
        match event {
            WorkspaceEvent::Execution { channel, event } => self.execution.handle(channel, event),
            WorkspaceEvent::ExecutionStalled {
                channel,
                generation,
            } => self.execution.on_stalled(channel, generation),
            WorkspaceEvent::SubmissionCreated { ticket, result } => {
                self.judging.on_created(ticket, result)
            }
            WorkspaceEvent::Feed { ticket, event } => self.judging.on_feed_event(ticket, event),
            WorkspaceEvent::HideStatus { generation } => self.judging.on_hide(generation),
        }
    }

    /// Apply every event already queued. Returns how many were handled.
    pub fn pump(&mut self, events: &mut EventStream) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next event and apply it. `false` once the stream ended.
    pub async fn step(&mut self, events: &mut EventStream) -> bool {
        match events.recv().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    pub fn run_phase(&self) -> RunPhase {
        self.execution.phase()
    }

    pub fn judge_phase(&self) -> JudgePhase {
        self.judging.phase()
    }

    pub fn terminal(&self) -> &TerminalBuffer {
        self.execution.terminal()
    }

    pub fn exit_summary(&self) -> Option<ExitSummary> {
        self.execution.exit_summary()
    }

    pub fn judge_status(&self) -> JudgeStatus {
        self.judging.status()
    }

    pub fn execution(&self) -> &ExecutionController {
        &self.execution
    }

    pub fn judging(&self) -> &JudgingController {
        &self.judging
    }

    /// Release every channel, subscription and timer the workspace owns.
    pub fn shutdown(&mut self) {
        debug!(problem_id = %self.problem_id, "workspace shutdown");
        self.execution.shutdown();
        self.judging.shutdown();
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.shutdown();
    }
}
