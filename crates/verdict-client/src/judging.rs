// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Judging controller.
//!
//! ```text
//! idle --submit--> submitting --created(id)--> judging --COMPLETED/ACCEPTED--> success
//!                       |                         |    --COMPLETED/other-----> failed
//!                       +--create failed--> failed +--feed lost------------> failed
//! ```
//!
//! The create call runs on a spawned task and reports back through
//! [`WorkspaceEvent::SubmissionCreated`]. Each submit bumps a ticket, so an
//! acknowledgement for a submission the controller no longer tracks is
//! ignored. Once judging, the controller subscribes to the submission bus
//! with a filter on its id; the subscription ends with the first terminal
//! outcome. A terminal outcome also schedules hiding of the status, and a
//! new submit cancels any hide still pending.
//!
//! Feed traffic that beats the acknowledgement is not lost: on subscribing,
//! the controller applies the bus's remembered UPDATE for its id, and a feed
//! that died earlier is reported to the new subscription straight away.
//! Feed events carry the ticket they were subscribed under, so one left in
//! the stream from an earlier submit is ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use verdict_protocol::{SubmissionEvent, SubmissionId, SubmissionStatus, Verdict};

use crate::api::{CreateSubmission, SubmissionApi};
use crate::bus::{BusEvent, DeliveryError, SubmissionBus, Subscription};
use crate::error::{ClientError, Result};
use crate::event::{EventSink, WorkspaceEvent};
use crate::state::{JudgePhase, Lifecycle};
use crate::timer::ScheduledEvent;

/// Shown when the create call fails without a message.
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit";
/// Shown when the submissions feed goes away mid-judging.
pub const CONNECTION_LOST_MESSAGE: &str = "Lost connection to the judge";

/// What the status bar shows.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeStatus {
    pub phase: JudgePhase,
    pub submission_id: Option<SubmissionId>,
    /// Running score; 0 until the first progress report
    pub score: f64,
    pub result: Option<Verdict>,
    pub message: Option<String>,
    /// Judge output such as compiler errors
    pub detail: Option<String>,
    pub visible: bool,
}

pub struct JudgingController {
    lifecycle: Lifecycle<JudgePhase>,
    api: Arc<dyn SubmissionApi>,
    bus: SubmissionBus,
    sink: EventSink,
    hide_delay: Duration,
    ticket: u64,
    submission_id: Option<SubmissionId>,
    score: f64,
    result: Option<Verdict>,
    message: Option<String>,
    detail: Option<String>,
    visible: bool,
    subscription: Option<Subscription>,
    create_task: Option<JoinHandle<()>>,
    hide_timer: Option<ScheduledEvent>,
    hide_generation: u64,
}

impl JudgingController {
    pub fn new(
        api: Arc<dyn SubmissionApi>,
        bus: SubmissionBus,
        sink: EventSink,
        hide_delay: Duration,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            api,
            bus,
            sink,
            hide_delay,
            ticket: 0,
            submission_id: None,
            score: 0.0,
            result: None,
            message: None,
            detail: None,
            visible: false,
            subscription: None,
            create_task: None,
            hide_timer: None,
            hide_generation: 0,
        }
    }

    pub fn phase(&self) -> JudgePhase {
        self.lifecycle.phase()
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn submission_id(&self) -> Option<SubmissionId> {
        self.submission_id
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn result(&self) -> Option<Verdict> {
        self.result
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_status_visible(&self) -> bool {
        self.visible
    }

    /// Ticket of the latest submit attempt.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Whether the controller is listening to the bus.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn status(&self) -> JudgeStatus {
        JudgeStatus {
            phase: self.phase(),
            submission_id: self.submission_id,
            score: self.score,
            result: self.result,
            message: self.message.clone(),
            detail: self.detail.clone(),
            visible: self.visible,
        }
    }

    /// Start judging `request`.
    pub fn submit(&mut self, request: CreateSubmission) -> Result<()> {
        if request.code.trim().is_empty() {
            return Err(ClientError::EmptyCode);
        }
        if self.is_active() {
            return Err(ClientError::Busy("a submission is already being judged"));
        }

        self.cancel_hide();
        self.subscription = None;
        self.lifecycle.advance(JudgePhase::Submitting);
        self.ticket += 1;
        self.submission_id = None;
        self.score = 0.0;
        self.result = None;
        self.message = None;
        self.detail = None;
        self.visible = true;

        info!(
            problem_id = %request.problem_id,
            contest_id = ?request.contest_id,
            language = %request.language,
            "submitting"
        );

        let api = self.api.clone();
        let sink = self.sink.clone();
        let ticket = self.ticket;
        self.create_task = Some(tokio::spawn(async move {
            let result = api
                .create_submission(&request)
                .await
                .map_err(|e| e.user_message());
            let _ = sink.send(WorkspaceEvent::SubmissionCreated { ticket, result });
        }));
        Ok(())
    }

    /// Outcome of the create call for submit `ticket`.
    pub fn on_created(&mut self, ticket: u64, result: std::result::Result<SubmissionId, String>) {
        if ticket != self.ticket || self.phase() != JudgePhase::Submitting {
            debug!(ticket, "ignoring stale create acknowledgement");
            return;
        }
        self.create_task = None;

        match result {
            Ok(id) => {
                self.lifecycle.advance(JudgePhase::Judging);
                self.submission_id = Some(id);
                self.score = 0.0;
                self.subscribe(id);
                info!(submission = %id, "judging");
                if let Some(record) = self.bus.latest(id) {
                    debug!(
                        submission = %id,
                        status = ?record.status,
                        "applying update seen before acknowledgement"
                    );
                    self.on_feed_event(
                        self.ticket,
                        BusEvent::Submission(SubmissionEvent::Update(record)),
                    );
                }
            }
            Err(message) => {
                warn!(error = %message, "create submission failed");
                let message = if message.trim().is_empty() {
                    SUBMIT_FAILED_MESSAGE.to_string()
                } else {
                    message
                };
                self.finish(JudgePhase::Failed, message);
            }
        }
    }

    /// A bus event forwarded by this controller's own filter.
    pub fn on_feed_event(&mut self, ticket: u64, event: BusEvent) {
        if ticket != self.ticket || self.phase() != JudgePhase::Judging {
            return;
        }

        match event {
            BusEvent::Submission(SubmissionEvent::Update(record)) => {
                if Some(record.id) != self.submission_id {
                    return;
                }
                match record.status {
                    SubmissionStatus::Pending => {}
                    SubmissionStatus::Judging => {
                        if let Some(score) = record.score {
                            self.score = score;
                        }
                    }
                    SubmissionStatus::Completed => {
                        let verdict = record.result.unwrap_or(Verdict::Unknown);
                        if let Some(score) = record.score {
                            self.score = score;
                        }
                        self.result = Some(verdict);
                        self.detail = record.message().map(str::to_string);
                        info!(
                            submission = %record.id,
                            verdict = verdict.as_str(),
                            score = self.score,
                            "verdict"
                        );
                        let phase = if verdict.is_accepted() {
                            JudgePhase::Success
                        } else {
                            JudgePhase::Failed
                        };
                        self.finish(phase, verdict.label().to_string());
                    }
                }
            }
            BusEvent::Submission(SubmissionEvent::New(_)) => {}
            BusEvent::ConnectionLost(reason) => {
                warn!(%reason, "submissions feed lost while judging");
                self.finish(JudgePhase::Failed, CONNECTION_LOST_MESSAGE.to_string());
            }
        }
    }

    /// The hide delay scheduled as `generation` elapsed.
    pub fn on_hide(&mut self, generation: u64) {
        if generation != self.hide_generation || self.hide_timer.is_none() {
            return;
        }
        self.hide_timer = None;
        if self.lifecycle.is_terminal() {
            self.visible = false;
        }
    }

    /// Stop listening and cancel everything pending.
    ///
    /// A submission still in flight is abandoned and the controller returns
    /// to idle; a finished outcome is kept.
    pub fn shutdown(&mut self) {
        self.subscription = None;
        self.cancel_hide();
        if let Some(task) = self.create_task.take() {
            task.abort();
        }
        if self.is_active() {
            debug!(phase = ?self.phase(), "abandoning submission");
            self.lifecycle.reset();
            self.visible = false;
        }
        // any acknowledgement or feed event still in flight is now stale
        self.ticket += 1;
    }

    fn subscribe(&mut self, id: SubmissionId) {
        let sink = self.sink.clone();
        let ticket = self.ticket;
        self.subscription = Some(self.bus.subscribe(move |event: &BusEvent| {
            let relevant = match event {
                BusEvent::Submission(submission) => submission.is_update() && submission.id() == id,
                BusEvent::ConnectionLost(_) => true,
            };
            if !relevant {
                return Ok(());
            }
            sink.send(WorkspaceEvent::Feed {
                ticket,
                event: event.clone(),
            })
                .map_err(|_| DeliveryError::Disconnected)
        }));
    }

    fn finish(&mut self, phase: JudgePhase, message: String) {
        self.lifecycle.advance(phase);
        self.message = Some(message);
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.schedule_hide();
    }

    fn schedule_hide(&mut self) {
        self.hide_generation += 1;
        self.hide_timer = Some(ScheduledEvent::after(
            self.hide_delay,
            self.sink.clone(),
            WorkspaceEvent::HideStatus {
                generation: self.hide_generation,
            },
        ));
    }

    fn cancel_hide(&mut self) {
        if let Some(timer) = self.hide_timer.take() {
            timer.cancel();
        }
        self.hide_generation += 1;
    }
}

impl Drop for JudgingController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
