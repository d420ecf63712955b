// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for verdict-client tests.
//!
//! [`Harness`] wires a workspace to a [`MemoryTransport`], a scripted
//! [`FakeApi`] and a bus that tests publish to directly.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use verdict_client::{
    ApiError, BusEvent, CreateSubmission, EventStream, SubmissionApi, SubmissionBus, Workspace,
    WorkspaceConfig,
};
use verdict_protocol::{
    Endpoint, Language, MemoryPeer, MemoryTransport, ProblemId, SubmissionEvent, SubmissionId,
    SubmissionRecord, SubmissionStatus, Verdict,
};

/// `SubmissionApi` answering from a script, recording every request.
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<VecDeque<Result<SubmissionId, ApiError>>>,
    requests: Mutex<Vec<CreateSubmission>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, response: Result<SubmissionId, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<CreateSubmission> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionApi for FakeApi {
    async fn create_submission(&self, request: &CreateSubmission) -> Result<SubmissionId, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted response".to_string())))
    }
}

pub struct Harness {
    pub transport: MemoryTransport,
    pub api: Arc<FakeApi>,
    pub bus: SubmissionBus,
    pub workspace: Workspace,
    pub events: EventStream,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(WorkspaceConfig::new(ProblemId(1), Language::Python))
    }

    pub fn with_config(config: WorkspaceConfig) -> Self {
        let transport = MemoryTransport::new();
        let api = Arc::new(FakeApi::new());
        let bus = SubmissionBus::new();
        let (workspace, events) = Workspace::new(
            config,
            Arc::new(transport.clone()),
            api.clone(),
            bus.clone(),
        );
        Self {
            transport,
            api,
            bus,
            workspace,
            events,
        }
    }

    /// Apply queued events.
    pub fn pump(&mut self) -> usize {
        self.workspace.pump(&mut self.events)
    }

    /// Let spawned tasks run and apply whatever they post.
    pub async fn settle(&mut self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
            self.workspace.pump(&mut self.events);
        }
    }

    /// Server side of the newest execution channel.
    pub fn exec(&self) -> MemoryPeer {
        self.transport
            .last(Endpoint::Execution)
            .expect("an execution channel was opened")
    }

    /// Start a run of `code` and bring its channel up.
    pub fn start_run(&mut self, code: &str) -> MemoryPeer {
        self.workspace.set_code(code);
        self.workspace.run().unwrap();
        let peer = self.exec();
        peer.ready();
        self.pump();
        peer
    }

    /// Submit `code` and let the create call acknowledge with `id`.
    pub async fn start_judging(&mut self, code: &str, id: i64) {
        self.api.respond(Ok(SubmissionId(id)));
        self.workspace.set_code(code);
        self.workspace.submit().unwrap();
        self.settle().await;
    }

    /// Publish a feed event and apply what reaches the workspace.
    pub fn publish(&mut self, event: BusEvent) {
        self.bus.publish(&event);
        self.pump();
    }
}

pub fn update(id: i64, status: SubmissionStatus) -> SubmissionRecord {
    SubmissionRecord::new(SubmissionId(id), status)
}

pub fn judging(id: i64, score: f64) -> BusEvent {
    BusEvent::Submission(SubmissionEvent::Update(
        update(id, SubmissionStatus::Judging).with_score(score),
    ))
}

pub fn completed(id: i64, verdict: Verdict, score: f64) -> BusEvent {
    BusEvent::Submission(SubmissionEvent::Update(
        update(id, SubmissionStatus::Completed)
            .with_result(verdict)
            .with_score(score),
    ))
}
