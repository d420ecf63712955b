// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workspace orchestration tests: mutual exclusion, teardown, and the
//! judging channel end to end.

mod common;

use std::sync::Arc;

use common::{Harness, completed};
use verdict_client::{
    ApiError, ChannelSubmissionApi, ClientError, CreateSubmission, JudgePhase, RunPhase,
    SubmissionApi, SubmissionBus, Workspace, WorkspaceConfig,
};
use verdict_protocol::{
    ContestId, Created, Endpoint, JudgeClientMessage, JudgeComplete, JudgeInit,
    JudgeServerMessage, Language, MemoryPeer, MemoryTransport, ProblemId, Progress, StaticToken,
    SubmissionEvent, SubmissionId, SubmissionRecord, SubmissionStatus, Verdict,
};

async fn wait_for_peer(transport: &MemoryTransport, endpoint: Endpoint) -> MemoryPeer {
    for _ in 0..50 {
        if let Some(peer) = transport.last(endpoint) {
            return peer;
        }
        tokio::task::yield_now().await;
    }
    panic!("no {} channel was opened", endpoint);
}

async fn yields(n: usize) {
    for _ in 0..n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_submit_rejected_while_running() {
    let mut h = Harness::new();
    h.start_run("print(input())");

    assert!(!h.workspace.can_submit());
    assert!(matches!(h.workspace.submit(), Err(ClientError::Busy(_))));
    h.settle().await;
    assert!(h.api.requests().is_empty());
    assert_eq!(h.workspace.judge_phase(), JudgePhase::Idle);
}

#[tokio::test]
async fn test_run_rejected_while_judging() {
    let mut h = Harness::new();
    h.start_judging("print(42)", 42).await;

    assert!(!h.workspace.can_run());
    assert!(matches!(h.workspace.run(), Err(ClientError::Busy(_))));
    assert!(h.transport.peers_for(Endpoint::Execution).is_empty());

    h.publish(completed(42, Verdict::Accepted, 100.0));
    assert!(h.workspace.can_run());
    assert!(h.workspace.can_submit());
    h.workspace.run().unwrap();
    assert_eq!(h.workspace.run_phase(), RunPhase::Running);
}

#[tokio::test]
async fn test_run_rejected_while_submitting() {
    let mut h = Harness::new();
    h.api.respond(Ok(SubmissionId(1)));
    h.workspace.set_code("print(1)");
    h.workspace.submit().unwrap();

    assert_eq!(h.workspace.judge_phase(), JudgePhase::Submitting);
    assert!(matches!(h.workspace.run(), Err(ClientError::Busy(_))));
}

#[test]
fn test_code_buffer_and_language() {
    let mut h = Harness::with_config(
        WorkspaceConfig::new(ProblemId(4), Language::Python).with_contest(ContestId(2)),
    );
    h.workspace.set_code("fn main() {}");
    h.workspace.set_language(Language::Rust);

    assert_eq!(h.workspace.code(), "fn main() {}");
    assert_eq!(h.workspace.language(), Language::Rust);
    assert_eq!(h.workspace.contest_id(), Some(ContestId(2)));

    let peer = h.start_run("fn main() {}");
    let init = peer.sent()[0].decode::<verdict_protocol::ExecClientMessage>().unwrap();
    assert!(matches!(
        init,
        verdict_protocol::ExecClientMessage::Init(verdict_protocol::ExecInit {
            problem_id: ProblemId(4),
            language: Language::Rust,
            ..
        })
    ));
}

#[tokio::test]
async fn test_drop_releases_everything() {
    let transport = MemoryTransport::new();
    let bus = SubmissionBus::new();
    let api = Arc::new(common::FakeApi::new());
    api.respond(Ok(SubmissionId(42)));

    let (mut judge_ws, mut judge_events) = Workspace::new(
        WorkspaceConfig::new(ProblemId(1), Language::Python),
        Arc::new(transport.clone()),
        api,
        bus.clone(),
    );
    judge_ws.set_code("print(1)");
    judge_ws.submit().unwrap();
    yields(5).await;
    judge_ws.pump(&mut judge_events);
    assert_eq!(bus.subscriber_count(), 1);

    let (mut run_ws, _run_events) = Workspace::new(
        WorkspaceConfig::new(ProblemId(1), Language::Python),
        Arc::new(transport.clone()),
        Arc::new(common::FakeApi::new()),
        bus.clone(),
    );
    run_ws.set_code("print(1)");
    run_ws.run().unwrap();
    assert_eq!(transport.open_count(Endpoint::Execution), 1);

    drop(judge_ws);
    drop(run_ws);

    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(transport.open_count(Endpoint::Execution), 0);
}

#[tokio::test]
async fn test_two_workspaces_share_one_feed() {
    let transport = MemoryTransport::new();
    let bus = SubmissionBus::new();
    let _feed = bus.connect(&transport);
    let feed_peer = transport.last(Endpoint::Submissions).unwrap();
    feed_peer.ready();

    let mut workspaces = Vec::new();
    for id in [10, 20] {
        let api = Arc::new(common::FakeApi::new());
        api.respond(Ok(SubmissionId(id)));
        let (mut ws, events) = Workspace::new(
            WorkspaceConfig::new(ProblemId(id), Language::Go),
            Arc::new(transport.clone()),
            api,
            bus.clone(),
        );
        ws.set_code("package main");
        ws.submit().unwrap();
        workspaces.push((ws, events));
    }
    yields(10).await;
    for (ws, events) in workspaces.iter_mut() {
        ws.pump(events);
        assert_eq!(ws.judge_phase(), JudgePhase::Judging);
    }

    feed_peer
        .push(&SubmissionEvent::Update(
            SubmissionRecord::new(SubmissionId(20), SubmissionStatus::Completed)
                .with_result(Verdict::TimeLimitExceeded)
                .with_score(0.0),
        ))
        .unwrap();
    for (ws, events) in workspaces.iter_mut() {
        ws.pump(events);
    }

    assert_eq!(workspaces[0].0.judge_phase(), JudgePhase::Judging);
    assert_eq!(workspaces[1].0.judge_phase(), JudgePhase::Failed);
    assert_eq!(
        workspaces[1].0.judge_status().message.as_deref(),
        Some("Time Limit Exceeded")
    );

    feed_peer.fail("server restarting");
    for (ws, events) in workspaces.iter_mut() {
        ws.pump(events);
    }
    assert_eq!(workspaces[0].0.judge_phase(), JudgePhase::Failed);
    // already finished; the loss does not rewrite its outcome
    assert_eq!(
        workspaces[1].0.judge_status().message.as_deref(),
        Some("Time Limit Exceeded")
    );
}

fn judge_request() -> CreateSubmission {
    CreateSubmission {
        problem_id: ProblemId(7),
        contest_id: Some(ContestId(3)),
        language: Language::Cpp,
        code: "int main() {}".to_string(),
    }
}

#[tokio::test]
async fn test_judge_channel_resolves_on_created() {
    let transport = MemoryTransport::new();
    let api = ChannelSubmissionApi::new(
        Arc::new(transport.clone()),
        Arc::new(StaticToken::new("secret")),
    );
    let call = tokio::spawn(async move { api.create_submission(&judge_request()).await });

    let peer = wait_for_peer(&transport, Endpoint::Judge).await;
    peer.ready();
    yields(5).await;

    let init = peer.sent()[0].decode::<JudgeClientMessage>().unwrap();
    assert_eq!(
        init,
        JudgeClientMessage::Init(JudgeInit {
            token: "secret".to_string(),
            problem_id: ProblemId(7),
            contest_id: Some(ContestId(3)),
            language: Language::Cpp,
            code: "int main() {}".to_string(),
        })
    );

    peer.push(&JudgeServerMessage::Created(Created {
        submission_id: SubmissionId(42),
    }))
    .unwrap();
    assert_eq!(call.await.unwrap().unwrap(), SubmissionId(42));

    // progress is drained, the terminal frame closes the channel
    peer.push(&JudgeServerMessage::Progress(Progress {
        testcase_id: 1,
        result: Verdict::Accepted,
        time: 3.0,
        memory: 512.0,
        score: 50.0,
        progress: 50.0,
    }))
    .unwrap();
    yields(5).await;
    assert!(!peer.is_closed());

    peer.push(&JudgeServerMessage::Complete(JudgeComplete {
        result: Verdict::Accepted,
        score: 100.0,
        time: 6.0,
        memory: 512.0,
        error: None,
    }))
    .unwrap();
    yields(5).await;
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_judge_channel_error_rejects() {
    let transport = MemoryTransport::new();
    let api = ChannelSubmissionApi::new(
        Arc::new(transport.clone()),
        Arc::new(StaticToken::anonymous()),
    );
    let call = tokio::spawn(async move { api.create_submission(&judge_request()).await });

    let peer = wait_for_peer(&transport, Endpoint::Judge).await;
    peer.ready();
    peer.push(&JudgeServerMessage::Error("Contest is over".to_string()))
        .unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(&err, ApiError::Rejected(m) if m == "Contest is over"));
    assert_eq!(err.user_message(), "Contest is over");
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_judge_channel_close_before_ack() {
    let transport = MemoryTransport::new();
    let api = ChannelSubmissionApi::new(
        Arc::new(transport.clone()),
        Arc::new(StaticToken::anonymous()),
    );
    let call = tokio::spawn(async move { api.create_submission(&judge_request()).await });

    let peer = wait_for_peer(&transport, Endpoint::Judge).await;
    peer.fail("refused");

    assert!(matches!(
        call.await.unwrap(),
        Err(ApiError::Transport(m)) if m == "refused"
    ));
}
