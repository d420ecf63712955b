// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The one-shot "create submission" call.
//!
//! Judging starts with a request that either yields a submission id or
//! fails. Two implementations:
//!
//! - [`HttpSubmissionApi`]: `POST` to the problem or contest route.
//! - [`ChannelSubmissionApi`]: the judging channel. `INIT` is answered by
//!   `CREATED`, which resolves the call; the `PROGRESS`/`COMPLETE` frames
//!   that follow are drained and logged until the channel ends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use url::Url;
use verdict_protocol::{
    ChannelEvent, ContestId, DuplexChannel, Endpoint, EventHandler, JudgeClientMessage, JudgeInit,
    JudgeServerMessage, Language, ProblemId, SubmissionId, TokenProvider, Transport,
};

use crate::config::ClientConfig;
use crate::error::ApiError;

/// Everything the judge needs to create a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSubmission {
    pub problem_id: ProblemId,
    pub contest_id: Option<ContestId>,
    pub language: Language,
    pub code: String,
}

#[async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Create a submission and return its id.
    async fn create_submission(&self, request: &CreateSubmission) -> Result<SubmissionId, ApiError>;
}

#[derive(Serialize)]
struct CreateBody<'a> {
    language: Language,
    code: &'a str,
}

#[derive(Deserialize)]
struct CreatedBody {
    #[serde(alias = "submissionId")]
    id: SubmissionId,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// Create-submission over the HTTP API.
pub struct HttpSubmissionApi {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpSubmissionApi {
    pub fn new(
        base_url: Url,
        request_timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_url.clone(),
            config.request_timeout,
            config.token_provider(),
        )
    }

    /// `problems/{pid}/submissions`, or under `contests/{cid}/` in a contest.
    pub fn route(&self, request: &CreateSubmission) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            if let Some(contest_id) = request.contest_id {
                segments.push("contests").push(&contest_id.to_string());
            }
            segments
                .push("problems")
                .push(&request.problem_id.to_string())
                .push("submissions");
        }
        Ok(url)
    }
}

#[async_trait]
impl SubmissionApi for HttpSubmissionApi {
    #[instrument(skip(self, request), fields(problem_id = %request.problem_id))]
    async fn create_submission(&self, request: &CreateSubmission) -> Result<SubmissionId, ApiError> {
        let url = self.route(request)?;
        let mut builder = self.http.post(url).json(&CreateBody {
            language: request.language,
            code: &request.code,
        });
        if let Some(token) = self.tokens.token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            warn!(status = status.as_u16(), %message, "create submission rejected");
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let created: CreatedBody = response
            .json()
            .await
            .map_err(|e| ApiError::UnexpectedResponse(e.to_string()))?;
        info!(submission = %created.id, "submission created");
        Ok(created.id)
    }
}

/// Create-submission over the judging channel.
pub struct ChannelSubmissionApi {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
}

impl ChannelSubmissionApi {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { transport, tokens }
    }
}

#[async_trait]
impl SubmissionApi for ChannelSubmissionApi {
    #[instrument(skip(self, request), fields(problem_id = %request.problem_id))]
    async fn create_submission(&self, request: &CreateSubmission) -> Result<SubmissionId, ApiError> {
        let (tx, mut events) = mpsc::unbounded_channel();
        let handler: EventHandler = Arc::new(move |event: ChannelEvent| {
            let _ = tx.send(event);
        });
        let channel = self.transport.open(Endpoint::Judge, handler);

        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Ready => {
                    let init = JudgeClientMessage::Init(JudgeInit {
                        token: self.tokens.token().unwrap_or_default(),
                        problem_id: request.problem_id,
                        contest_id: request.contest_id,
                        language: request.language,
                        code: request.code.clone(),
                    });
                    channel.send_message(&init)?;
                }
                ChannelEvent::Message(envelope) => match envelope.decode::<JudgeServerMessage>() {
                    Some(JudgeServerMessage::Created(created)) => {
                        let id = created.submission_id;
                        info!(submission = %id, "submission created");
                        tokio::spawn(drain_judge_channel(id, channel, events));
                        return Ok(id);
                    }
                    Some(JudgeServerMessage::Error(message)) => {
                        channel.close();
                        return Err(ApiError::Rejected(message));
                    }
                    Some(other) if other.is_terminal() => {
                        channel.close();
                        return Err(ApiError::UnexpectedResponse(
                            "judge finished before acknowledging the submission".to_string(),
                        ));
                    }
                    Some(_) => debug!("judge progress before acknowledgement"),
                    None => debug!(kind = %envelope.kind, "ignoring frame outside judge vocabulary"),
                },
                ChannelEvent::Error(message) => {
                    channel.close();
                    return Err(ApiError::Transport(message));
                }
                ChannelEvent::Closed(_) => break,
            }
        }

        Err(ApiError::Transport(
            "judge channel closed before acknowledgement".to_string(),
        ))
    }
}

/// Log the rest of a judging channel and close it after the terminal frame.
async fn drain_judge_channel(
    id: SubmissionId,
    channel: Box<dyn DuplexChannel>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Message(envelope) => match envelope.decode::<JudgeServerMessage>() {
                Some(JudgeServerMessage::Progress(progress)) => debug!(
                    submission = %id,
                    testcase = progress.testcase_id,
                    result = %progress.result,
                    score = progress.score,
                    progress = progress.progress,
                    "judge progress"
                ),
                Some(JudgeServerMessage::Complete(complete)) => {
                    info!(
                        submission = %id,
                        verdict = %complete.result,
                        score = complete.score,
                        "judge finished"
                    );
                    break;
                }
                Some(JudgeServerMessage::Error(message)) => {
                    warn!(submission = %id, error = %message, "judge failed");
                    break;
                }
                _ => {}
            },
            ChannelEvent::Error(message) => {
                warn!(submission = %id, error = %message, "judge channel failed");
                break;
            }
            ChannelEvent::Closed(_) => break,
            ChannelEvent::Ready => {}
        }
    }
    channel.close();
}
