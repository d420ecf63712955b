// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Submissions broadcast vocabulary and shared identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::judge::Verdict;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identity of a submission, assigned by the server on creation.
    SubmissionId
);
numeric_id!(
    /// Identity of a problem.
    ProblemId
);
numeric_id!(
    /// Identity of a contest.
    ContestId
);

/// Server-side judging status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    Judging,
    Completed,
}

/// A submission as broadcast on the submissions feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub status: SubmissionStatus,
    /// Verdict, `None` until judging completes
    #[serde(default)]
    pub result: Option<Verdict>,
    /// Score in 0..=100, `None` until the first progress report
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Fields this client does not interpret (user, problem, language, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubmissionRecord {
    pub fn new(id: SubmissionId, status: SubmissionStatus) -> Self {
        Self {
            id,
            status,
            result: None,
            score: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_result(mut self, result: Verdict) -> Self {
        self.result = Some(result);
        self
    }

    /// Free-form judge message (compiler output, error detail), if present.
    pub fn message(&self) -> Option<&str> {
        self.extra
            .get("message")
            .or_else(|| self.extra.get("error"))
            .and_then(Value::as_str)
    }
}

/// Frame on the submissions feed (server to client only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionEvent {
    New(SubmissionRecord),
    Update(SubmissionRecord),
}

impl SubmissionEvent {
    pub fn record(&self) -> &SubmissionRecord {
        match self {
            SubmissionEvent::New(record) | SubmissionEvent::Update(record) => record,
        }
    }

    pub fn id(&self) -> SubmissionId {
        self.record().id
    }

    pub fn is_update(&self) -> bool {
        matches!(self, SubmissionEvent::Update(_))
    }
}
