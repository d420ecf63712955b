// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Judging channel vocabulary and verdicts.
//!
//! One channel per judge request: the client sends `INIT`, the server
//! acknowledges with `CREATED`, streams zero or more `PROGRESS` frames and
//! finishes with `COMPLETE` or `ERROR`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::execution::Language;
use crate::submission::{ContestId, ProblemId, SubmissionId};

/// Final judging outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CompileError,
    OutputLimitExceeded,
    PresentationError,
    SystemError,
    /// Any verdict this client does not know about
    Unknown,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accepted => "ACCEPTED",
            Verdict::WrongAnswer => "WRONG_ANSWER",
            Verdict::TimeLimitExceeded => "TIME_LIMIT_EXCEEDED",
            Verdict::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            Verdict::RuntimeError => "RUNTIME_ERROR",
            Verdict::CompileError => "COMPILE_ERROR",
            Verdict::OutputLimitExceeded => "OUTPUT_LIMIT_EXCEEDED",
            Verdict::PresentationError => "PRESENTATION_ERROR",
            Verdict::SystemError => "SYSTEM_ERROR",
            Verdict::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable label shown in status bars.
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::CompileError => "Compile Error",
            Verdict::OutputLimitExceeded => "Output Limit Exceeded",
            Verdict::PresentationError => "Presentation Error",
            Verdict::SystemError => "System Error",
            Verdict::Unknown => "Unknown",
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}

impl From<&str> for Verdict {
    fn from(value: &str) -> Self {
        match value {
            "ACCEPTED" => Verdict::Accepted,
            "WRONG_ANSWER" => Verdict::WrongAnswer,
            "TIME_LIMIT_EXCEEDED" => Verdict::TimeLimitExceeded,
            "MEMORY_LIMIT_EXCEEDED" => Verdict::MemoryLimitExceeded,
            "RUNTIME_ERROR" => Verdict::RuntimeError,
            "COMPILE_ERROR" => Verdict::CompileError,
            "OUTPUT_LIMIT_EXCEEDED" => Verdict::OutputLimitExceeded,
            "PRESENTATION_ERROR" => Verdict::PresentationError,
            "SYSTEM_ERROR" => Verdict::SystemError,
            _ => Verdict::Unknown,
        }
    }
}

impl From<String> for Verdict {
    fn from(value: String) -> Self {
        Verdict::from(value.as_str())
    }
}

impl From<Verdict> for &'static str {
    fn from(verdict: Verdict) -> Self {
        verdict.as_str()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payload of the judging `INIT` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeInit {
    pub token: String,
    pub problem_id: ProblemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<ContestId>,
    pub language: Language,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgeClientMessage {
    Init(JudgeInit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub submission_id: SubmissionId,
}

/// Per-testcase progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub testcase_id: i64,
    pub result: Verdict,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub score: f64,
    /// Fraction of testcases judged so far, 0..=100
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeComplete {
    pub result: Verdict,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JudgeServerMessage {
    Created(Created),
    Progress(Progress),
    Complete(JudgeComplete),
    Error(String),
}

impl JudgeServerMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JudgeServerMessage::Complete(_) | JudgeServerMessage::Error(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Envelope;
    use serde_json::json;

    #[test]
    fn test_verdict_wire_names() {
        let v: Verdict = serde_json::from_value(json!("WRONG_ANSWER")).unwrap();
        assert_eq!(v, Verdict::WrongAnswer);
        assert_eq!(serde_json::to_value(v).unwrap(), json!("WRONG_ANSWER"));
        assert_eq!(v.label(), "Wrong Answer");
    }

    #[test]
    fn test_unknown_verdict_is_tolerated() {
        let v: Verdict = serde_json::from_value(json!("PARTIALLY_CORRECT")).unwrap();
        assert_eq!(v, Verdict::Unknown);
        let none: Option<Verdict> = serde_json::from_value(json!(null)).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_init_omits_absent_contest() {
        let msg = JudgeClientMessage::Init(JudgeInit {
            token: "t".to_string(),
            problem_id: ProblemId(5),
            contest_id: None,
            language: Language::Cpp,
            code: "int main(){}".to_string(),
        });
        let env = Envelope::from_message(&msg).unwrap();
        assert_eq!(env.kind, "INIT");
        assert!(env.data.get("contestId").is_none());
        assert_eq!(env.data["problemId"], json!(5));
        assert_eq!(env.data["language"], json!("cpp"));
    }

    #[test]
    fn test_server_frames_decode() {
        let created: JudgeServerMessage =
            Envelope::new("CREATED", json!({"submissionId": 42}))
                .decode()
                .unwrap();
        assert_eq!(
            created,
            JudgeServerMessage::Created(Created {
                submission_id: SubmissionId(42)
            })
        );

        let progress: JudgeServerMessage = Envelope::new(
            "PROGRESS",
            json!({"testcaseId": 3, "result": "ACCEPTED", "time": 5, "memory": 1024, "score": 30, "progress": 60}),
        )
        .decode()
        .unwrap();
        assert!(!progress.is_terminal());

        let complete: JudgeServerMessage = Envelope::new(
            "COMPLETE",
            json!({"result": "COMPILE_ERROR", "score": 0, "time": 0, "memory": 0, "error": "syntax error"}),
        )
        .decode()
        .unwrap();
        assert!(complete.is_terminal());
        match complete {
            JudgeServerMessage::Complete(c) => {
                assert_eq!(c.result, Verdict::CompileError);
                assert_eq!(c.error.as_deref(), Some("syntax error"));
            }
            _ => panic!("Expected Complete"),
        }
    }
}
