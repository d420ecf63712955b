// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution channel vocabulary and the language catalog.
//!
//! Client to server: `INIT` (first frame, once the channel is ready),
//! `STDIN` (newline-terminated input), `KILL` (advisory termination).
//!
//! Server to client: `STDOUT`/`STDERR` chunks, then exactly one terminal
//! `COMPLETE` or `ERROR`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::submission::ProblemId;

/// Languages accepted by the execution and judging services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Java,
    Python,
    JavaScript,
    Go,
    Rust,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::Python,
        Language::JavaScript,
        Language::Go,
        Language::Rust,
    ];

    /// Identifier used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Java => "Java",
            Language::Python => "Python 3",
            Language::JavaScript => "JavaScript (Node.js)",
            Language::Go => "Go",
            Language::Rust => "Rust",
        }
    }

    /// Command line echoed at the top of the terminal when a run starts.
    pub fn run_command(self) -> &'static str {
        match self {
            Language::C => "gcc -O2 -o main main.c && ./main",
            Language::Cpp => "g++ -O2 -std=c++17 -o main main.cpp && ./main",
            Language::Java => "javac Main.java && java Main",
            Language::Python => "python3 main.py",
            Language::JavaScript => "node main.js",
            Language::Go => "go run main.go",
            Language::Rust => "rustc -O main.rs && ./main",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(Language::C),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "go" | "golang" => Ok(Language::Go),
            "rust" | "rs" => Ok(Language::Rust),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Empty payload, encoded as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Payload of the `INIT` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecInit {
    pub problem_id: ProblemId,
    pub language: Language,
    pub code: String,
}

/// Frames sent by the client on the execution channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecClientMessage {
    Init(ExecInit),
    Stdin(String),
    Kill(Empty),
}

impl ExecClientMessage {
    /// One line of interactive input; the trailing newline is added here.
    pub fn stdin_line(text: &str) -> Self {
        ExecClientMessage::Stdin(format!("{}\n", text))
    }

    pub fn kill() -> Self {
        ExecClientMessage::Kill(Empty {})
    }
}

/// Payload of the terminal `COMPLETE` frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecComplete {
    pub exit_code: i32,
    /// Wall time in milliseconds
    pub time: f64,
    /// Peak memory in kilobytes
    pub memory: f64,
}

/// Frames sent by the server on the execution channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecServerMessage {
    Stdout(String),
    Stderr(String),
    Complete(ExecComplete),
    Error(String),
}

impl ExecServerMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecServerMessage::Complete(_) | ExecServerMessage::Error(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Envelope;
    use serde_json::json;

    #[test]
    fn test_init_wire_shape() {
        let msg = ExecClientMessage::Init(ExecInit {
            problem_id: ProblemId(1000),
            language: Language::Python,
            code: "print('hi')".to_string(),
        });
        let env = Envelope::from_message(&msg).unwrap();
        assert_eq!(env.kind, "INIT");
        assert_eq!(
            env.data,
            json!({"problemId": 1000, "language": "python", "code": "print('hi')"})
        );
    }

    #[test]
    fn test_stdin_is_newline_terminated() {
        let env = Envelope::from_message(&ExecClientMessage::stdin_line("3 4")).unwrap();
        assert_eq!(env.kind, "STDIN");
        assert_eq!(env.data, json!("3 4\n"));
    }

    #[test]
    fn test_kill_carries_empty_object() {
        let env = Envelope::from_message(&ExecClientMessage::kill()).unwrap();
        assert_eq!(env.kind, "KILL");
        assert_eq!(env.data, json!({}));
    }

    #[test]
    fn test_server_frames_decode() {
        let out: ExecServerMessage = Envelope::new("STDOUT", json!("hi\n")).decode().unwrap();
        assert_eq!(out, ExecServerMessage::Stdout("hi\n".to_string()));
        assert!(!out.is_terminal());

        let done: ExecServerMessage = Envelope::new(
            "COMPLETE",
            json!({"exitCode": 0, "time": 12, "memory": 4}),
        )
        .decode()
        .unwrap();
        assert_eq!(
            done,
            ExecServerMessage::Complete(ExecComplete {
                exit_code: 0,
                time: 12.0,
                memory: 4.0
            })
        );
        assert!(done.is_terminal());
    }

    #[test]
    fn test_unknown_type_does_not_decode() {
        assert!(
            Envelope::new("PROGRESS", json!({}))
                .decode::<ExecServerMessage>()
                .is_none()
        );
        // wrong payload shape for a known type
        assert!(
            Envelope::new("STDOUT", json!({"text": "x"}))
                .decode::<ExecServerMessage>()
                .is_none()
        );
    }

    #[test]
    fn test_language_parse_aliases() {
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!("Python3".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("js".parse::<Language>().unwrap(), Language::JavaScript);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_wire_name_matches_serde() {
        for lang in Language::ALL {
            let value = serde_json::to_value(lang).unwrap();
            assert_eq!(value, json!(lang.wire_name()));
            assert_eq!(lang.wire_name().parse::<Language>().unwrap(), lang);
        }
    }
}
