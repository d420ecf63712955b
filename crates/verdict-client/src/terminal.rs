// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terminal buffer backing the emulated interactive terminal.
//!
//! An append-only log of typed lines plus the exit summary of the run that
//! produced them. Pure state; it knows nothing about channels.

use std::fmt;

use verdict_protocol::ExecComplete;

/// What produced a terminal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Echo of the command that started the run
    Cmd,
    Stdout,
    Stderr,
    /// Local echo of interactive input
    Stdin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLine {
    pub kind: LineKind,
    pub text: String,
}

impl TerminalLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for TerminalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LineKind::Cmd => write!(f, "$ {}", self.text),
            _ => f.write_str(&self.text),
        }
    }
}

/// Exit summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSummary {
    pub exit_code: i32,
    /// Milliseconds
    pub time: f64,
    /// Kilobytes
    pub memory: f64,
}

impl From<ExecComplete> for ExitSummary {
    fn from(complete: ExecComplete) -> Self {
        Self {
            exit_code: complete.exit_code,
            time: complete.time,
            memory: complete.memory,
        }
    }
}

impl fmt::Display for ExitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exit code {} | {} ms | {} KB",
            self.exit_code, self.time, self.memory
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TerminalBuffer {
    lines: Vec<TerminalLine>,
    exit: Option<ExitSummary>,
}

impl TerminalBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: LineKind, text: impl Into<String>) {
        self.lines.push(TerminalLine::new(kind, text));
    }

    pub fn set_exit(&mut self, summary: ExitSummary) {
        self.exit = Some(summary);
    }

    /// Empty the buffer for a new run.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.exit = None;
    }

    pub fn lines(&self) -> &[TerminalLine] {
        &self.lines
    }

    /// Lines appended at or after `cursor`, for incremental rendering.
    ///
    /// A cursor past the end (e.g. from before a clear) yields everything.
    pub fn since(&self, cursor: usize) -> &[TerminalLine] {
        if cursor > self.lines.len() {
            &self.lines
        } else {
            &self.lines[cursor..]
        }
    }

    pub fn exit(&self) -> Option<ExitSummary> {
        self.exit
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Concatenated text of all lines, with the exit summary last.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let text = line.to_string();
            out.push_str(&text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
        }
        if let Some(exit) = self.exit {
            out.push_str(&format!("[{}]\n", exit));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_keep_append_order() {
        let mut buf = TerminalBuffer::new();
        buf.push(LineKind::Cmd, "python3 main.py");
        buf.push(LineKind::Stdout, "a");
        buf.push(LineKind::Stderr, "b");
        buf.push(LineKind::Stdin, "c");

        let kinds: Vec<_> = buf.lines().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Cmd,
                LineKind::Stdout,
                LineKind::Stderr,
                LineKind::Stdin
            ]
        );
    }

    #[test]
    fn test_clear_drops_lines_and_exit() {
        let mut buf = TerminalBuffer::new();
        buf.push(LineKind::Stdout, "x");
        buf.set_exit(ExitSummary {
            exit_code: 1,
            time: 3.0,
            memory: 10.0,
        });
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.exit().is_none());
    }

    #[test]
    fn test_since_cursor() {
        let mut buf = TerminalBuffer::new();
        buf.push(LineKind::Stdout, "1");
        buf.push(LineKind::Stdout, "2");
        assert_eq!(buf.since(1).len(), 1);
        assert_eq!(buf.since(2).len(), 0);
        assert_eq!(buf.since(10).len(), 2);
    }

    #[test]
    fn test_render() {
        let mut buf = TerminalBuffer::new();
        buf.push(LineKind::Cmd, "node main.js");
        buf.push(LineKind::Stdout, "hi\n");
        buf.set_exit(ExitSummary {
            exit_code: 0,
            time: 12.0,
            memory: 4.0,
        });
        assert_eq!(
            buf.render(),
            "$ node main.js\nhi\n[exit code 0 | 12 ms | 4 KB]\n"
        );
    }
}
