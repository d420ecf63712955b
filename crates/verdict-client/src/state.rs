// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle phases shared by the execution and judging state machines.
//!
//! Both controllers move through the same shape: an idle phase, one or two
//! active phases, and terminal outcomes from which a new attempt may start.
//! [`Lifecycle`] holds the current phase and enforces each label set's
//! transition table in one place.

use std::fmt;

use tracing::{debug, warn};

/// A set of phase labels with its transition table.
pub trait Phase: Copy + Eq + fmt::Debug + Default + 'static {
    /// Name used in logs.
    fn name(self) -> &'static str;

    /// An operation is in flight.
    fn is_active(self) -> bool;

    /// The attempt finished (successfully or not).
    fn is_terminal(self) -> bool;

    /// Whether `self -> next` is a legal transition.
    fn can_transition(self, next: Self) -> bool;
}

/// Execution run phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Errored,
    Killed,
}

impl Phase for RunPhase {
    fn name(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Completed => "completed",
            RunPhase::Errored => "errored",
            RunPhase::Killed => "killed",
        }
    }

    fn is_active(self) -> bool {
        self == RunPhase::Running
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::Errored | RunPhase::Killed
        )
    }

    fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (RunPhase::Running, RunPhase::Running) => false,
            (from, RunPhase::Running) => from == RunPhase::Idle || from.is_terminal(),
            (RunPhase::Running, to) => to.is_terminal(),
            _ => false,
        }
    }
}

/// Judging phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JudgePhase {
    #[default]
    Idle,
    Submitting,
    Judging,
    Success,
    Failed,
}

impl Phase for JudgePhase {
    fn name(self) -> &'static str {
        match self {
            JudgePhase::Idle => "idle",
            JudgePhase::Submitting => "submitting",
            JudgePhase::Judging => "judging",
            JudgePhase::Success => "success",
            JudgePhase::Failed => "failed",
        }
    }

    fn is_active(self) -> bool {
        matches!(self, JudgePhase::Submitting | JudgePhase::Judging)
    }

    fn is_terminal(self) -> bool {
        matches!(self, JudgePhase::Success | JudgePhase::Failed)
    }

    fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (from, JudgePhase::Submitting) => from == JudgePhase::Idle || from.is_terminal(),
            (JudgePhase::Submitting, JudgePhase::Judging | JudgePhase::Failed) => true,
            (JudgePhase::Judging, to) => to.is_terminal(),
            _ => false,
        }
    }
}

/// Current phase of one state machine.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle<P: Phase> {
    phase: P,
}

impl<P: Phase> Lifecycle<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> P {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Move to `next` if the transition table allows it.
    ///
    /// Returns `false` and leaves the phase untouched otherwise.
    pub fn advance(&mut self, next: P) -> bool {
        if !self.phase.can_transition(next) {
            warn!(from = self.phase.name(), to = next.name(), "rejected transition");
            return false;
        }
        debug!(from = self.phase.name(), to = next.name(), "transition");
        self.phase = next;
        true
    }

    /// Drop the current attempt and return to idle.
    pub fn reset(&mut self) {
        if self.phase != P::default() {
            debug!(from = self.phase.name(), "reset");
        }
        self.phase = P::default();
    }
}
