//! Set progression engine - progressive-overload state machine
//!
//! Given an exercise log (with its schedule snapshot) the engine works out
//! which set comes next, how many reps it targets and what weight to suggest.
//! Suggested weight always chains from the last *logged* weight plus the
//! scheduled increment, not from the template baseline.
//!
//! States:
//! - `AwaitingEntry --log_set--> Resting` (sets remain) or `Completed` (last set)
//! - `Resting --finish_rest--> AwaitingEntry`
//! - `AwaitingEntry | Resting --end_early--> Completed`
//!
//! `Completed` is terminal. Every transition returns a fresh [`EngineState`];
//! nothing is mutated in place, so a UI or a test can drive it synchronously.

use chrono::{DateTime, Utc};

use crate::error::LoggingError;
use crate::model::{ExerciseLog, SetEntry};

/// Where the exercise stands
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    AwaitingEntry,
    /// Between sets; the rest timer should run for `seconds`
    Resting { seconds: u32 },
    Completed,
}

/// Snapshot of the engine for one exercise log
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub phase: Phase,
    pub current_set_index: usize,
    pub target_reps: u32,
    pub proposed_reps: u32,
    pub proposed_weight: f64,
    pub log: ExerciseLog,
}

impl EngineState {
    /// Resume an exercise log at its next unlogged set.
    ///
    /// `default_weight` is proposed for the first set when no start weight
    /// has been captured yet (0 forces the user to enter one).
    pub fn initialize(log: ExerciseLog, default_weight: f64) -> Result<Self, LoggingError> {
        let current_set_index = log.entries.len();
        if log.is_completed || current_set_index >= log.total_sets() {
            return Err(LoggingError::AlreadyComplete);
        }

        let mut state = Self {
            phase: Phase::AwaitingEntry,
            current_set_index,
            target_reps: 0,
            proposed_reps: 0,
            proposed_weight: default_weight.max(0.0),
            log,
        };
        state.prefill();
        Ok(state)
    }

    /// Record the current set and advance.
    pub fn log_set(
        &self,
        performed_reps: u32,
        weight: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, LoggingError> {
        match self.phase {
            Phase::Completed => return Err(LoggingError::AlreadyComplete),
            Phase::Resting { .. } => return Err(LoggingError::RestInProgress),
            Phase::AwaitingEntry => {}
        }
        if self.current_set_index == 0 && weight <= 0.0 {
            return Err(LoggingError::StartWeightRequired);
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(LoggingError::InvalidWeight(weight));
        }

        let mut next = self.clone();
        let log = &mut next.log;

        if next.current_set_index == 0 && log.start_weight <= 0.0 {
            log.start_weight = weight;
        }

        // Index comes from the entry count at the moment of append, nothing else
        let set_index = log.entries.len();
        log.entries.push(SetEntry {
            set_index,
            target_reps: self.target_reps,
            performed_reps,
            weight,
            logged_at: now,
        });

        if set_index + 1 >= log.total_sets() {
            log.is_completed = true;
            next.phase = Phase::Completed;
            return Ok(next);
        }

        next.current_set_index = set_index + 1;
        next.phase = Phase::Resting {
            seconds: next.log.rest_seconds,
        };
        next.prefill();
        Ok(next)
    }

    /// Rest elapsed or skipped
    pub fn finish_rest(&self) -> Self {
        let mut next = self.clone();
        if let Phase::Resting { .. } = self.phase {
            next.phase = Phase::AwaitingEntry;
        }
        next
    }

    /// Stop here; unlogged sets stay unlogged
    pub fn end_early(&self) -> Self {
        let mut next = self.clone();
        if self.phase != Phase::Completed {
            next.log.is_completed = true;
            next.phase = Phase::Completed;
        }
        next
    }

    /// Manual weight edit, clamped to be non-negative
    pub fn with_proposed_weight(&self, weight: f64) -> Self {
        let mut next = self.clone();
        if self.phase != Phase::Completed && weight.is_finite() {
            next.proposed_weight = weight.max(0.0);
        }
        next
    }

    /// Manual reps edit; reps are taken as given
    pub fn with_proposed_reps(&self, reps: u32) -> Self {
        let mut next = self.clone();
        if self.phase != Phase::Completed {
            next.proposed_reps = reps;
        }
        next
    }

    pub fn total_sets(&self) -> usize {
        self.log.total_sets()
    }

    pub fn is_last_set(&self) -> bool {
        self.current_set_index + 1 == self.total_sets()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn is_resting(&self) -> bool {
        matches!(self.phase, Phase::Resting { .. })
    }

    /// Whether the first set still needs an explicit start weight
    pub fn needs_start_weight(&self) -> bool {
        self.current_set_index == 0 && self.log.start_weight <= 0.0
    }

    /// Target reps and suggested weight for `current_set_index`
    fn prefill(&mut self) {
        let index = self.current_set_index;
        self.target_reps = self.log.reps_per_set.get(index).copied().unwrap_or(0);
        self.proposed_reps = self.target_reps;

        if index == 0 {
            if self.log.start_weight > 0.0 {
                self.proposed_weight = self.log.start_weight;
            }
            return;
        }

        let previous = self
            .log
            .entries
            .get(index - 1)
            .map(|e| e.weight)
            .unwrap_or(self.log.start_weight);
        let increment = self
            .log
            .weight_increments
            .get(index - 1)
            .copied()
            .unwrap_or(0.0);
        self.proposed_weight = (previous + increment).max(0.0);
    }
}
