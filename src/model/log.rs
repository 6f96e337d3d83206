//! Session logs - what was actually performed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::template::{ExerciseTemplate, WorkoutTemplate};

/// One performed set. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub set_index: usize,
    pub target_reps: u32,
    pub performed_reps: u32,
    pub weight: f64,
    pub logged_at: DateTime<Utc>,
}

/// Progress of a single exercise inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseStatus {
    NotStarted,
    InProgress { done: usize, total: usize },
    Done,
}

/// Per-exercise record with a snapshot of the schedule taken when it was opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub id: Option<i64>,
    pub exercise_name: String,
    pub rest_seconds: u32,
    pub reps_per_set: Vec<u32>,
    pub weight_increments: Vec<f64>,
    /// 0 until the first set is logged
    pub start_weight: f64,
    pub is_completed: bool,
    pub entries: Vec<SetEntry>,
}

impl ExerciseLog {
    /// Snapshot the template's schedule so later template edits don't leak in
    pub fn from_template(template: &ExerciseTemplate) -> Self {
        Self {
            id: None,
            exercise_name: template.name.clone(),
            rest_seconds: template.rest_seconds,
            reps_per_set: template.reps_per_set.clone(),
            weight_increments: template.weight_increments.clone(),
            start_weight: 0.0,
            is_completed: false,
            entries: Vec::new(),
        }
    }

    pub fn total_sets(&self) -> usize {
        self.reps_per_set.len()
    }

    pub fn remaining_sets(&self) -> usize {
        self.total_sets().saturating_sub(self.entries.len())
    }

    /// Not completed and still has sets left
    pub fn is_resumable(&self) -> bool {
        !self.is_completed && self.entries.len() < self.total_sets()
    }

    pub fn status(&self) -> ExerciseStatus {
        if self.is_completed || self.entries.len() >= self.total_sets() {
            ExerciseStatus::Done
        } else if self.entries.is_empty() {
            ExerciseStatus::NotStarted
        } else {
            ExerciseStatus::InProgress {
                done: self.entries.len(),
                total: self.total_sets(),
            }
        }
    }
}

/// Overall progress of a session, for history listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutProgress {
    NotStarted,
    Partial { done: usize, total: usize },
    Completed,
}

/// One workout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: Option<i64>,
    pub date: DateTime<Utc>,
    pub workout_name: String,
    /// Weak back-reference; the template may since have been edited or deleted
    pub template_id: Option<i64>,
    pub exercise_logs: Vec<ExerciseLog>,
}

impl WorkoutLog {
    pub fn for_template(template: &WorkoutTemplate, date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            date,
            workout_name: template.name.clone(),
            template_id: template.id,
            exercise_logs: Vec::new(),
        }
    }

    pub fn exercise_log(&self, exercise_name: &str) -> Option<&ExerciseLog> {
        self.exercise_logs
            .iter()
            .find(|l| l.exercise_name == exercise_name)
    }

    /// Something left to do, or nothing started yet
    pub fn can_resume(&self) -> bool {
        self.exercise_logs.is_empty() || self.exercise_logs.iter().any(ExerciseLog::is_resumable)
    }

    pub fn progress(&self) -> WorkoutProgress {
        let total: usize = self.exercise_logs.iter().map(ExerciseLog::total_sets).sum();
        let done: usize = self.exercise_logs.iter().map(|l| l.entries.len()).sum();

        if total == 0 {
            WorkoutProgress::NotStarted
        } else if done >= total {
            WorkoutProgress::Completed
        } else {
            WorkoutProgress::Partial { done, total }
        }
    }
}
