//! Database module - storage contract and its SQLite implementation

mod sqlite;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::model::{ExerciseLog, WorkoutLog, WorkoutTemplate};

pub use sqlite::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filter for workout logs
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub workout_name: Option<String>,
    /// Inclusive lower bound on `date`
    pub since: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl LogQuery {
    pub fn named(mut self, workout_name: &str) -> Self {
        self.workout_name = Some(workout_name.to_string());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What the core needs from persistent storage.
///
/// Deletes cascade down the ownership tree: a template takes its exercises
/// with it, a workout log takes its exercise logs and their set entries.
pub trait WorkoutStore {
    /// Insert a new template with its exercises, returning the template id
    fn insert_template(&self, template: &WorkoutTemplate) -> Result<i64, StorageError>;

    /// Persist an edited template, replacing its exercise rows
    fn save_template(&self, template: &WorkoutTemplate) -> Result<(), StorageError>;

    fn template(&self, id: i64) -> Result<Option<WorkoutTemplate>, StorageError>;

    /// All templates, newest first
    fn templates(&self) -> Result<Vec<WorkoutTemplate>, StorageError>;

    fn delete_template(&self, id: i64) -> Result<(), StorageError>;

    /// Insert a new workout log (and any exercise logs it already holds)
    fn insert_log(&self, log: &WorkoutLog) -> Result<i64, StorageError>;

    /// Insert or update one exercise log of a workout, returning its id.
    ///
    /// Snapshot fields are written once. Later saves only update
    /// `start_weight`/`is_completed` and append entries not stored yet.
    fn save_exercise_log(
        &self,
        workout_log_id: i64,
        log: &ExerciseLog,
    ) -> Result<i64, StorageError>;

    fn log(&self, id: i64) -> Result<Option<WorkoutLog>, StorageError>;

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<WorkoutLog>, StorageError>;

    fn delete_log(&self, id: i64) -> Result<(), StorageError>;
}
