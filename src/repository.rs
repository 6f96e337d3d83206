//! Log repository - lookup, create and resume semantics for session logs

use chrono::{DateTime, Local, NaiveTime, Utc};
use tracing::info;

use crate::db::{LogQuery, WorkoutStore};
use crate::error::StorageError;
use crate::model::{ExerciseLog, ExerciseTemplate, WorkoutLog, WorkoutTemplate};

/// Start of the local calendar day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.with_timezone(&Local).date_naive().and_time(NaiveTime::MIN);
    match midnight.and_local_timezone(Local).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // midnight skipped by a DST jump
        None => midnight.and_utc(),
    }
}

pub struct LogRepository<'s, S: WorkoutStore> {
    store: &'s S,
}

impl<'s, S: WorkoutStore> LogRepository<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Reuse today's session for this template, or start a new one.
    ///
    /// Re-entering a workout the same day resumes instead of duplicating;
    /// the next day gets a fresh log.
    pub fn find_or_create_today_log(
        &self,
        template: &WorkoutTemplate,
        now: DateTime<Utc>,
    ) -> Result<WorkoutLog, StorageError> {
        let query = LogQuery::default()
            .named(&template.name)
            .since(start_of_day(now))
            .limit(1);

        if let Some(existing) = self.store.query_logs(&query)?.into_iter().next() {
            info!(log_id = ?existing.id, workout = %existing.workout_name, "resuming today's session");
            return Ok(existing);
        }

        let mut log = WorkoutLog::for_template(template, now);
        log.id = Some(self.store.insert_log(&log)?);
        info!(log_id = ?log.id, workout = %log.workout_name, "session created");
        Ok(log)
    }

    /// The exercise's log within `workout_log`, snapshotting the template on first open.
    ///
    /// `workout_log` is refreshed from the store first, so sets logged
    /// through an earlier session are never lost to a stale copy.
    pub fn find_or_create_exercise_log(
        &self,
        workout_log: &mut WorkoutLog,
        exercise: &ExerciseTemplate,
    ) -> Result<ExerciseLog, StorageError> {
        let workout_log_id = self.refresh(workout_log)?;
        if let Some(existing) = workout_log.exercise_log(&exercise.name) {
            return Ok(existing.clone());
        }

        let mut log = ExerciseLog::from_template(exercise);
        log.id = Some(self.store.save_exercise_log(workout_log_id, &log)?);
        info!(workout_log_id, exercise = %log.exercise_name, "exercise log created");

        workout_log.exercise_logs.push(log.clone());
        Ok(log)
    }

    /// Replace the exercise logs of `workout_log` with the stored ones
    pub fn refresh(&self, workout_log: &mut WorkoutLog) -> Result<i64, StorageError> {
        let id = workout_log.id.ok_or(StorageError::Unsaved("workout log"))?;
        let stored = self.store.log(id)?.ok_or(StorageError::NotFound {
            entity: "workout log",
            id,
        })?;
        workout_log.exercise_logs = stored.exercise_logs;
        Ok(id)
    }

    pub fn can_resume(log: &WorkoutLog) -> bool {
        log.can_resume()
    }

    /// Most recent sessions first
    pub fn history(&self, limit: usize) -> Result<Vec<WorkoutLog>, StorageError> {
        self.store.query_logs(&LogQuery::default().limit(limit))
    }

    /// Most recent sessions that still have work left
    pub fn resumable(&self, limit: usize) -> Result<Vec<WorkoutLog>, StorageError> {
        Ok(self
            .store
            .query_logs(&LogQuery::default())?
            .into_iter()
            .filter(WorkoutLog::can_resume)
            .take(limit)
            .collect())
    }

    pub fn log(&self, id: i64) -> Result<Option<WorkoutLog>, StorageError> {
        self.store.log(id)
    }

    /// The originating template, if it still exists
    pub fn template_for(&self, log: &WorkoutLog) -> Result<Option<WorkoutTemplate>, StorageError> {
        match log.template_id {
            Some(id) => self.store.template(id),
            None => Ok(None),
        }
    }

    /// Removes the log with its exercise logs and set entries
    pub fn delete_log(&self, id: i64) -> Result<(), StorageError> {
        self.store.delete_log(id)?;
        info!(log_id = id, "session deleted");
        Ok(())
    }

    /// Removes the template with its exercises; logs keep their snapshots
    pub fn delete_template(&self, id: i64) -> Result<(), StorageError> {
        self.store.delete_template(id)?;
        info!(template_id = id, "template deleted");
        Ok(())
    }
}
