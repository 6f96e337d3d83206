//! Workout sessions - the surface a front-end drives
//!
//! [`Workouts`] creates templates and opens sessions; [`ExerciseSession`]
//! runs one exercise: engine transitions, the rest timer between sets, and a
//! save after every mutation. A failed save never rolls the set back: the
//! in-memory state stays current and can be saved again with `retry_save`.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::db::WorkoutStore;
use crate::engine::{EngineState, Phase};
use crate::error::{LoggingError, StorageError, TemplateError};
use crate::model::{ExerciseSpec, ExerciseTemplate, WorkoutLog, WorkoutTemplate};
use crate::repository::LogRepository;
use crate::timer::{DEFAULT_TICK, RestTimer, TimerEvent};

/// Knobs shared by every session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Length of one rest countdown step
    pub rest_tick: Duration,
    /// First-set weight proposed when no start weight was captured yet
    pub default_weight: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rest_tick: DEFAULT_TICK,
            default_weight: 0.0,
        }
    }
}

pub struct Workouts<'s, S: WorkoutStore> {
    repo: LogRepository<'s, S>,
    settings: SessionSettings,
}

impl<'s, S: WorkoutStore> Workouts<'s, S> {
    pub fn new(store: &'s S, settings: SessionSettings) -> Self {
        Self {
            repo: LogRepository::new(store),
            settings,
        }
    }

    pub fn repository(&self) -> &LogRepository<'s, S> {
        &self.repo
    }

    pub fn create_template(
        &self,
        name: &str,
        specs: Vec<ExerciseSpec>,
    ) -> Result<WorkoutTemplate, TemplateError> {
        let mut template = WorkoutTemplate::new(name, Utc::now(), specs)?;
        template.id = Some(self.repo.store().insert_template(&template)?);
        info!(template_id = ?template.id, name = %template.name, exercises = template.exercises.len(), "template created");
        Ok(template)
    }

    /// Rename and replace the exercises of a stored template
    pub fn edit_template(
        &self,
        id: i64,
        name: &str,
        specs: Vec<ExerciseSpec>,
    ) -> Result<WorkoutTemplate, TemplateError> {
        let mut template = self
            .repo
            .store()
            .template(id)?
            .ok_or(StorageError::NotFound {
                entity: "workout template",
                id,
            })?;
        template.rename(name)?;
        template.set_exercises(specs)?;
        self.repo.store().save_template(&template)?;
        info!(template_id = id, "template edited");
        Ok(template)
    }

    /// Today's log for the template, created if needed
    pub fn begin_session(&self, template: &WorkoutTemplate) -> Result<WorkoutLog, StorageError> {
        self.repo.find_or_create_today_log(template, Utc::now())
    }

    /// Open (or reopen) an exercise of the session at its next unlogged set.
    ///
    /// `workout_log` is refreshed from the store. The returned session starts
    /// its rest timer on the tokio runtime, so it must be driven from inside one.
    pub fn open_exercise(
        &self,
        workout_log: &mut WorkoutLog,
        exercise: &ExerciseTemplate,
    ) -> Result<ExerciseSession<'s, S>, LoggingError> {
        let workout_log_id = workout_log.id.ok_or(StorageError::Unsaved("workout log"))?;
        let log = self.repo.find_or_create_exercise_log(workout_log, exercise)?;
        let state = EngineState::initialize(log, self.settings.default_weight)?;
        Ok(self.session(workout_log_id, state))
    }

    /// Reopen an exercise from the log's own snapshot, for when the template is gone.
    /// Same store refresh and runtime requirement as [`Workouts::open_exercise`].
    pub fn resume_exercise(
        &self,
        workout_log: &mut WorkoutLog,
        exercise_name: &str,
    ) -> Result<ExerciseSession<'s, S>, LoggingError> {
        let workout_log_id = self.repo.refresh(workout_log)?;
        let log = workout_log
            .exercise_log(exercise_name)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "exercise log",
                id: workout_log_id,
            })?;
        let state = EngineState::initialize(log, self.settings.default_weight)?;
        Ok(self.session(workout_log_id, state))
    }

    fn session(&self, workout_log_id: i64, state: EngineState) -> ExerciseSession<'s, S> {
        debug!(
            workout_log_id,
            exercise = %state.log.exercise_name,
            set = state.current_set_index,
            "exercise opened"
        );
        ExerciseSession {
            store: self.repo.store(),
            workout_log_id,
            state,
            timer: RestTimer::new(self.settings.rest_tick),
            rest_remaining: None,
            unsaved: false,
        }
    }
}

/// One exercise being logged
pub struct ExerciseSession<'s, S: WorkoutStore> {
    store: &'s S,
    workout_log_id: i64,
    state: EngineState,
    timer: RestTimer,
    rest_remaining: Option<u32>,
    unsaved: bool,
}

impl<'s, S: WorkoutStore> ExerciseSession<'s, S> {
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Seconds left in the current rest, once the first tick arrived
    pub fn rest_remaining(&self) -> Option<u32> {
        match self.state.phase {
            Phase::Resting { seconds } => Some(self.rest_remaining.unwrap_or(seconds)),
            _ => None,
        }
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Last save failed and the state has not been stored since
    pub fn has_unsaved(&self) -> bool {
        self.unsaved
    }

    pub fn set_weight(&mut self, weight: f64) -> &EngineState {
        self.state = self.state.with_proposed_weight(weight);
        &self.state
    }

    pub fn set_reps(&mut self, reps: u32) -> &EngineState {
        self.state = self.state.with_proposed_reps(reps);
        &self.state
    }

    /// Log the current set with the proposed reps and weight
    pub fn log_proposed(&mut self) -> Result<&EngineState, LoggingError> {
        self.log_set(self.state.proposed_reps, self.state.proposed_weight)
    }

    /// Log the current set, start the rest timer if sets remain, then save.
    ///
    /// On `LoggingError::Storage` the set *is* recorded in memory; only the
    /// save is outstanding.
    ///
    /// Panics outside a tokio runtime when a rest follows, since the rest
    /// timer is a spawned task.
    pub fn log_set(&mut self, performed_reps: u32, weight: f64) -> Result<&EngineState, LoggingError> {
        let next = self.state.log_set(performed_reps, weight, Utc::now())?;
        self.state = next;

        info!(
            exercise = %self.state.log.exercise_name,
            set = self.state.log.entries.len(),
            of = self.state.total_sets(),
            reps = performed_reps,
            weight,
            "set logged"
        );

        match self.state.phase {
            Phase::Resting { seconds } => {
                self.rest_remaining = None;
                self.timer.start(seconds);
            }
            Phase::Completed => {
                self.timer.stop();
                self.rest_remaining = None;
                info!(exercise = %self.state.log.exercise_name, "exercise completed");
            }
            Phase::AwaitingEntry => {}
        }

        self.persist()?;
        Ok(&self.state)
    }

    /// End the rest now
    pub fn skip_rest(&mut self) -> &EngineState {
        if !self.state.is_resting() {
            return &self.state;
        }
        self.timer.skip();
        while self.poll_timer().is_some() {}
        if self.state.is_resting() {
            self.finish_rest();
        }
        &self.state
    }

    /// Mark the exercise done with whatever has been logged so far
    pub fn end_early(&mut self) -> Result<&EngineState, LoggingError> {
        if self.state.is_complete() {
            return Ok(&self.state);
        }
        self.timer.stop();
        self.rest_remaining = None;
        self.state = self.state.end_early();
        info!(
            exercise = %self.state.log.exercise_name,
            logged = self.state.log.entries.len(),
            of = self.state.total_sets(),
            "exercise ended early"
        );
        self.persist()?;
        Ok(&self.state)
    }

    /// Save the current state again after a failed save
    pub fn retry_save(&mut self) -> Result<(), LoggingError> {
        self.persist()
    }

    /// Apply a pending timer event, if any, without waiting
    pub fn poll_timer(&mut self) -> Option<TimerEvent> {
        let event = self.timer.try_next()?;
        self.apply(event);
        Some(event)
    }

    /// Wait for the next timer event. `None` when not resting.
    pub async fn next_timer_event(&mut self) -> Option<TimerEvent> {
        if !self.state.is_resting() {
            return None;
        }
        let event = self.timer.next().await?;
        self.apply(event);
        Some(event)
    }

    /// Leave the exercise; the rest timer is stopped
    pub fn close(mut self) -> EngineState {
        self.timer.stop();
        self.state
    }

    fn apply(&mut self, event: TimerEvent) {
        if !self.state.is_resting() {
            return;
        }
        match event {
            TimerEvent::Tick { remaining } => self.rest_remaining = Some(remaining),
            TimerEvent::Elapsed => self.finish_rest(),
        }
    }

    fn finish_rest(&mut self) {
        self.state = self.state.finish_rest();
        self.rest_remaining = None;
        debug!(set = self.state.current_set_index, "rest over");
    }

    fn persist(&mut self) -> Result<(), LoggingError> {
        match self
            .store
            .save_exercise_log(self.workout_log_id, &self.state.log)
        {
            Ok(id) => {
                self.state.log.id = Some(id);
                self.unsaved = false;
                Ok(())
            }
            Err(err) => {
                error!(
                    error = %err,
                    exercise = %self.state.log.exercise_name,
                    "failed to save exercise log"
                );
                self.unsaved = true;
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::db::{Database, LogQuery};
    use crate::model::{ExerciseLog, WorkoutLog};

    /// Database that can be told to fail exercise-log saves
    struct FlakyStore {
        inner: Database,
        failing: Cell<bool>,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: Database::open_in_memory().unwrap(),
                failing: Cell::new(false),
            }
        }
    }

    impl WorkoutStore for FlakyStore {
        fn insert_template(&self, template: &WorkoutTemplate) -> Result<i64, StorageError> {
            self.inner.insert_template(template)
        }
        fn save_template(&self, template: &WorkoutTemplate) -> Result<(), StorageError> {
            self.inner.save_template(template)
        }
        fn template(&self, id: i64) -> Result<Option<WorkoutTemplate>, StorageError> {
            self.inner.template(id)
        }
        fn templates(&self) -> Result<Vec<WorkoutTemplate>, StorageError> {
            self.inner.templates()
        }
        fn delete_template(&self, id: i64) -> Result<(), StorageError> {
            self.inner.delete_template(id)
        }
        fn insert_log(&self, log: &WorkoutLog) -> Result<i64, StorageError> {
            self.inner.insert_log(log)
        }
        fn save_exercise_log(
            &self,
            workout_log_id: i64,
            log: &ExerciseLog,
        ) -> Result<i64, StorageError> {
            if self.failing.get() {
                return Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.save_exercise_log(workout_log_id, log)
        }
        fn log(&self, id: i64) -> Result<Option<WorkoutLog>, StorageError> {
            self.inner.log(id)
        }
        fn query_logs(&self, query: &LogQuery) -> Result<Vec<WorkoutLog>, StorageError> {
            self.inner.query_logs(query)
        }
        fn delete_log(&self, id: i64) -> Result<(), StorageError> {
            self.inner.delete_log(id)
        }
    }

    fn squats() -> ExerciseSpec {
        ExerciseSpec {
            name: "Back Squats".to_string(),
            rest_seconds: 120,
            reps_per_set: vec![12, 10, 8, 6, 4, 1],
            weight_increments: vec![20.0, 10.0, 10.0, 10.0, 10.0],
        }
    }

    fn calves() -> ExerciseSpec {
        ExerciseSpec {
            name: "Calf Raises".to_string(),
            rest_seconds: 90,
            reps_per_set: vec![12, 12],
            weight_increments: vec![10.0],
        }
    }

    fn stored_entries<S: WorkoutStore>(store: &S, log_id: i64, exercise: &str) -> usize {
        store
            .log(log_id)
            .unwrap()
            .unwrap()
            .exercise_log(exercise)
            .map(|l| l.entries.len())
            .unwrap_or(0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_progression_through_session() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let log_id = log.id.unwrap();

        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        assert_eq!(session.state().target_reps, 12);

        assert!(matches!(
            session.log_set(12, 0.0),
            Err(LoggingError::StartWeightRequired)
        ));
        assert_eq!(stored_entries(&db, log_id, "Back Squats"), 0);

        let state = session.log_set(12, 60.0).unwrap();
        assert_eq!(state.proposed_weight, 80.0);
        assert_eq!(state.phase, Phase::Resting { seconds: 120 });
        assert!(session.is_timer_running());
        assert_eq!(session.rest_remaining(), Some(120));
        assert_eq!(stored_entries(&db, log_id, "Back Squats"), 1);

        assert!(matches!(
            session.log_set(10, 80.0),
            Err(LoggingError::RestInProgress)
        ));

        let state = session.skip_rest();
        assert_eq!(state.phase, Phase::AwaitingEntry);
        assert!(!session.is_timer_running());

        session.set_weight(85.0);
        let state = session.log_proposed().unwrap();
        assert_eq!(state.proposed_weight, 95.0);
        assert_eq!(stored_entries(&db, log_id, "Back Squats"), 2);
        session.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_elapses_on_its_own() {
        let db = Database::open_in_memory().unwrap();
        let settings = SessionSettings {
            rest_tick: Duration::from_millis(10),
            default_weight: 20.0,
        };
        let workouts = Workouts::new(&db, settings);
        let template = workouts.create_template("Calves", vec![calves()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        assert_eq!(session.state().proposed_weight, 20.0);

        session.log_proposed().unwrap();
        let mut ticks = 0;
        while let Some(event) = session.next_timer_event().await {
            match event {
                TimerEvent::Tick { remaining } => {
                    ticks += 1;
                    assert_eq!(session.rest_remaining(), Some(remaining));
                }
                TimerEvent::Elapsed => break,
            }
        }
        assert_eq!(ticks, 90);
        assert_eq!(session.state().phase, Phase::AwaitingEntry);
        assert_eq!(session.next_timer_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_set_completes_without_rest() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Calves", vec![calves()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();

        session.log_set(12, 40.0).unwrap();
        session.skip_rest();
        let state = session.log_set(12, 50.0).unwrap();
        assert!(state.is_complete());
        assert!(!session.is_timer_running());
        assert_eq!(session.rest_remaining(), None);

        let stored = db.log(log.id.unwrap()).unwrap().unwrap();
        assert!(stored.exercise_logs[0].is_completed);
        assert!(!stored.can_resume());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_early_keeps_logged_sets() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let log_id = log.id.unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();

        session.log_set(12, 60.0).unwrap();
        session.skip_rest();
        session.log_set(10, 80.0).unwrap();
        assert!(session.is_timer_running());

        let state = session.end_early().unwrap();
        assert!(state.is_complete());
        assert!(!session.is_timer_running());

        let stored = db.log(log_id).unwrap().unwrap();
        let exercise = &stored.exercise_logs[0];
        assert!(exercise.is_completed);
        assert_eq!(exercise.entries.len(), 2);

        let mut reloaded = db.log(log_id).unwrap().unwrap();
        assert!(matches!(
            workouts.open_exercise(&mut reloaded, &template.exercises[0]),
            Err(LoggingError::AlreadyComplete)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_same_day() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts
            .create_template("Leg Day", vec![squats(), calves()])
            .unwrap();

        let mut log = workouts.begin_session(&template).unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        session.log_set(12, 60.0).unwrap();
        session.close();

        let mut again = workouts.begin_session(&template).unwrap();
        assert_eq!(again.id, log.id);
        assert!(again.can_resume());

        let session = workouts
            .open_exercise(&mut again, &template.exercises[0])
            .unwrap();
        assert_eq!(session.state().current_set_index, 1);
        assert_eq!(session.state().proposed_weight, 80.0);
        assert_eq!(session.state().phase, Phase::AwaitingEntry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_from_same_workout_log() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let log_id = log.id.unwrap();

        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        session.log_set(12, 60.0).unwrap();
        session.skip_rest();
        session.close();

        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        assert_eq!(session.state().current_set_index, 1);
        assert_eq!(session.state().proposed_weight, 80.0);
        session.log_set(10, 80.0).unwrap();
        session.close();

        let stored = db.log(log_id).unwrap().unwrap();
        let weights: Vec<f64> = stored.exercise_logs[0]
            .entries
            .iter()
            .map(|e| e.weight)
            .collect();
        assert_eq!(weights, vec![60.0, 80.0]);
        assert_eq!(stored.exercise_logs[0].start_weight, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_session_write_is_surfaced() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();

        let mut first = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        let mut second = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();

        first.log_set(12, 60.0).unwrap();
        assert!(matches!(
            second.log_set(12, 70.0),
            Err(LoggingError::Storage(StorageError::Conflict { .. }))
        ));
        assert!(second.has_unsaved());

        let stored = db.log(log.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.exercise_logs[0].start_weight, 60.0);
        assert_eq!(stored.exercise_logs[0].entries[0].weight, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_template_deleted() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        session.log_set(12, 60.0).unwrap();
        session.close();

        workouts
            .repository()
            .delete_template(template.id.unwrap())
            .unwrap();
        let session = workouts.resume_exercise(&mut log, "Back Squats").unwrap();
        assert_eq!(session.state().current_set_index, 1);
        assert!(workouts.resume_exercise(&mut log, "Bench").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_surfaced_and_retryable() {
        let store = FlakyStore::new();
        let workouts = Workouts::new(&store, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let log_id = log.id.unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();

        store.failing.set(true);
        assert!(matches!(
            session.log_set(12, 60.0),
            Err(LoggingError::Storage(_))
        ));
        assert!(session.has_unsaved());
        assert_eq!(session.state().log.entries.len(), 1);
        assert!(session.state().is_resting());
        assert_eq!(stored_entries(&store, log_id, "Back Squats"), 0);

        assert!(session.retry_save().is_err());

        store.failing.set(false);
        session.retry_save().unwrap();
        assert!(!session.has_unsaved());
        assert_eq!(stored_entries(&store, log_id, "Back Squats"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_template_keeps_open_logs() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap()
            .close();

        let edited = workouts
            .edit_template(template.id.unwrap(), "Legs", vec![calves()])
            .unwrap();
        assert_eq!(edited.exercises[0].name, "Calf Raises");

        let stored = db.log(log.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.exercise_logs[0].exercise_name, "Back Squats");
        assert!(matches!(
            workouts.edit_template(999, "x", vec![calves()]),
            Err(TemplateError::Storage(StorageError::NotFound { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_exercises_cannot_be_saved() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        assert!(matches!(
            workouts.create_template("Leg Day", vec![calves(), calves()]),
            Err(TemplateError::DuplicateExercise { .. })
        ));
        assert!(matches!(
            workouts.create_template("Empty", vec![]),
            Err(TemplateError::NoExercises)
        ));
        assert!(db.templates().unwrap().is_empty());
    }

    #[test]
    #[should_panic]
    fn test_rest_timer_needs_runtime() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        let template = workouts.create_template("Leg Day", vec![squats()]).unwrap();
        let mut log = workouts.begin_session(&template).unwrap();
        let mut session = workouts
            .open_exercise(&mut log, &template.exercises[0])
            .unwrap();
        let _ = session.log_set(12, 60.0);
    }

    #[test]
    fn test_create_template_rejects_bad_input() {
        let db = Database::open_in_memory().unwrap();
        let workouts = Workouts::new(&db, SessionSettings::default());
        assert!(matches!(
            workouts.create_template("", vec![squats()]),
            Err(TemplateError::EmptyName)
        ));
        assert!(db.templates().unwrap().is_empty());
    }
}
