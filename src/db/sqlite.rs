//! SQLite storage for templates and workout logs

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{LogQuery, SortOrder, WorkoutStore};
use crate::error::StorageError;
use crate::model::{ExerciseLog, ExerciseTemplate, SetEntry, WorkoutLog, WorkoutTemplate};

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Throwaway database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS workout_templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS exercise_templates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                template_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                rest_seconds INTEGER NOT NULL,
                reps_per_set TEXT NOT NULL,
                weight_increments TEXT NOT NULL,
                UNIQUE (template_id, position)
            );
            CREATE TABLE IF NOT EXISTS workout_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                workout_name TEXT NOT NULL,
                template_id INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_workout_logs_name_date
                ON workout_logs (workout_name, date);
            CREATE TABLE IF NOT EXISTS exercise_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_log_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                exercise_name TEXT NOT NULL,
                rest_seconds INTEGER NOT NULL,
                reps_per_set TEXT NOT NULL,
                weight_increments TEXT NOT NULL,
                start_weight REAL NOT NULL DEFAULT 0,
                is_completed INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_exercise_logs_workout
                ON exercise_logs (workout_log_id);
            CREATE TABLE IF NOT EXISTS set_entries (
                exercise_log_id INTEGER NOT NULL,
                set_index INTEGER NOT NULL,
                target_reps INTEGER NOT NULL,
                performed_reps INTEGER NOT NULL,
                weight REAL NOT NULL,
                logged_at TEXT NOT NULL,
                PRIMARY KEY (exercise_log_id, set_index)
            );",
        )?;
        Ok(())
    }

    fn load_exercises(&self, template_id: i64) -> Result<Vec<ExerciseTemplate>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, position, name, rest_seconds, reps_per_set, weight_increments
             FROM exercise_templates WHERE template_id = ?1 ORDER BY position",
        )?;
        let exercises = stmt
            .query_map([template_id], |row| {
                Ok(ExerciseTemplate {
                    id: Some(row.get(0)?),
                    order: row.get(1)?,
                    name: row.get(2)?,
                    rest_seconds: row.get(3)?,
                    reps_per_set: parse_json(row, 4)?,
                    weight_increments: parse_json(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    fn load_exercise_logs(&self, workout_log_id: i64) -> Result<Vec<ExerciseLog>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, exercise_name, rest_seconds, reps_per_set, weight_increments,
                    start_weight, is_completed
             FROM exercise_logs WHERE workout_log_id = ?1 ORDER BY position",
        )?;
        let mut logs = stmt
            .query_map([workout_log_id], |row| {
                Ok(ExerciseLog {
                    id: Some(row.get(0)?),
                    exercise_name: row.get(1)?,
                    rest_seconds: row.get(2)?,
                    reps_per_set: parse_json(row, 3)?,
                    weight_increments: parse_json(row, 4)?,
                    start_weight: row.get(5)?,
                    is_completed: row.get(6)?,
                    entries: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for log in &mut logs {
            if let Some(id) = log.id {
                log.entries = self.load_entries(id)?;
            }
        }
        Ok(logs)
    }

    fn load_entries(&self, exercise_log_id: i64) -> Result<Vec<SetEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT set_index, target_reps, performed_reps, weight, logged_at
             FROM set_entries WHERE exercise_log_id = ?1 ORDER BY set_index",
        )?;
        let entries = stmt
            .query_map([exercise_log_id], |row| {
                let set_index: i64 = row.get(0)?;
                Ok(SetEntry {
                    set_index: set_index as usize,
                    target_reps: row.get(1)?,
                    performed_reps: row.get(2)?,
                    weight: row.get(3)?,
                    logged_at: parse_timestamp(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

impl WorkoutStore for Database {
    fn insert_template(&self, template: &WorkoutTemplate) -> Result<i64, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO workout_templates (name, created_at) VALUES (?1, ?2)",
            params![template.name, timestamp(template.created_at)],
        )?;
        let id = tx.last_insert_rowid();
        insert_exercises(&tx, id, &template.exercises)?;
        tx.commit()?;

        debug!(id, name = %template.name, "template inserted");
        Ok(id)
    }

    fn save_template(&self, template: &WorkoutTemplate) -> Result<(), StorageError> {
        let id = template.id.ok_or(StorageError::Unsaved("workout template"))?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE workout_templates SET name = ?1 WHERE id = ?2",
            params![template.name, id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                entity: "workout template",
                id,
            });
        }
        tx.execute("DELETE FROM exercise_templates WHERE template_id = ?1", [id])?;
        insert_exercises(&tx, id, &template.exercises)?;
        tx.commit()?;
        Ok(())
    }

    fn template(&self, id: i64) -> Result<Option<WorkoutTemplate>, StorageError> {
        let template = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM workout_templates WHERE id = ?1",
                [id],
                template_from_row,
            )
            .optional()?;

        match template {
            Some(mut template) => {
                template.exercises = self.load_exercises(id)?;
                Ok(Some(template))
            }
            None => Ok(None),
        }
    }

    fn templates(&self) -> Result<Vec<WorkoutTemplate>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at FROM workout_templates ORDER BY created_at DESC, id DESC",
        )?;
        let mut templates = stmt
            .query_map([], template_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for template in &mut templates {
            if let Some(id) = template.id {
                template.exercises = self.load_exercises(id)?;
            }
        }
        Ok(templates)
    }

    fn delete_template(&self, id: i64) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM exercise_templates WHERE template_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM workout_templates WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StorageError::NotFound {
                entity: "workout template",
                id,
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_log(&self, log: &WorkoutLog) -> Result<i64, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO workout_logs (date, workout_name, template_id) VALUES (?1, ?2, ?3)",
            params![timestamp(log.date), log.workout_name, log.template_id],
        )?;
        let id = tx.last_insert_rowid();
        for (position, exercise) in log.exercise_logs.iter().enumerate() {
            let exercise_id = insert_exercise_log(&tx, id, position, exercise)?;
            append_entries(&tx, exercise_id, &exercise.entries)?;
        }
        tx.commit()?;
        Ok(id)
    }

    fn save_exercise_log(
        &self,
        workout_log_id: i64,
        log: &ExerciseLog,
    ) -> Result<i64, StorageError> {
        let tx = self.conn.unchecked_transaction()?;

        let id = match log.id {
            Some(id) => {
                let stored_weight: Option<f64> = tx
                    .query_row(
                        "SELECT start_weight FROM exercise_logs WHERE id = ?1 AND workout_log_id = ?2",
                        params![id, workout_log_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                match stored_weight {
                    None => {
                        return Err(StorageError::NotFound {
                            entity: "exercise log",
                            id,
                        });
                    }
                    // start weight is captured once
                    Some(w) if w > 0.0 && w != log.start_weight => {
                        return Err(StorageError::Conflict {
                            reason: format!(
                                "exercise log {id} has start weight {w}, refusing {}",
                                log.start_weight
                            ),
                        });
                    }
                    Some(_) => {}
                }
                let changed = tx.execute(
                    "UPDATE exercise_logs SET start_weight = ?1, is_completed = ?2
                     WHERE id = ?3 AND workout_log_id = ?4",
                    params![log.start_weight, log.is_completed, id, workout_log_id],
                )?;
                if changed == 0 {
                    return Err(StorageError::NotFound {
                        entity: "exercise log",
                        id,
                    });
                }
                id
            }
            None => {
                let position: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM exercise_logs WHERE workout_log_id = ?1",
                    [workout_log_id],
                    |row| row.get(0),
                )?;
                let exists = tx
                    .query_row(
                        "SELECT 1 FROM workout_logs WHERE id = ?1",
                        [workout_log_id],
                        |_| Ok(()),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Err(StorageError::NotFound {
                        entity: "workout log",
                        id: workout_log_id,
                    });
                }
                insert_exercise_log(&tx, workout_log_id, position as usize, log)?
            }
        };

        append_entries(&tx, id, &log.entries)?;
        tx.commit()?;
        Ok(id)
    }

    fn log(&self, id: i64) -> Result<Option<WorkoutLog>, StorageError> {
        let log = self
            .conn
            .query_row(
                "SELECT id, date, workout_name, template_id FROM workout_logs WHERE id = ?1",
                [id],
                workout_log_from_row,
            )
            .optional()?;

        match log {
            Some(mut log) => {
                log.exercise_logs = self.load_exercise_logs(id)?;
                Ok(Some(log))
            }
            None => Ok(None),
        }
    }

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<WorkoutLog>, StorageError> {
        let mut sql =
            String::from("SELECT id, date, workout_name, template_id FROM workout_logs WHERE 1 = 1");
        let mut args: Vec<Value> = Vec::new();

        if let Some(name) = &query.workout_name {
            args.push(Value::Text(name.clone()));
            sql.push_str(&format!(" AND workout_name = ?{}", args.len()));
        }
        if let Some(since) = query.since {
            args.push(Value::Text(timestamp(since)));
            sql.push_str(&format!(" AND date >= ?{}", args.len()));
        }
        sql.push_str(match query.order {
            SortOrder::NewestFirst => " ORDER BY date DESC, id DESC",
            SortOrder::OldestFirst => " ORDER BY date ASC, id ASC",
        });
        if let Some(limit) = query.limit {
            args.push(Value::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", args.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut logs = stmt
            .query_map(params_from_iter(args.iter()), workout_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for log in &mut logs {
            if let Some(id) = log.id {
                log.exercise_logs = self.load_exercise_logs(id)?;
            }
        }
        Ok(logs)
    }

    fn delete_log(&self, id: i64) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM set_entries WHERE exercise_log_id IN
                (SELECT id FROM exercise_logs WHERE workout_log_id = ?1)",
            [id],
        )?;
        tx.execute("DELETE FROM exercise_logs WHERE workout_log_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM workout_logs WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StorageError::NotFound {
                entity: "workout log",
                id,
            });
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_exercises(
    conn: &Connection,
    template_id: i64,
    exercises: &[ExerciseTemplate],
) -> Result<(), StorageError> {
    let mut stmt = conn.prepare(
        "INSERT INTO exercise_templates
            (template_id, position, name, rest_seconds, reps_per_set, weight_increments)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for exercise in exercises {
        stmt.execute(params![
            template_id,
            exercise.order,
            exercise.name,
            exercise.rest_seconds,
            to_json(&exercise.reps_per_set)?,
            to_json(&exercise.weight_increments)?,
        ])?;
    }
    Ok(())
}

fn insert_exercise_log(
    conn: &Connection,
    workout_log_id: i64,
    position: usize,
    log: &ExerciseLog,
) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO exercise_logs
            (workout_log_id, position, exercise_name, rest_seconds, reps_per_set,
             weight_increments, start_weight, is_completed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            workout_log_id,
            position as i64,
            log.exercise_name,
            log.rest_seconds,
            to_json(&log.reps_per_set)?,
            to_json(&log.weight_increments)?,
            log.start_weight,
            log.is_completed,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Append-only: a set index already stored must come back unchanged
fn append_entries(
    conn: &Connection,
    exercise_log_id: i64,
    entries: &[SetEntry],
) -> Result<(), StorageError> {
    let mut existing = conn.prepare(
        "SELECT target_reps, performed_reps, weight, logged_at FROM set_entries
         WHERE exercise_log_id = ?1 AND set_index = ?2",
    )?;
    let mut insert = conn.prepare(
        "INSERT INTO set_entries
            (exercise_log_id, set_index, target_reps, performed_reps, weight, logged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for entry in entries {
        let logged_at = timestamp(entry.logged_at);
        let stored = existing
            .query_row(params![exercise_log_id, entry.set_index as i64], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;

        match stored {
            Some((target, performed, weight, at))
                if target == entry.target_reps
                    && performed == entry.performed_reps
                    && weight == entry.weight
                    && at == logged_at => {}
            Some(_) => {
                return Err(StorageError::Conflict {
                    reason: format!(
                        "set {} of exercise log {exercise_log_id} is already stored with different values",
                        entry.set_index + 1
                    ),
                });
            }
            None => {
                insert.execute(params![
                    exercise_log_id,
                    entry.set_index as i64,
                    entry.target_reps,
                    entry.performed_reps,
                    entry.weight,
                    logged_at,
                ])?;
            }
        }
    }
    Ok(())
}

fn template_from_row(row: &Row) -> rusqlite::Result<WorkoutTemplate> {
    Ok(WorkoutTemplate {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        created_at: parse_timestamp(row, 2)?,
        exercises: Vec::new(),
    })
}

fn workout_log_from_row(row: &Row) -> rusqlite::Result<WorkoutLog> {
    Ok(WorkoutLog {
        id: Some(row.get(0)?),
        date: parse_timestamp(row, 1)?,
        workout_name: row.get(2)?,
        template_id: row.get(3)?,
        exercise_logs: Vec::new(),
    })
}

/// Fixed-width UTC RFC 3339, so text comparison matches time order
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
        reason: format!("cannot encode schedule: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExerciseSpec;
    use chrono::Duration;

    fn spec(name: &str, reps: &[u32], increments: &[f64]) -> ExerciseSpec {
        ExerciseSpec {
            name: name.to_string(),
            rest_seconds: 90,
            reps_per_set: reps.to_vec(),
            weight_increments: increments.to_vec(),
        }
    }

    fn leg_day() -> WorkoutTemplate {
        WorkoutTemplate::new(
            "Leg Day",
            Utc::now(),
            vec![
                spec("Back Squats", &[12, 10, 8, 6, 4, 1], &[20.0, 10.0, 10.0, 10.0, 10.0]),
                spec("Calf Raises", &[12, 12, 12, 12], &[10.0, 10.0, 10.0]),
            ],
        )
        .unwrap()
    }

    fn entry(set_index: usize, weight: f64) -> SetEntry {
        SetEntry {
            set_index,
            target_reps: 10,
            performed_reps: 10,
            weight,
            logged_at: Utc::now(),
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    fn log_at(db: &Database, name: &str, date: DateTime<Utc>) -> i64 {
        db.insert_log(&WorkoutLog {
            id: None,
            date,
            workout_name: name.to_string(),
            template_id: None,
            exercise_logs: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_template_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let template = leg_day();
        let id = db.insert_template(&template).unwrap();

        let loaded = db.template(id).unwrap().unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.name, "Leg Day");
        assert_eq!(loaded.exercises.len(), 2);
        assert_eq!(loaded.exercises[0].reps_per_set, vec![12, 10, 8, 6, 4, 1]);
        assert_eq!(loaded.exercises[1].weight_increments, vec![10.0, 10.0, 10.0]);
        assert_eq!(loaded.exercises[1].order, 1);
        assert!(db.template(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_save_template_replaces_exercises() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_template(&leg_day()).unwrap();

        let mut template = db.template(id).unwrap().unwrap();
        template.rename("Legs").unwrap();
        template
            .set_exercises(vec![spec("Lunges", &[10, 10, 10], &[])])
            .unwrap();
        db.save_template(&template).unwrap();

        let loaded = db.template(id).unwrap().unwrap();
        assert_eq!(loaded.name, "Legs");
        assert_eq!(loaded.exercises.len(), 1);
        assert_eq!(loaded.exercises[0].weight_increments, vec![5.0, 5.0]);
        assert_eq!(count(&db, "exercise_templates"), 1);
    }

    #[test]
    fn test_save_unsaved_template_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.save_template(&leg_day()),
            Err(StorageError::Unsaved(_))
        ));
    }

    #[test]
    fn test_delete_template_cascades() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_template(&leg_day()).unwrap();
        db.insert_template(&leg_day()).unwrap();

        db.delete_template(id).unwrap();
        assert!(db.template(id).unwrap().is_none());
        assert_eq!(db.templates().unwrap().len(), 1);
        assert_eq!(count(&db, "exercise_templates"), 2);
        assert!(matches!(
            db.delete_template(id),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_exercise_log_is_append_only() {
        let db = Database::open_in_memory().unwrap();
        let template = leg_day();
        let log_id = log_at(&db, "Leg Day", Utc::now());

        let mut exercise = ExerciseLog::from_template(&template.exercises[0]);
        exercise.start_weight = 60.0;
        exercise.entries.push(entry(0, 60.0));
        let id = db.save_exercise_log(log_id, &exercise).unwrap();
        exercise.id = Some(id);

        exercise.entries.push(entry(1, 80.0));
        exercise.is_completed = true;
        assert_eq!(db.save_exercise_log(log_id, &exercise).unwrap(), id);

        let loaded = db.log(log_id).unwrap().unwrap();
        let stored = &loaded.exercise_logs[0];
        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.entries.len(), 2);
        assert_eq!(stored.entries[0].weight, 60.0);
        assert_eq!(stored.entries[1].set_index, 1);
        assert_eq!(stored.start_weight, 60.0);
        assert!(stored.is_completed);
        assert_eq!(stored.reps_per_set, vec![12, 10, 8, 6, 4, 1]);
    }

    #[test]
    fn test_rewritten_entry_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let template = leg_day();
        let log_id = log_at(&db, "Leg Day", Utc::now());

        let mut exercise = ExerciseLog::from_template(&template.exercises[0]);
        exercise.start_weight = 60.0;
        exercise.entries.push(entry(0, 60.0));
        exercise.id = Some(db.save_exercise_log(log_id, &exercise).unwrap());

        let mut rewritten = exercise.clone();
        rewritten.entries[0].weight = 999.0;
        rewritten.entries.push(entry(1, 80.0));
        assert!(matches!(
            db.save_exercise_log(log_id, &rewritten),
            Err(StorageError::Conflict { .. })
        ));

        // whole save rolled back
        let stored = &db.log(log_id).unwrap().unwrap().exercise_logs[0];
        assert_eq!(stored.entries.len(), 1);
        assert_eq!(stored.entries[0].weight, 60.0);
    }

    #[test]
    fn test_start_weight_is_not_overwritten() {
        let db = Database::open_in_memory().unwrap();
        let template = leg_day();
        let log_id = log_at(&db, "Leg Day", Utc::now());

        let mut exercise = ExerciseLog::from_template(&template.exercises[0]);
        exercise.id = Some(db.save_exercise_log(log_id, &exercise).unwrap());

        let mut stale = exercise.clone();
        exercise.start_weight = 60.0;
        exercise.entries.push(entry(0, 60.0));
        db.save_exercise_log(log_id, &exercise).unwrap();

        stale.start_weight = 70.0;
        stale.entries.push(entry(0, 70.0));
        let err = db.save_exercise_log(log_id, &stale).unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert!(!err.is_fatal());

        let stored = &db.log(log_id).unwrap().unwrap().exercise_logs[0];
        assert_eq!(stored.start_weight, 60.0);
        assert_eq!(stored.entries[0].weight, 60.0);
    }

    #[test]
    fn test_save_exercise_log_for_missing_workout() {
        let db = Database::open_in_memory().unwrap();
        let exercise = ExerciseLog::from_template(&leg_day().exercises[0]);
        assert!(matches!(
            db.save_exercise_log(42, &exercise),
            Err(StorageError::NotFound { entity: "workout log", .. })
        ));
    }

    #[test]
    fn test_exercise_logs_keep_open_order() {
        let db = Database::open_in_memory().unwrap();
        let template = leg_day();
        let log_id = log_at(&db, "Leg Day", Utc::now());
        db.save_exercise_log(log_id, &ExerciseLog::from_template(&template.exercises[1]))
            .unwrap();
        db.save_exercise_log(log_id, &ExerciseLog::from_template(&template.exercises[0]))
            .unwrap();

        let names: Vec<String> = db
            .log(log_id)
            .unwrap()
            .unwrap()
            .exercise_logs
            .into_iter()
            .map(|l| l.exercise_name)
            .collect();
        assert_eq!(names, vec!["Calf Raises", "Back Squats"]);
    }

    #[test]
    fn test_query_logs_filters_and_sorts() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let old = log_at(&db, "Leg Day", now - Duration::days(3));
        let recent = log_at(&db, "Leg Day", now - Duration::hours(1));
        let newest = log_at(&db, "Leg Day", now);
        log_at(&db, "Push Day", now);

        let all_legs = db.query_logs(&LogQuery::default().named("Leg Day")).unwrap();
        let ids: Vec<_> = all_legs.iter().map(|l| l.id.unwrap()).collect();
        assert_eq!(ids, vec![newest, recent, old]);

        let since = db
            .query_logs(
                &LogQuery::default()
                    .named("Leg Day")
                    .since(now - Duration::days(1))
                    .order(SortOrder::OldestFirst),
            )
            .unwrap();
        let ids: Vec<_> = since.iter().map(|l| l.id.unwrap()).collect();
        assert_eq!(ids, vec![recent, newest]);

        let limited = db.query_logs(&LogQuery::default().limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_delete_log_cascades() {
        let db = Database::open_in_memory().unwrap();
        let template = leg_day();
        let keep = log_at(&db, "Leg Day", Utc::now());
        let doomed = log_at(&db, "Leg Day", Utc::now());
        for log_id in [keep, doomed] {
            let mut exercise = ExerciseLog::from_template(&template.exercises[0]);
            exercise.entries = vec![entry(0, 60.0), entry(1, 80.0)];
            db.save_exercise_log(log_id, &exercise).unwrap();
        }

        db.delete_log(doomed).unwrap();
        assert!(db.log(doomed).unwrap().is_none());
        assert_eq!(count(&db, "exercise_logs"), 1);
        assert_eq!(count(&db, "set_entries"), 2);
        assert_eq!(db.log(keep).unwrap().unwrap().exercise_logs[0].entries.len(), 2);
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO workout_logs (date, workout_name) VALUES ('yesterday-ish', 'Leg Day')",
                [],
            )
            .unwrap();
        let err = db.query_logs(&LogQuery::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let base = Utc::now();
        let earlier = timestamp(base);
        let later = timestamp(base + Duration::milliseconds(1));
        assert!(earlier < later);
        assert_eq!(earlier.len(), later.len());
    }
}
