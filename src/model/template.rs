//! Workout templates - reusable schedules, no performance data

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Increment used when a schedule is shorter than the number of set gaps
pub const DEFAULT_WEIGHT_INCREMENT: f64 = 5.0;

/// Input for one exercise of a new or edited template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSpec {
    pub name: String,
    pub rest_seconds: u32,
    pub reps_per_set: Vec<u32>,
    pub weight_increments: Vec<f64>,
}

impl FromStr for ExerciseSpec {
    type Err = TemplateError;

    /// Parse `name:rest:reps,reps,...[:inc,inc,...]`, e.g.
    /// `Back Squats:120:12,10,8,6,4,1:20,10,10,10,10`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if !(3..=4).contains(&parts.len()) {
            return Err(TemplateError::InvalidSpec(format!(
                "expected name:rest:reps[:increments], got '{s}'"
            )));
        }

        let rest_seconds = parts[1]
            .parse::<u32>()
            .map_err(|e| TemplateError::InvalidSpec(format!("rest '{}': {e}", parts[1])))?;

        let reps_per_set = parse_list::<u32>(parts[2], "reps")?;
        let weight_increments = match parts.get(3) {
            Some(list) => parse_list::<f64>(list, "increment")?,
            None => Vec::new(),
        };

        Ok(Self {
            name: parts[0].to_string(),
            rest_seconds,
            reps_per_set,
            weight_increments,
        })
    }
}

fn parse_list<T: FromStr>(list: &str, what: &str) -> Result<Vec<T>, TemplateError>
where
    T::Err: std::fmt::Display,
{
    list.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| TemplateError::InvalidSpec(format!("{what} '{v}': {e}")))
        })
        .collect()
}

/// One exercise inside a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTemplate {
    pub id: Option<i64>,
    pub name: String,
    pub rest_seconds: u32,
    /// e.g. [12, 10, 8, 6, 4, 1]
    pub reps_per_set: Vec<u32>,
    /// Applied between consecutive sets: 6 sets have 5 increments
    pub weight_increments: Vec<f64>,
    /// Position within the template
    pub order: u32,
}

impl ExerciseTemplate {
    pub fn new(spec: ExerciseSpec, order: u32) -> Result<Self, TemplateError> {
        let mut exercise = Self {
            id: None,
            name: String::new(),
            rest_seconds: 0,
            reps_per_set: Vec::new(),
            weight_increments: Vec::new(),
            order,
        };
        exercise.update(spec)?;
        Ok(exercise)
    }

    /// Replace the schedule, re-normalizing increments
    pub fn update(&mut self, spec: ExerciseSpec) -> Result<(), TemplateError> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if spec.reps_per_set.is_empty() {
            return Err(TemplateError::NoSets);
        }
        if let Some(set) = spec.reps_per_set.iter().position(|r| *r == 0) {
            return Err(TemplateError::ZeroReps { set });
        }
        if let Some(bad) = spec.weight_increments.iter().find(|i| !i.is_finite()) {
            return Err(TemplateError::InvalidSpec(format!("increment {bad}")));
        }

        self.name = name.to_string();
        self.rest_seconds = spec.rest_seconds;
        self.weight_increments =
            normalize_increments(spec.weight_increments, spec.reps_per_set.len());
        self.reps_per_set = spec.reps_per_set;
        Ok(())
    }

    pub fn set_count(&self) -> usize {
        self.reps_per_set.len()
    }
}

/// Number of increments a schedule of `sets` sets carries
pub fn increment_count(sets: usize) -> usize {
    sets.saturating_sub(1).max(1)
}

/// Pad with [`DEFAULT_WEIGHT_INCREMENT`] or truncate to `increment_count(sets)`
pub fn normalize_increments(mut increments: Vec<f64>, sets: usize) -> Vec<f64> {
    let wanted = increment_count(sets);
    increments.resize(wanted, DEFAULT_WEIGHT_INCREMENT);
    increments
}

/// Named, ordered sequence of exercises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Option<i64>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub exercises: Vec<ExerciseTemplate>,
}

impl WorkoutTemplate {
    pub fn new(
        name: &str,
        created_at: DateTime<Utc>,
        specs: Vec<ExerciseSpec>,
    ) -> Result<Self, TemplateError> {
        let mut template = Self {
            id: None,
            name: String::new(),
            created_at,
            exercises: Vec::new(),
        };
        template.rename(name)?;
        template.set_exercises(specs)?;
        Ok(template)
    }

    pub fn rename(&mut self, name: &str) -> Result<(), TemplateError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Replace all exercises; order follows the input sequence.
    /// Names must be unique, logs find their exercise by name.
    pub fn set_exercises(&mut self, specs: Vec<ExerciseSpec>) -> Result<(), TemplateError> {
        if specs.is_empty() {
            return Err(TemplateError::NoExercises);
        }
        let exercises = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| ExerciseTemplate::new(spec, i as u32))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, exercise) in exercises.iter().enumerate() {
            if exercises[..i].iter().any(|e| e.name == exercise.name) {
                return Err(TemplateError::DuplicateExercise {
                    name: exercise.name.clone(),
                });
            }
        }
        self.exercises = exercises;
        Ok(())
    }

    /// Exercises sorted by `order`
    pub fn ordered_exercises(&self) -> Vec<&ExerciseTemplate> {
        let mut exercises: Vec<_> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.order);
        exercises
    }

    pub fn exercise(&self, name: &str) -> Option<&ExerciseTemplate> {
        self.exercises.iter().find(|e| e.name == name)
    }
}
