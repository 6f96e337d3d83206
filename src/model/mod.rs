//! Data model - templates and session logs

pub mod log;
pub mod template;

pub use log::{ExerciseLog, ExerciseStatus, SetEntry, WorkoutLog, WorkoutProgress};
pub use template::{
    DEFAULT_WEIGHT_INCREMENT, ExerciseSpec, ExerciseTemplate, WorkoutTemplate, increment_count,
    normalize_increments,
};
