//! ironlog - Personal strength workout tracker
//!
//! Progressive-overload set logging: templates define reps and weight jumps,
//! sessions record each set with a rest countdown in between.

pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod repository;
pub mod seed;
pub mod session;
pub mod timer;
pub mod tui;

pub use db::{Database, WorkoutStore};
pub use engine::{EngineState, Phase};
pub use error::{LoggingError, StorageError, TemplateError};
pub use session::{ExerciseSession, SessionSettings, Workouts};
