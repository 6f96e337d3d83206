//! Demo template for a fresh database

use tracing::info;

use crate::db::WorkoutStore;
use crate::error::TemplateError;
use crate::model::ExerciseSpec;
use crate::session::Workouts;

pub const DEMO_WORKOUT: &str = "Dummy Workout";

fn demo_exercises() -> Vec<ExerciseSpec> {
    vec![
        ExerciseSpec {
            name: "Back Squats".to_string(),
            rest_seconds: 120,
            reps_per_set: vec![12, 10, 8, 6, 4, 1],
            weight_increments: vec![20.0, 10.0, 10.0, 10.0, 10.0],
        },
        ExerciseSpec {
            name: "Calf Raises".to_string(),
            rest_seconds: 90,
            reps_per_set: vec![12, 12, 12, 12],
            weight_increments: vec![10.0, 10.0, 10.0],
        },
    ]
}

/// Insert the demo template unless any template exists.
/// Returns the new template id, or `None` when nothing was seeded.
pub fn seed_demo<S: WorkoutStore>(workouts: &Workouts<'_, S>) -> Result<Option<i64>, TemplateError> {
    let store = workouts.repository().store();
    if !store.templates()?.is_empty() {
        info!("templates present, skipping seed");
        return Ok(None);
    }
    let template = workouts.create_template(DEMO_WORKOUT, demo_exercises())?;
    Ok(template.id)
}
