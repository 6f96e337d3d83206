//! ironlog - Personal strength workout tracker
//!
//! Templates describe the schedule, sessions record what was lifted.

use std::fmt::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::Level;

use ironlog::db::{Database, WorkoutStore};
use ironlog::model::{ExerciseSpec, ExerciseStatus, WorkoutLog, WorkoutProgress};
use ironlog::seed::seed_demo;
use ironlog::session::{SessionSettings, Workouts};
use ironlog::tui::App;

#[derive(Parser)]
#[command(name = "ironlog")]
#[command(author, version, about = "Strength workout tracker with progressive overload")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "IRONLOG_DB", default_value = "ironlog.db", global = true)]
    db: String,

    /// Length of one rest countdown step in milliseconds
    #[arg(long, env = "IRONLOG_REST_TICK_MS", default_value = "1000", global = true)]
    rest_tick_ms: u64,

    /// Weight proposed for a first set with no start weight yet
    #[arg(long, env = "IRONLOG_DEFAULT_WEIGHT", default_value = "0", global = true)]
    default_weight: f64,

    /// Log level written to stderr (error, warn, info, debug, trace)
    #[arg(long, env = "IRONLOG_LOG", default_value = "warn", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert the demo workout if there are no templates
    Seed,

    /// Create a workout template
    Create {
        /// Workout name (e.g., "Leg Day")
        name: String,

        /// Exercise as name:rest:reps,...[:increments,...]
        /// (e.g., "Back Squats:120:12,10,8,6,4,1:20,10,10,10,10")
        #[arg(short, long = "exercise", required = true)]
        exercises: Vec<ExerciseSpec>,
    },

    /// Rename a template and replace its exercises (past sessions keep their copy)
    Edit {
        id: i64,

        /// New workout name
        name: String,

        /// Exercise as name:rest:reps,...[:increments,...]
        #[arg(short, long = "exercise", required = true)]
        exercises: Vec<ExerciseSpec>,
    },

    /// List workout templates
    Templates,

    /// Delete a workout template (logs are kept)
    DeleteTemplate { id: i64 },

    /// Start today's session for a template, or pick up where it left off
    Start { template_id: i64 },

    /// Reopen an unfinished session
    Resume { log_id: i64 },

    /// List past sessions
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the sets of one session
    Show { log_id: i64 },

    /// Delete a session with all its sets
    DeleteLog { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();

    let db = Database::open(&cli.db).with_context(|| format!("opening {}", cli.db))?;
    let settings = SessionSettings {
        rest_tick: Duration::from_millis(cli.rest_tick_ms.max(1)),
        default_weight: cli.default_weight,
    };
    let workouts = Workouts::new(&db, settings);

    match cli.command {
        Some(Commands::Seed) => match seed_demo(&workouts)? {
            Some(id) => println!("Seeded demo workout (id: {})", id),
            None => println!("Templates already exist, nothing seeded"),
        },

        Some(Commands::Create { name, exercises }) => {
            let template = workouts.create_template(&name, exercises)?;
            println!(
                "Created: {} - {} exercises (id: {})",
                template.name,
                template.exercises.len(),
                template.id.unwrap_or_default()
            );
        }

        Some(Commands::Edit {
            id,
            name,
            exercises,
        }) => {
            let template = workouts.edit_template(id, &name, exercises)?;
            println!(
                "Updated: {} - {} exercises (id: {})",
                template.name,
                template.exercises.len(),
                id
            );
        }

        Some(Commands::Templates) | None => list_templates(&db)?,

        Some(Commands::DeleteTemplate { id }) => {
            workouts.repository().delete_template(id)?;
            println!("Deleted template {}", id);
        }

        Some(Commands::Start { template_id }) => {
            let Some(template) = db.template(template_id)? else {
                bail!("template {} not found", template_id);
            };
            let log = workouts.begin_session(&template)?;
            let mut app = App::new(workouts, Some(template), log);
            app.run()?;
        }

        Some(Commands::Resume { log_id }) => {
            let repo = workouts.repository();
            let Some(log) = repo.log(log_id)? else {
                bail!("session {} not found", log_id);
            };
            if !log.can_resume() {
                println!("Session {} is already complete", log_id);
                return Ok(());
            }
            let template = repo.template_for(&log)?;
            if template.is_none() && log.exercise_logs.is_empty() {
                bail!("template of session {} was deleted and nothing was logged", log_id);
            }
            let mut app = App::new(workouts, template, log);
            app.run()?;
        }

        Some(Commands::History { limit }) => {
            let logs = workouts.repository().history(limit)?;
            if logs.is_empty() {
                println!("No sessions yet. Start one with `ironlog start <template-id>`.");
                return Ok(());
            }
            println!("Recent sessions:");
            println!("{:-<60}", "");
            for log in logs {
                let progress = match log.progress() {
                    WorkoutProgress::NotStarted => "not started".to_string(),
                    WorkoutProgress::Partial { done, total } => format!("{done}/{total} sets"),
                    WorkoutProgress::Completed => "completed".to_string(),
                };
                println!(
                    "{:>4} | {} | {:20} | {:12} | {}",
                    log.id.unwrap_or_default(),
                    log.date
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M"),
                    log.workout_name,
                    progress,
                    if log.can_resume() { "resume" } else { "-" }
                );
            }
        }

        Some(Commands::Show { log_id }) => {
            let Some(log) = workouts.repository().log(log_id)? else {
                bail!("session {} not found", log_id);
            };
            print!("{}", describe_log(&log));
        }

        Some(Commands::DeleteLog { id }) => {
            workouts.repository().delete_log(id)?;
            println!("Deleted session {}", id);
        }
    }

    Ok(())
}

fn list_templates(db: &Database) -> Result<()> {
    let templates = db.templates()?;
    if templates.is_empty() {
        println!("No templates yet. Try `ironlog seed` or `ironlog create`.");
        return Ok(());
    }
    println!("Templates:");
    println!("{:-<60}", "");
    for template in templates {
        println!("{:>4} | {}", template.id.unwrap_or_default(), template.name);
        for exercise in template.ordered_exercises() {
            let reps: Vec<String> = exercise.reps_per_set.iter().map(u32::to_string).collect();
            println!(
                "       {:20} {}  rest {}s",
                exercise.name,
                reps.join("/"),
                exercise.rest_seconds
            );
        }
    }
    Ok(())
}

/// Per-exercise detail of one session, as printed by `show`
fn describe_log(log: &WorkoutLog) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} - {}",
        log.workout_name,
        log.date.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(out, "{:-<40}", "");
    if log.exercise_logs.is_empty() {
        let _ = writeln!(out, "No exercises opened yet");
    }
    for exercise in &log.exercise_logs {
        let status = match exercise.status() {
            ExerciseStatus::NotStarted => "not started".to_string(),
            ExerciseStatus::InProgress { done, total } => {
                format!("{done}/{total}, {} left", exercise.remaining_sets())
            }
            ExerciseStatus::Done => "done".to_string(),
        };
        let _ = writeln!(
            out,
            "{} ({}) - {} sets, rest {}s",
            exercise.exercise_name,
            status,
            exercise.total_sets(),
            exercise.rest_seconds
        );
        if exercise.entries.is_empty() {
            let _ = writeln!(out, "  No sets logged yet");
        }
        for entry in &exercise.entries {
            let _ = writeln!(
                out,
                "  set {}: {}/{} reps @ {:.1}  {}",
                entry.set_index + 1,
                entry.performed_reps,
                entry.target_reps,
                entry.weight,
                entry.logged_at.with_timezone(&chrono::Local).format("%H:%M:%S")
            );
        }
    }
    out
}
