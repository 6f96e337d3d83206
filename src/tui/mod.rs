//! TUI module - exercise picker and set logging screen with ratatui

use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use std::io::{Stdout, stdout};
use tracing::warn;

use crate::db::WorkoutStore;
use crate::engine::Phase;
use crate::error::{LoggingError, StorageError};
use crate::model::{ExerciseStatus, ExerciseTemplate, WorkoutLog, WorkoutTemplate};
use crate::session::{ExerciseSession, Workouts};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Weight change per +/- key press
const WEIGHT_STEP: f64 = 2.5;

/// One line of the exercise picker
struct PickerRow {
    name: String,
    status: ExerciseStatus,
    /// Present while the template still exists
    template: Option<ExerciseTemplate>,
}

enum Screen<'s, S: WorkoutStore> {
    Picker,
    Logging {
        session: ExerciseSession<'s, S>,
        confirm_end: bool,
    },
}

/// App state for TUI
pub struct App<'s, S: WorkoutStore> {
    workouts: Workouts<'s, S>,
    template: Option<WorkoutTemplate>,
    log: WorkoutLog,
    rows: Vec<PickerRow>,
    selected: usize,
    screen: Screen<'s, S>,
    notice: Option<String>,
    should_quit: bool,
}

impl<'s, S: WorkoutStore> App<'s, S> {
    /// `template` is `None` when resuming a log whose template was deleted;
    /// exercises then come from the log's own snapshots.
    pub fn new(workouts: Workouts<'s, S>, template: Option<WorkoutTemplate>, log: WorkoutLog) -> Self {
        let mut app = Self {
            workouts,
            template,
            log,
            rows: Vec::new(),
            selected: 0,
            screen: Screen::Picker,
            notice: None,
            should_quit: false,
        };
        app.refresh_rows();
        app
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal()?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        while !self.should_quit {
            self.tick();
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
        }
        self.leave_exercise();
        Ok(())
    }

    /// Apply pending rest timer events
    fn tick(&mut self) {
        if let Screen::Logging { session, .. } = &mut self.screen {
            while session.poll_timer().is_some() {}
        }
    }

    fn refresh_rows(&mut self) {
        self.rows = match &self.template {
            Some(template) => template
                .ordered_exercises()
                .into_iter()
                .map(|exercise| PickerRow {
                    name: exercise.name.clone(),
                    status: self
                        .log
                        .exercise_log(&exercise.name)
                        .map(|l| l.status())
                        .unwrap_or(ExerciseStatus::NotStarted),
                    template: Some(exercise.clone()),
                })
                .collect(),
            None => self
                .log
                .exercise_logs
                .iter()
                .map(|l| PickerRow {
                    name: l.exercise_name.clone(),
                    status: l.status(),
                    template: None,
                })
                .collect(),
        };
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(area);

        let title = format!(
            "ironlog - {} ({})",
            self.log.workout_name,
            self.log.date.format("%Y-%m-%d")
        );
        let header = Paragraph::new(title)
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let keys = match &self.screen {
            Screen::Picker => {
                self.render_picker(frame, chunks[1]);
                "up/down: select | enter: open | q: quit"
            }
            Screen::Logging { session, confirm_end } => {
                render_logging(frame, chunks[1], session);
                if *confirm_end {
                    "end exercise now? y: yes | n: no"
                } else {
                    "+/-: weight | up/down: reps | enter: log | s: skip rest | e: end | w: retry save | esc: back"
                }
            }
        };

        let notice = Paragraph::new(self.notice.clone().unwrap_or_default())
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(notice, chunks[2]);

        let footer = Paragraph::new(keys)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn render_picker(&self, frame: &mut Frame, area: Rect) {
        let rows: Vec<Row> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let status = match row.status {
                    ExerciseStatus::NotStarted => "Not started".to_string(),
                    ExerciseStatus::InProgress { done, total } => format!("{done}/{total}"),
                    ExerciseStatus::Done => "Done".to_string(),
                };
                let style = if i == self.selected {
                    Style::default().reversed()
                } else {
                    Style::default()
                };
                Row::new(vec![Cell::from(row.name.clone()), Cell::from(status)]).style(style)
            })
            .collect();

        let table = Table::new(rows, [Constraint::Min(20), Constraint::Length(12)])
            .header(Row::new(vec!["Exercise", "Status"]).style(Style::default().bold()))
            .block(Block::default().borders(Borders::ALL).title("Exercises"));
        frame.render_widget(table, area);
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key(key.code)?;
        }
        Ok(())
    }

    /// Errors returned here are fatal and end the TUI
    fn handle_key(&mut self, code: KeyCode) -> Result<()> {
        match &mut self.screen {
            Screen::Picker => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Up => self.selected = self.selected.saturating_sub(1),
                KeyCode::Down => {
                    if self.selected + 1 < self.rows.len() {
                        self.selected += 1;
                    }
                }
                KeyCode::Enter => self.open_selected()?,
                _ => {}
            },
            Screen::Logging {
                session,
                confirm_end,
            } => {
                if *confirm_end {
                    *confirm_end = false;
                    if code == KeyCode::Char('y') {
                        let result = session.end_early().map(|_| ());
                        self.notice = outcome(result, "exercise ended")?;
                    }
                    return Ok(());
                }

                match code {
                    KeyCode::Char('q') => self.should_quit = true,
                    KeyCode::Esc => {
                        self.leave_exercise();
                        self.notice = None;
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        let weight = session.state().proposed_weight + WEIGHT_STEP;
                        session.set_weight(weight);
                    }
                    KeyCode::Char('-') => {
                        let weight = session.state().proposed_weight - WEIGHT_STEP;
                        session.set_weight(weight);
                    }
                    KeyCode::Up => {
                        let reps = session.state().proposed_reps.saturating_add(1);
                        session.set_reps(reps);
                    }
                    KeyCode::Down => {
                        let reps = session.state().proposed_reps.saturating_sub(1);
                        session.set_reps(reps);
                    }
                    KeyCode::Enter => {
                        let result = session.log_proposed().map(|_| ());
                        let done = session.state().is_complete();
                        self.notice =
                            outcome(result, if done { "exercise complete" } else { "set logged" })?;
                    }
                    KeyCode::Char('s') => {
                        if session.state().is_resting() {
                            session.skip_rest();
                            self.notice = Some("rest skipped".to_string());
                        }
                    }
                    KeyCode::Char('e') => {
                        if !session.state().is_complete() {
                            *confirm_end = true;
                        }
                    }
                    KeyCode::Char('w') => {
                        if session.has_unsaved() {
                            self.notice = outcome(session.retry_save(), "saved")?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn open_selected(&mut self) -> Result<()> {
        let Some(row) = self.rows.get(self.selected) else {
            return Ok(());
        };
        let opened = match &row.template {
            Some(exercise) => self.workouts.open_exercise(&mut self.log, exercise),
            None => self.workouts.resume_exercise(&mut self.log, &row.name),
        };
        match opened {
            Ok(session) => {
                self.notice = None;
                self.screen = Screen::Logging {
                    session,
                    confirm_end: false,
                };
            }
            Err(LoggingError::AlreadyComplete) => {
                self.notice = Some("exercise already done".to_string());
            }
            Err(LoggingError::Storage(e)) if e.is_fatal() => return Err(e.into()),
            Err(e) => self.notice = Some(e.to_string()),
        }
        Ok(())
    }

    /// Back to the picker with the log reloaded from the store
    fn leave_exercise(&mut self) {
        let screen = std::mem::replace(&mut self.screen, Screen::Picker);
        let Screen::Logging { session, .. } = screen else {
            return;
        };
        let state = session.close();

        let reloaded = self
            .log
            .id
            .map(|id| self.workouts.repository().log(id))
            .transpose();
        match reloaded {
            Ok(Some(Some(log))) => self.log = log,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "could not reload log, keeping in-memory copy");
                if let Some(existing) = self
                    .log
                    .exercise_logs
                    .iter_mut()
                    .find(|l| l.exercise_name == state.log.exercise_name)
                {
                    *existing = state.log;
                }
            }
        }
        self.refresh_rows();
    }
}

/// Notice for a finished action; fatal storage errors are passed on
fn outcome(result: Result<(), LoggingError>, ok: &str) -> Result<Option<String>> {
    match result {
        Ok(()) => Ok(Some(ok.to_string())),
        Err(LoggingError::StartWeightRequired) => {
            Ok(Some("enter a start weight with +/- first".to_string()))
        }
        Err(LoggingError::RestInProgress) => Ok(Some("resting, press s to skip".to_string())),
        Err(LoggingError::Storage(e)) if e.is_fatal() => Err(e.into()),
        Err(LoggingError::Storage(e @ StorageError::Conflict { .. })) => {
            Ok(Some(format!("{e}, press esc to reload")))
        }
        Err(LoggingError::Storage(e)) => Ok(Some(format!("not saved ({e}), press w to retry"))),
        Err(e) => Ok(Some(e.to_string())),
    }
}

fn render_logging<S: WorkoutStore>(frame: &mut Frame, area: Rect, session: &ExerciseSession<'_, S>) {
    let state = session.state();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(4)])
        .split(area);

    let phase = match state.phase {
        Phase::AwaitingEntry => format!(
            "Set {}/{}  target {} reps",
            state.current_set_index + 1,
            state.total_sets(),
            state.target_reps
        ),
        Phase::Resting { .. } => format!(
            "Rest {}  next: set {}/{}",
            format_rest(session.rest_remaining().unwrap_or(0)),
            state.current_set_index + 1,
            state.total_sets()
        ),
        Phase::Completed => format!(
            "Done: {}/{} sets logged",
            state.log.entries.len(),
            state.total_sets()
        ),
    };
    let mut lines = vec![Line::from(phase)];
    if state.needs_start_weight() {
        lines.push(Line::from(format!(
            "Enter your start weight: {:.1}  Reps {}",
            state.proposed_weight, state.proposed_reps
        )));
    } else if !state.is_complete() {
        lines.push(Line::from(format!(
            "Weight {:.1}  Reps {}",
            state.proposed_weight, state.proposed_reps
        )));
    }
    if session.has_unsaved() {
        lines.push(Line::from("unsaved changes").style(Style::default().fg(Color::Red)));
    }
    let current = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(state.log.exercise_name.clone()),
    );
    frame.render_widget(current, chunks[0]);

    let rows: Vec<Row> = state
        .log
        .entries
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from((e.set_index + 1).to_string()),
                Cell::from(e.target_reps.to_string()),
                Cell::from(e.performed_reps.to_string()),
                Cell::from(format!("{:.1}", e.weight)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Min(8),
        ],
    )
    .header(Row::new(vec!["Set", "Target", "Reps", "Weight"]).style(Style::default().bold()))
    .block(Block::default().borders(Borders::ALL).title("Logged sets"));
    frame.render_widget(table, chunks[1]);
}

/// `m:ss`
fn format_rest(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
