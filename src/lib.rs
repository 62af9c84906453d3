use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

// --- Declare modules ---
mod config;
pub mod db;
pub mod exercises;
pub mod names;
pub mod programs;
pub mod selectors;
pub mod time;
pub mod units;
pub mod workouts;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load_config as load_config_util, parse_color, Config,
    ConfigError, StandardColor, ThemeConfig,
};

pub use db::{get_db_path as get_db_path_util, DbError};
pub use exercises::{
    ExerciseDetail, ExerciseHistoryEntry, ExerciseHistoryFilters, ExerciseHistoryRow,
    ExerciseListFilters, ExerciseSnapshot, ExerciseSort, ExerciseSummary,
};
pub use programs::{
    PlannedExercise, PlannedSet, ProgramDetail, ProgramRoutine, ProgramSummary, ProgramWeek,
};
pub use units::{weight_unit_label, UnitPreference, UnitValue};
pub use workouts::{
    WorkoutDetail, WorkoutExerciseDetail, WorkoutFilters, WorkoutSet, WorkoutSummary,
};

use selectors::SelectorTable;

pub struct AppService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppService {
    /// Loads the config and opens the store read-only.
    /// # Errors
    /// Returns `anyhow::Error` if the config cannot be read or the store cannot be opened.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path(config.db_path.as_deref())
            .context("Failed to determine database path")?;
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        Ok(Self {
            config,
            conn,
            db_path,
            config_path,
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Resolves an exercise id or name to its id.
    /// # Errors
    /// Fails with `DbError::NotFound` or `DbError::AmbiguousSelector` underneath.
    pub fn resolve_exercise(&self, selector: &str) -> Result<i64> {
        selectors::resolve_selector(&self.conn, SelectorTable::Exercise, selector)
            .with_context(|| format!("Failed to resolve exercise '{selector}'"))
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping DB errors.
    pub fn list_exercises(&self, filters: &ExerciseListFilters) -> Result<Vec<ExerciseSummary>> {
        exercises::list_exercises(&self.conn, filters).context("Failed to list exercises")
    }

    /// Exercise detail with as many recent routines as the config asks for.
    /// # Errors
    /// Returns `anyhow::Error` if the exercise is missing or soft-deleted.
    pub fn get_exercise_detail(&self, exercise_id: i64) -> Result<ExerciseDetail> {
        exercises::get_exercise_detail(&self.conn, exercise_id, self.config.recent_routines)
            .with_context(|| format!("Failed to load exercise {exercise_id}"))
    }

    /// # Errors
    /// Returns `anyhow::Error` on program/routine selector, date or DB errors.
    pub fn get_exercise_history(
        &self,
        exercise_id: i64,
        filters: &ExerciseHistoryFilters,
    ) -> Result<Vec<ExerciseHistoryRow>> {
        exercises::get_exercise_history_rows(&self.conn, exercise_id, filters)
            .with_context(|| format!("Failed to load history for exercise {exercise_id}"))
    }

    /// # Errors
    /// Returns `anyhow::Error` on program/routine selector, date or DB errors.
    pub fn get_exercise_history_with_sets(
        &self,
        exercise_id: i64,
        filters: &ExerciseHistoryFilters,
    ) -> Result<Vec<ExerciseHistoryEntry>> {
        exercises::get_exercise_history_with_sets(&self.conn, exercise_id, filters)
            .with_context(|| format!("Failed to load history for exercise {exercise_id}"))
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping DB errors.
    pub fn get_last_performed_exercise_snapshot(
        &self,
        exercise_id: i64,
    ) -> Result<Option<ExerciseSnapshot>> {
        exercises::get_last_performed_exercise_snapshot(&self.conn, exercise_id)
            .with_context(|| format!("Failed to load last workout for exercise {exercise_id}"))
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping DB errors.
    pub fn exercise_unit_preference(&self, exercise_id: i64) -> Result<UnitPreference> {
        units::resolve_exercise_weight_unit(&self.conn, exercise_id)
            .context("Failed to resolve exercise weight unit")
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping DB errors.
    pub fn list_programs(&self) -> Result<Vec<ProgramSummary>> {
        programs::list_programs(&self.conn).context("Failed to list programs")
    }

    /// # Errors
    /// Returns `anyhow::Error` if the selector does not resolve or the program is soft-deleted.
    pub fn resolve_program(&self, selector: &str) -> Result<i64> {
        programs::resolve_program_selector(&self.conn, selector)
            .with_context(|| format!("Failed to resolve program '{selector}'"))
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping `DbError::InvariantViolation` when no single program is active.
    pub fn resolve_active_program(&self) -> Result<i64> {
        programs::resolve_active_program_id(&self.conn).context("Failed to determine the active program")
    }

    /// # Errors
    /// Returns `anyhow::Error` if the program is missing, soft-deleted, or the DB read fails.
    pub fn get_program_detail(&self, program_id: i64) -> Result<ProgramDetail> {
        programs::get_program_detail(&self.conn, program_id)
            .with_context(|| format!("Failed to load program {program_id}"))
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping DB errors.
    pub fn program_unit_preference(&self, program_id: i64) -> Result<UnitPreference> {
        units::resolve_program_weight_unit(&self.conn, program_id)
            .context("Failed to resolve program weight unit")
    }

    /// # Errors
    /// Returns `anyhow::Error` on selector, date or DB errors.
    pub fn list_workouts(&self, filters: &WorkoutFilters) -> Result<Vec<WorkoutSummary>> {
        workouts::list_workouts(&self.conn, filters).context("Failed to list workouts")
    }

    /// Detail of the given workout, or of the most recent one.
    /// # Errors
    /// Returns `anyhow::Error` if there is no such workout or the DB read fails.
    pub fn get_workout_detail(&self, workout_id: Option<i64>) -> Result<WorkoutDetail> {
        let workout_id = match workout_id {
            Some(id) => id,
            None => workouts::latest_workout_id(&self.conn).context("Failed to find the latest workout")?,
        };
        workouts::get_workout_detail(&self.conn, workout_id)
            .with_context(|| format!("Failed to load workout {workout_id}"))
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping DB errors.
    pub fn global_unit_preference(&self) -> Result<UnitPreference> {
        units::resolve_global_weight_unit(&self.conn).context("Failed to read the unit setting")
    }
}
