//src/db.rs
use std::fs::File;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use thiserror::Error;

/// Environment variable pointing at the store file. Wins over the config file.
pub const DB_PATH_ENV_VAR: &str = "LIFTIN_DB_PATH";

const DEFAULT_DB_RELATIVE_PATH: &str =
    "Library/Containers/com.nstrm.Bello/Data/Library/Application Support/Liftin/BelloDataModel.sqlite";

/// Stored RPE value that means "no RPE recorded".
pub const RPE_UNSET_SENTINEL: f64 = 16.0;

/// SQL condition for "routine `r` (period `p`) belongs to program `:program_id`",
/// through either the direct link or its period.
pub(crate) const ROUTINE_IN_PROGRAM_SQL: &str =
    "(r.ZWORKOUTPLAN = :program_id OR p.ZWORKOUTPLAN = :program_id)";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    Connection(rusqlite::Error),
    #[error("Could not determine the home directory to locate the database")]
    HomeDir,
    #[error("Database file is not readable at path={}", .0.display())]
    DatabaseNotReadable(PathBuf),
    #[error("Database query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("Selector \"{selector}\" is ambiguous: {candidates}")]
    AmbiguousSelector { selector: String, candidates: String },
    #[error("Invalid date format: {0}. Use YYYY-MM-DD.")]
    InvalidDate(String),
    #[error("Invalid date range: from must be before or equal to to.")]
    InvalidDateRange,
    #[error("Conflicting filters: {0}")]
    MutuallyExclusiveFilters(String),
    #[error("Data integrity problem: {0}")]
    InvariantViolation(String),
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Resolves the store path: env var, then the configured path, then the owning app's default location.
pub fn get_db_path(configured: Option<&Path>) -> Result<PathBuf, DbError> {
    if let Some(from_env) = std::env::var_os(DB_PATH_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(from_env));
    }
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    let home = dirs::home_dir().ok_or(DbError::HomeDir)?;
    Ok(home.join(DEFAULT_DB_RELATIVE_PATH))
}

/// Opens the store read-only. The connection closes when dropped.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, DbError> {
    let path = path.as_ref();
    File::open(path).map_err(|_| DbError::DatabaseNotReadable(path.to_path_buf()))?;

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(DbError::Connection)?;
    log::debug!("opened {} read-only", path.display());
    Ok(conn)
}

pub(crate) fn as_bool(value: Option<i64>) -> bool {
    value == Some(1)
}

/// Drops the "unset" sentinel. Every RPE read from the store goes through here.
pub fn normalize_rpe(rpe: Option<f64>) -> Option<f64> {
    rpe.filter(|value| *value != RPE_UNSET_SENTINEL)
}

/// A routine belongs to the program it links directly, or else to its period's program.
pub fn resolve_routine_program<T>(direct: Option<T>, via_period: Option<T>) -> Option<T> {
    direct.or(via_period)
}

/// The program chosen through the info record, if any. It overrides the legacy "is current" flag.
pub fn selected_program_id(conn: &Connection) -> Result<Option<i64>, DbError> {
    conn.query_row(
        "SELECT plan.Z_PK
         FROM ZWORKOUTPROGRAMSINFO info
         JOIN ZWORKOUTPLAN plan ON plan.ZID = info.ZSELECTEDWORKOUTPROGRAMID
         WHERE info.ZSELECTEDWORKOUTPROGRAMID IS NOT NULL
         ORDER BY info.Z_PK ASC
         LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
    .map_err(DbError::QueryFailed)
}
