//src/selectors.rs
use rusqlite::{named_params, Connection};

use crate::db::{as_bool, DbError};
use crate::names::{format_exercise_display_name, UNNAMED};

/// Tables a selector can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTable {
    Exercise,
    Routine,
    Program,
}

impl SelectorTable {
    const fn table_name(self) -> &'static str {
        match self {
            Self::Exercise => "ZEXERCISEINFORMATION",
            Self::Routine => "ZROUTINE",
            Self::Program => "ZWORKOUTPLAN",
        }
    }

    pub const fn entity(self) -> &'static str {
        match self {
            Self::Exercise => "Exercise",
            Self::Routine => "Routine",
            Self::Program => "Program",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdName {
    pub id: i64,
    pub name: String,
}

/// A selector made only of ASCII digits is an id. Nothing is looked up for it here.
pub fn parse_numeric_selector(selector: &str) -> Option<i64> {
    let trimmed = selector.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

fn render_candidates(candidates: &[IdName]) -> String {
    candidates
        .iter()
        .map(|c| format!("{}:{}", c.id, c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Zero candidates means "keep looking"; more than one is an error naming all of them.
fn pick_single(selector: &str, candidates: Vec<IdName>) -> Result<Option<i64>, DbError> {
    match candidates.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.id)),
        _ => Err(DbError::AmbiguousSelector {
            selector: selector.to_string(),
            candidates: render_candidates(&candidates),
        }),
    }
}

/// Resolves an id-or-name selector to exactly one row id.
///
/// Exact (case-insensitive) name matches are tried before substring matches.
/// Soft-deleted rows never match by name.
pub fn resolve_selector(
    conn: &Connection,
    table: SelectorTable,
    selector: &str,
) -> Result<i64, DbError> {
    if let Some(id) = parse_numeric_selector(selector) {
        return Ok(id);
    }
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(DbError::not_found(table.entity(), "(empty selector)"));
    }

    let resolved = match table {
        SelectorTable::Exercise => resolve_exercise_name(conn, trimmed)?,
        SelectorTable::Routine | SelectorTable::Program => resolve_plain_name(conn, table, trimmed)?,
    };
    log::debug!("{} selector '{trimmed}' resolved to {resolved}", table.entity());
    Ok(resolved)
}

fn query_candidates(
    conn: &Connection,
    table: SelectorTable,
    condition: &str,
    selector: &str,
) -> Result<Vec<IdName>, DbError> {
    let sql = format!(
        "SELECT Z_PK, ZNAME FROM {} WHERE {condition} ORDER BY Z_PK ASC",
        table.table_name()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(named_params! { ":selector": selector }, |row| {
            let name: Option<String> = row.get(1)?;
            Ok(IdName {
                id: row.get(0)?,
                name: name.unwrap_or_else(|| UNNAMED.to_string()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn resolve_plain_name(
    conn: &Connection,
    table: SelectorTable,
    selector: &str,
) -> Result<i64, DbError> {
    let exact = query_candidates(
        conn,
        table,
        "lower(ZNAME) = lower(:selector) AND ZSOFTDELETED IS NOT 1",
        selector,
    )?;
    if let Some(id) = pick_single(selector, exact)? {
        return Ok(id);
    }

    let partial = query_candidates(
        conn,
        table,
        "instr(lower(ZNAME), lower(:selector)) > 0 AND ZSOFTDELETED IS NOT 1",
        selector,
    )?;
    pick_single(selector, partial)?.ok_or_else(|| DbError::not_found(table.entity(), selector))
}

struct ExerciseNameRow {
    id: i64,
    raw: String,
    display: String,
}

/// Exercises match on either the raw name or the display name; soft-deleted rows never match.
fn resolve_exercise_name(conn: &Connection, selector: &str) -> Result<i64, DbError> {
    let mut stmt = conn.prepare(
        "SELECT Z_PK, ZNAME, ZISUSERCREATED FROM ZEXERCISEINFORMATION
         WHERE ZSOFTDELETED IS NOT 1
         ORDER BY Z_PK ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let name: Option<String> = row.get(1)?;
            let user_created: Option<i64> = row.get(2)?;
            Ok(ExerciseNameRow {
                id: row.get(0)?,
                display: format_exercise_display_name(name.as_deref(), as_bool(user_created)),
                raw: name.unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let needle = selector.to_lowercase();
    let candidates = |matches: &dyn Fn(&str) -> bool| -> Vec<IdName> {
        rows.iter()
            .filter(|row| matches(&row.raw.to_lowercase()) || matches(&row.display.to_lowercase()))
            .map(|row| IdName {
                id: row.id,
                name: row.display.clone(),
            })
            .collect()
    };

    if let Some(id) = pick_single(selector, candidates(&|name: &str| name == needle))? {
        return Ok(id);
    }
    pick_single(selector, candidates(&|name: &str| name.contains(needle.as_str())))?
        .ok_or_else(|| DbError::not_found("Exercise", selector))
}
