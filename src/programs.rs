//src/programs.rs
use std::collections::{HashMap, HashSet};

use rusqlite::{named_params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::{as_bool, normalize_rpe, selected_program_id, DbError, ROUTINE_IN_PROGRAM_SQL};
use crate::names::{format_exercise_display_name, UNNAMED};
use crate::selectors::{resolve_selector, SelectorTable};
use crate::time::epoch_seconds_to_iso;
use crate::units::{
    resolve_program_weight_unit, to_display_weight, with_weight_unit, UnitPreference, UnitValue,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSummary {
    pub id: i64,
    pub name: String,
    pub date_added: Option<String>,
    pub is_active: bool,
    pub is_template: bool,
}

/// A planned set. Synthesized sets carry neither an id nor a set index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedSet<W = Option<f64>> {
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_index: Option<i64>,
    pub reps: Option<i64>,
    pub weight: W,
    pub time_seconds: Option<f64>,
    pub rpe: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedExercise<W = Option<f64>> {
    pub exercise_config_id: i64,
    #[serde(rename = "id")]
    pub exercise_id: Option<i64>,
    pub name: String,
    pub planned_sets: Option<i64>,
    pub planned_reps: Option<i64>,
    pub planned_weight: W,
    pub planned_time_seconds: Option<f64>,
    pub sets: Vec<PlannedSet<W>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRoutine<W = Option<f64>> {
    pub id: i64,
    pub name: String,
    pub exercises: Vec<PlannedExercise<W>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramWeek<W = Option<f64>> {
    pub id: i64,
    pub routines: Vec<ProgramRoutine<W>>,
}

/// Program → weeks → routines → exercises → sets, all in relationship order.
/// Routines linked to the program but not to one of its weeks land in `unscheduled_routines`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDetail<W = Option<f64>> {
    pub program: ProgramSummary,
    pub weeks: Vec<ProgramWeek<W>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unscheduled_routines: Vec<ProgramRoutine<W>>,
}

impl PlannedSet {
    pub fn with_units(self, preference: UnitPreference) -> PlannedSet<UnitValue> {
        PlannedSet {
            id: self.id,
            set_index: self.set_index,
            reps: self.reps,
            weight: with_weight_unit(self.weight, preference),
            time_seconds: self.time_seconds,
            rpe: self.rpe,
        }
    }
}

impl PlannedExercise {
    pub fn with_units(self, preference: UnitPreference) -> PlannedExercise<UnitValue> {
        PlannedExercise {
            exercise_config_id: self.exercise_config_id,
            exercise_id: self.exercise_id,
            name: self.name,
            planned_sets: self.planned_sets,
            planned_reps: self.planned_reps,
            planned_weight: with_weight_unit(self.planned_weight, preference),
            planned_time_seconds: self.planned_time_seconds,
            sets: self.sets.into_iter().map(|s| s.with_units(preference)).collect(),
        }
    }
}

impl ProgramRoutine {
    pub fn with_units(self, preference: UnitPreference) -> ProgramRoutine<UnitValue> {
        ProgramRoutine {
            id: self.id,
            name: self.name,
            exercises: self
                .exercises
                .into_iter()
                .map(|e| e.with_units(preference))
                .collect(),
        }
    }
}

impl ProgramDetail {
    pub fn with_units(self, preference: UnitPreference) -> ProgramDetail<UnitValue> {
        ProgramDetail {
            program: self.program,
            weeks: self
                .weeks
                .into_iter()
                .map(|week| ProgramWeek {
                    id: week.id,
                    routines: week
                        .routines
                        .into_iter()
                        .map(|r| r.with_units(preference))
                        .collect(),
                })
                .collect(),
            unscheduled_routines: self
                .unscheduled_routines
                .into_iter()
                .map(|r| r.with_units(preference))
                .collect(),
        }
    }
}

fn map_row_to_program_summary(
    row: &Row,
    selected: Option<i64>,
) -> Result<ProgramSummary, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let name: Option<String> = row.get(1)?;
    let is_current: Option<i64> = row.get(2)?;
    Ok(ProgramSummary {
        id,
        name: name.unwrap_or_else(|| UNNAMED.to_string()),
        is_active: selected.map_or_else(|| as_bool(is_current), |selected| selected == id),
        is_template: as_bool(row.get(3)?),
        date_added: epoch_seconds_to_iso(row.get(4)?),
    })
}

/// Non-deleted programs, most recently added first.
pub fn list_programs(conn: &Connection) -> Result<Vec<ProgramSummary>, DbError> {
    let selected = selected_program_id(conn)?;
    let mut stmt = conn.prepare(
        "SELECT Z_PK, ZNAME, ZISCURRENT, ZISTEMPLATE, ZDATEADDED
         FROM ZWORKOUTPLAN
         WHERE ZSOFTDELETED IS NOT 1
         ORDER BY ZDATEADDED DESC, Z_PK ASC",
    )?;
    let programs = stmt
        .query_map([], |row| map_row_to_program_summary(row, selected))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(programs)
}

/// The selected program, or else the single non-deleted program flagged current.
///
/// # Errors
/// `DbError::InvariantViolation` when no program is selected and the flag is set on zero or several programs.
pub fn resolve_active_program_id(conn: &Connection) -> Result<i64, DbError> {
    if let Some(selected) = selected_program_id(conn)? {
        return Ok(selected);
    }

    let mut stmt = conn.prepare(
        "SELECT Z_PK FROM ZWORKOUTPLAN
         WHERE ZISCURRENT = 1 AND ZSOFTDELETED IS NOT 1
         ORDER BY Z_PK ASC",
    )?;
    let flagged = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    match flagged.as_slice() {
        [only] => Ok(*only),
        _ => Err(DbError::InvariantViolation(format!(
            "expected exactly one active program, found {} flagged current and no selected program",
            flagged.len()
        ))),
    }
}

/// Resolves a program selector; soft-deleted programs are reported as missing.
pub fn resolve_program_selector(conn: &Connection, selector: &str) -> Result<i64, DbError> {
    let program_id = resolve_selector(conn, SelectorTable::Program, selector)?;
    let visible: Option<i64> = conn
        .query_row(
            "SELECT Z_PK FROM ZWORKOUTPLAN WHERE Z_PK = :program_id AND ZSOFTDELETED IS NOT 1",
            named_params! { ":program_id": program_id },
            |row| row.get(0),
        )
        .optional()?;
    visible.ok_or_else(|| DbError::not_found("Program", program_id))
}

struct RoutineRow {
    id: i64,
    name: String,
    period_id: Option<i64>,
}

struct PlannedExerciseRow {
    routine_id: i64,
    exercise: PlannedExercise,
}

/// The full planned tree of one non-deleted program.
pub fn get_program_detail(conn: &Connection, program_id: i64) -> Result<ProgramDetail, DbError> {
    let selected = selected_program_id(conn)?;
    let program = conn
        .query_row(
            "SELECT Z_PK, ZNAME, ZISCURRENT, ZISTEMPLATE, ZDATEADDED
             FROM ZWORKOUTPLAN
             WHERE Z_PK = :program_id AND ZSOFTDELETED IS NOT 1",
            named_params! { ":program_id": program_id },
            |row| map_row_to_program_summary(row, selected),
        )
        .optional()?
        .ok_or_else(|| DbError::not_found("Program", program_id))?;

    let preference = resolve_program_weight_unit(conn, program_id)?;
    log::debug!("program {program_id}: weights shown as {preference}");

    let mut week_stmt = conn.prepare(
        "SELECT Z_PK FROM ZPERIOD
         WHERE ZWORKOUTPLAN = :program_id
         ORDER BY Z_FOK_WORKOUTPLAN ASC, Z_PK ASC",
    )?;
    let week_ids = week_stmt
        .query_map(named_params! { ":program_id": program_id }, |row| {
            row.get::<_, i64>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut routine_stmt = conn.prepare(&format!(
        "SELECT r.Z_PK, r.ZNAME, r.ZPERIOD
         FROM ZROUTINE r
         LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
         WHERE {ROUTINE_IN_PROGRAM_SQL} AND r.ZSOFTDELETED IS NOT 1
         ORDER BY r.Z_FOK_PERIOD ASC, r.Z_PK ASC"
    ))?;
    let routines = routine_stmt
        .query_map(named_params! { ":program_id": program_id }, |row| {
            let name: Option<String> = row.get(1)?;
            Ok(RoutineRow {
                id: row.get(0)?,
                name: name.unwrap_or_else(|| UNNAMED.to_string()),
                period_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut set_stmt = conn.prepare(&format!(
        "SELECT sc.Z_PK, sc.ZEXERCISECONFIGURATION, sc.ZSETINDEX, sc.ZREPS, sc.ZWEIGHT, sc.ZTIME, sc.ZRPE
         FROM ZSETCONFIGURATION sc
         WHERE sc.ZEXERCISECONFIGURATION IN (
             SELECT j.Z_12EXERCISES
             FROM ZROUTINE r
             LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
             JOIN Z_12ROUTINES j ON j.Z_28ROUTINES = r.Z_PK
             WHERE {ROUTINE_IN_PROGRAM_SQL} AND r.ZSOFTDELETED IS NOT 1
         )
         ORDER BY sc.ZSETINDEX ASC, sc.Z_PK ASC"
    ))?;
    let mut sets_by_config: HashMap<i64, Vec<PlannedSet>> = HashMap::new();
    let set_rows = set_stmt.query_map(named_params! { ":program_id": program_id }, |row| {
        let config_id: i64 = row.get(1)?;
        let set = PlannedSet {
            id: row.get(0)?,
            set_index: row.get(2)?,
            reps: row.get(3)?,
            weight: to_display_weight(row.get(4)?, preference),
            time_seconds: row.get(5)?,
            rpe: normalize_rpe(row.get(6)?),
        };
        Ok((config_id, set))
    })?;
    for set_row in set_rows {
        let (config_id, set) = set_row?;
        sets_by_config.entry(config_id).or_default().push(set);
    }

    let mut exercise_stmt = conn.prepare(&format!(
        "SELECT r.Z_PK, ec.Z_PK, ec.ZSETS, ec.ZREPS, ec.ZWEIGHT, ec.ZTIME,
                ei.Z_PK, ei.ZNAME, ei.ZISUSERCREATED
         FROM ZROUTINE r
         LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
         JOIN Z_12ROUTINES j ON j.Z_28ROUTINES = r.Z_PK
         JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = j.Z_12EXERCISES
         LEFT JOIN ZEXERCISEINFORMATION ei ON ei.Z_PK = ec.ZINFORMATION
         WHERE {ROUTINE_IN_PROGRAM_SQL} AND r.ZSOFTDELETED IS NOT 1
         ORDER BY r.Z_PK ASC, j.Z_FOK_12EXERCISES ASC, ec.Z_PK ASC"
    ))?;
    let exercise_rows = exercise_stmt
        .query_map(named_params! { ":program_id": program_id }, |row| {
            let config_id: i64 = row.get(1)?;
            let name: Option<String> = row.get(7)?;
            let planned_sets: Option<i64> = row.get(2)?;
            let planned_reps: Option<i64> = row.get(3)?;
            let planned_weight = to_display_weight(row.get(4)?, preference);
            let planned_time_seconds: Option<f64> = row.get(5)?;
            let sets = sets_by_config.get(&config_id).cloned().unwrap_or_default();
            Ok(PlannedExerciseRow {
                routine_id: row.get(0)?,
                exercise: PlannedExercise {
                    exercise_config_id: config_id,
                    exercise_id: row.get(6)?,
                    name: format_exercise_display_name(name.as_deref(), as_bool(row.get(8)?)),
                    planned_sets,
                    planned_reps,
                    planned_weight,
                    planned_time_seconds,
                    sets,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut exercises_by_routine: HashMap<i64, Vec<PlannedExercise>> = HashMap::new();
    for mut row in exercise_rows {
        let exercise = &mut row.exercise;
        if exercise.sets.is_empty() {
            exercise.sets = synthesize_planned_sets(
                exercise.exercise_config_id,
                exercise.planned_sets,
                exercise.planned_reps,
                exercise.planned_weight,
                exercise.planned_time_seconds,
            )?;
        }
        exercises_by_routine
            .entry(row.routine_id)
            .or_default()
            .push(row.exercise);
    }

    let known_weeks: HashSet<i64> = week_ids.iter().copied().collect();
    let mut routines_by_week: HashMap<i64, Vec<ProgramRoutine>> = HashMap::new();
    let mut unscheduled_routines = Vec::new();
    for routine in routines {
        let tree = ProgramRoutine {
            id: routine.id,
            name: routine.name,
            exercises: exercises_by_routine.remove(&routine.id).unwrap_or_default(),
        };
        match routine.period_id.filter(|id| known_weeks.contains(id)) {
            Some(week_id) => routines_by_week.entry(week_id).or_default().push(tree),
            None => unscheduled_routines.push(tree),
        }
    }

    let weeks = week_ids
        .into_iter()
        .map(|id| ProgramWeek {
            id,
            routines: routines_by_week.remove(&id).unwrap_or_default(),
        })
        .collect();

    Ok(ProgramDetail {
        program,
        weeks,
        unscheduled_routines,
    })
}

/// Upper bound on sets expanded from a configuration's scalar plan.
pub const MAX_PLANNED_SETS: usize = 1000;

/// `max(planned_sets, 1)` copies of the scalar plan, without index or RPE.
fn synthesize_planned_sets(
    config_id: i64,
    planned_sets: Option<i64>,
    reps: Option<i64>,
    weight: Option<f64>,
    time_seconds: Option<f64>,
) -> Result<Vec<PlannedSet>, DbError> {
    let planned = planned_sets.unwrap_or(1).max(1);
    let count = usize::try_from(planned)
        .ok()
        .filter(|count| *count <= MAX_PLANNED_SETS)
        .ok_or_else(|| {
            DbError::InvariantViolation(format!(
                "exercise configuration {config_id} plans {planned} sets, more than {MAX_PLANNED_SETS}"
            ))
        })?;
    Ok(vec![
        PlannedSet {
            id: None,
            set_index: None,
            reps,
            weight,
            time_seconds,
            rpe: None,
        };
        count
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_expands_to_planned_count() {
        let sets = synthesize_planned_sets(7, Some(3), Some(5), Some(220.0), None).unwrap();
        assert_eq!(sets.len(), 3);
        assert!(sets
            .iter()
            .all(|s| s.reps == Some(5) && s.weight == Some(220.0) && s.set_index.is_none()));
    }

    #[test]
    fn fallback_never_below_one_set() {
        assert_eq!(synthesize_planned_sets(7, Some(0), None, None, None).unwrap().len(), 1);
        assert_eq!(synthesize_planned_sets(7, None, None, None, None).unwrap().len(), 1);
        assert_eq!(synthesize_planned_sets(7, Some(-2), None, None, None).unwrap().len(), 1);
    }

    #[test]
    fn oversized_plan_is_rejected() {
        let limit = MAX_PLANNED_SETS as i64;
        assert_eq!(synthesize_planned_sets(7, Some(limit), None, None, None).unwrap().len(), MAX_PLANNED_SETS);
        match synthesize_planned_sets(7, Some(limit + 1), None, None, None) {
            Err(DbError::InvariantViolation(message)) => assert!(message.contains("configuration 7")),
            other => panic!("expected invariant violation, got {other:?}"),
        }
        assert!(synthesize_planned_sets(7, Some(i64::MAX), None, None, None).is_err());
    }
}
