//src/exercises.rs
use std::cmp::Ordering;
use std::collections::HashMap;

use rusqlite::{named_params, Connection, OptionalExtension, ToSql};
use serde::Serialize;

use crate::db::{as_bool, DbError};
use crate::names::{
    format_equipment_display_name, format_exercise_display_name, format_muscle_label, UNNAMED,
};
use crate::time::{epoch_seconds_to_iso, resolve_date_range};
use crate::units::{
    resolve_exercise_weight_unit, to_display_volume, to_display_weight, with_weight_unit,
    UnitPreference, UnitValue,
};
use crate::workouts::{
    exercise_sets_in_workout, get_workout_detail, WorkoutDetail, WorkoutExerciseDetail,
    WorkoutScope, WorkoutSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExerciseSort {
    #[default]
    Name,
    TimesPerformed,
    LastPerformed,
}

#[derive(Default, Debug, Clone)]
pub struct ExerciseListFilters<'a> {
    pub name: Option<&'a str>,
    pub muscle: Option<&'a str>,
    pub equipment: Option<&'a str>,
    pub sort: ExerciseSort,
    pub include_deleted: bool,
}

#[derive(Default, Debug, Clone)]
pub struct ExerciseHistoryFilters<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub min_reps: Option<i64>,
    pub max_reps: Option<i64>,
    pub min_weight: Option<f64>, // display unit
    pub max_weight: Option<f64>, // display unit
    pub program: Option<&'a str>,
    pub routine: Option<&'a str>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSummary {
    pub id: i64,
    pub name: String,
    pub equipment: Option<String>,
    pub primary_muscles: Option<String>,
    pub secondary_muscles: Option<String>,
    pub timer_based: bool,
    #[serde(rename = "supports1RM")]
    pub supports_1rm: bool,
    pub times_performed: i64,
    pub last_performed: Option<String>,
}

/// One workout's aggregate of an exercise's sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseHistoryRow<W = Option<f64>> {
    pub workout_id: i64,
    pub date: Option<String>,
    pub routine: Option<String>,
    #[serde(rename = "sets")]
    pub set_count: i64,
    pub total_reps: i64,
    pub top_reps: Option<i64>,
    pub top_weight: W,
    pub volume: W,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseHistoryEntry<W = Option<f64>> {
    #[serde(flatten)]
    pub row: ExerciseHistoryRow<W>,
    pub sets: Vec<WorkoutSet<W>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseDetail<W = Option<f64>> {
    pub id: i64,
    pub name: String,
    pub equipment: Option<String>,
    pub primary_muscles: Option<String>,
    pub secondary_muscles: Option<String>,
    pub default_progress_metric: Option<String>,
    pub perception_scale: Option<String>,
    pub timer_based: bool,
    #[serde(rename = "supports1RM")]
    pub supports_1rm: bool,
    pub recent_routines: Vec<String>,
    pub total_routines: usize,
    pub total_workouts: i64,
    pub last_history_entry: Option<ExerciseHistoryRow<W>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseSnapshot {
    pub workout: WorkoutDetail,
    pub exercise: WorkoutExerciseDetail,
}

impl ExerciseHistoryRow {
    pub fn with_units(self, preference: UnitPreference) -> ExerciseHistoryRow<UnitValue> {
        ExerciseHistoryRow {
            workout_id: self.workout_id,
            date: self.date,
            routine: self.routine,
            set_count: self.set_count,
            total_reps: self.total_reps,
            top_reps: self.top_reps,
            top_weight: with_weight_unit(self.top_weight, preference),
            volume: with_weight_unit(self.volume, preference),
        }
    }
}

impl ExerciseHistoryEntry {
    pub fn with_units(self, preference: UnitPreference) -> ExerciseHistoryEntry<UnitValue> {
        ExerciseHistoryEntry {
            row: self.row.with_units(preference),
            sets: self.sets.into_iter().map(|s| s.with_units(preference)).collect(),
        }
    }
}

impl ExerciseDetail {
    pub fn with_units(self, preference: UnitPreference) -> ExerciseDetail<UnitValue> {
        ExerciseDetail {
            id: self.id,
            name: self.name,
            equipment: self.equipment,
            primary_muscles: self.primary_muscles,
            secondary_muscles: self.secondary_muscles,
            default_progress_metric: self.default_progress_metric,
            perception_scale: self.perception_scale,
            timer_based: self.timer_based,
            supports_1rm: self.supports_1rm,
            recent_routines: self.recent_routines,
            total_routines: self.total_routines,
            total_workouts: self.total_workouts,
            last_history_entry: self.last_history_entry.map(|row| row.with_units(preference)),
        }
    }
}

/// Lists exercises with how often and how recently they were performed.
pub fn list_exercises(
    conn: &Connection,
    filters: &ExerciseListFilters,
) -> Result<Vec<ExerciseSummary>, DbError> {
    let mut sql = "SELECT ei.Z_PK, ei.ZNAME, ei.ZISUSERCREATED, ei.ZMUSCLES, ei.ZSECONDARYMUSCLES,
                          ei.ZTIMERBASED, ei.ZSUPPORTSONEREPMAX, eq.ZNAME, CAST(eq.ZID AS TEXT),
                          COUNT(DISTINCT wr.Z_PK), MAX(wr.ZSTARTDATE)
                   FROM ZEXERCISEINFORMATION ei
                   LEFT JOIN ZEQUIPMENT2 eq ON eq.Z_PK = ei.ZEQUIPMENT
                   LEFT JOIN ZEXERCISECONFIGURATION ec ON ec.ZINFORMATION = ei.Z_PK
                   LEFT JOIN ZEXERCISERESULT er ON er.ZCONFIGURATION = ec.Z_PK
                   LEFT JOIN ZWORKOUTRESULT wr ON wr.Z_PK = er.ZWORKOUT
                   WHERE 1=1"
        .to_string();
    let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();

    if !filters.include_deleted {
        sql.push_str(" AND ei.ZSOFTDELETED IS NOT 1");
    }
    if let Some(name) = filters.name {
        sql.push_str(
            " AND (instr(lower(ei.ZNAME), lower(:name)) > 0
                   OR instr(lower(replace(ei.ZNAME, '_', ' ')), lower(replace(:name, '_', ' '))) > 0)",
        );
        params_map.insert(":name".into(), Box::new(name.to_string()));
    }
    if let Some(muscle) = filters.muscle {
        sql.push_str(
            " AND (instr(lower(ei.ZMUSCLES), lower(:muscle)) > 0
                   OR instr(lower(ei.ZSECONDARYMUSCLES), lower(:muscle)) > 0)",
        );
        params_map.insert(":muscle".into(), Box::new(muscle.to_string()));
    }
    if let Some(equipment) = filters.equipment {
        sql.push_str(
            " AND (instr(lower(eq.ZNAME), lower(:equipment)) > 0
                   OR instr(lower(CAST(eq.ZID AS TEXT)), lower(:equipment)) > 0)",
        );
        params_map.insert(":equipment".into(), Box::new(equipment.to_string()));
    }
    sql.push_str(" GROUP BY ei.Z_PK");
    log::debug!("list_exercises: {sql}");

    let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect();

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(params_for_query.as_slice(), |row| {
            let name: Option<String> = row.get(1)?;
            let primary: Option<String> = row.get(3)?;
            let secondary: Option<String> = row.get(4)?;
            let equipment_name: Option<String> = row.get(7)?;
            let equipment_id: Option<String> = row.get(8)?;
            let last_started: Option<f64> = row.get(10)?;
            let summary = ExerciseSummary {
                id: row.get(0)?,
                name: format_exercise_display_name(name.as_deref(), as_bool(row.get(2)?)),
                equipment: format_equipment_display_name(
                    equipment_name.as_deref(),
                    equipment_id.as_deref(),
                ),
                primary_muscles: format_muscle_label(primary.as_deref()),
                secondary_muscles: format_muscle_label(secondary.as_deref()),
                timer_based: as_bool(row.get(5)?),
                supports_1rm: as_bool(row.get(6)?),
                times_performed: row.get(9)?,
                last_performed: epoch_seconds_to_iso(last_started),
            };
            Ok((summary, last_started))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    match filters.sort {
        ExerciseSort::Name => rows.sort_by(|(a, _), (b, _)| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        }),
        ExerciseSort::TimesPerformed => rows.sort_by(|(a, _), (b, _)| {
            b.times_performed
                .cmp(&a.times_performed)
                .then(a.id.cmp(&b.id))
        }),
        ExerciseSort::LastPerformed => rows.sort_by(|(a, a_last), (b, b_last)| {
            compare_most_recent_first(*a_last, *b_last).then(a.id.cmp(&b.id))
        }),
    }

    Ok(rows.into_iter().map(|(summary, _)| summary).collect())
}

/// Descending by time; never-performed sorts last.
fn compare_most_recent_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Full detail for one non-deleted exercise.
pub fn get_exercise_detail(
    conn: &Connection,
    exercise_id: i64,
    recent_routines: usize,
) -> Result<ExerciseDetail, DbError> {
    let detail = conn
        .query_row(
            "SELECT ei.Z_PK, ei.ZNAME, ei.ZISUSERCREATED, ei.ZMUSCLES, ei.ZSECONDARYMUSCLES,
                    CAST(ei.ZDEFAULTPROGRESSMETRIC AS TEXT), CAST(ei.ZPERCEPTIONSCALE AS TEXT),
                    ei.ZTIMERBASED, ei.ZSUPPORTSONEREPMAX, eq.ZNAME, CAST(eq.ZID AS TEXT)
             FROM ZEXERCISEINFORMATION ei
             LEFT JOIN ZEQUIPMENT2 eq ON eq.Z_PK = ei.ZEQUIPMENT
             WHERE ei.Z_PK = :exercise_id AND ei.ZSOFTDELETED IS NOT 1",
            named_params! { ":exercise_id": exercise_id },
            |row| {
                let name: Option<String> = row.get(1)?;
                let primary: Option<String> = row.get(3)?;
                let secondary: Option<String> = row.get(4)?;
                let equipment_name: Option<String> = row.get(9)?;
                let equipment_id: Option<String> = row.get(10)?;
                Ok(ExerciseDetail {
                    id: row.get(0)?,
                    name: format_exercise_display_name(name.as_deref(), as_bool(row.get(2)?)),
                    equipment: format_equipment_display_name(
                        equipment_name.as_deref(),
                        equipment_id.as_deref(),
                    ),
                    primary_muscles: format_muscle_label(primary.as_deref()),
                    secondary_muscles: format_muscle_label(secondary.as_deref()),
                    default_progress_metric: row.get(5)?,
                    perception_scale: row.get(6)?,
                    timer_based: as_bool(row.get(7)?),
                    supports_1rm: as_bool(row.get(8)?),
                    recent_routines: Vec::new(),
                    total_routines: 0,
                    total_workouts: 0,
                    last_history_entry: None,
                })
            },
        )
        .optional()?
        .ok_or_else(|| DbError::not_found("Exercise", exercise_id))?;

    let mut routine_stmt = conn.prepare(
        "SELECT r.ZNAME
         FROM Z_12ROUTINES j
         JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = j.Z_12EXERCISES
         JOIN ZROUTINE r ON r.Z_PK = j.Z_28ROUTINES
         WHERE ec.ZINFORMATION = :exercise_id AND r.ZSOFTDELETED IS NOT 1
         GROUP BY r.ZNAME
         ORDER BY r.ZNAME ASC",
    )?;
    let routine_names = routine_stmt
        .query_map(named_params! { ":exercise_id": exercise_id }, |row| {
            let name: Option<String> = row.get(0)?;
            Ok(name.unwrap_or_else(|| UNNAMED.to_string()))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total_workouts: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT er.ZWORKOUT)
         FROM ZEXERCISERESULT er
         JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = er.ZCONFIGURATION
         WHERE ec.ZINFORMATION = :exercise_id",
        named_params! { ":exercise_id": exercise_id },
        |row| row.get(0),
    )?;

    let latest = get_exercise_history_rows(
        conn,
        exercise_id,
        &ExerciseHistoryFilters {
            limit: Some(1),
            ..Default::default()
        },
    )?;

    Ok(ExerciseDetail {
        total_routines: routine_names.len(),
        recent_routines: routine_names.into_iter().take(recent_routines).collect(),
        total_workouts,
        last_history_entry: latest.into_iter().next(),
        ..detail
    })
}

fn within_bounds<T: PartialOrd>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

/// Per-workout aggregates for one exercise, newest first.
///
/// Reps and weight bounds are checked against each workout's aggregated top values in the display unit.
pub fn get_exercise_history_rows(
    conn: &Connection,
    exercise_id: i64,
    filters: &ExerciseHistoryFilters,
) -> Result<Vec<ExerciseHistoryRow>, DbError> {
    let preference = resolve_exercise_weight_unit(conn, exercise_id)?;
    let range = resolve_date_range(filters.from, filters.to, None)?;
    let scope = WorkoutScope::resolve(conn, filters.program, filters.routine, range)?;

    let mut sql = "SELECT wr.Z_PK, wr.ZSTARTDATE, wr.ZROUTINENAME, r.ZNAME,
                          COUNT(gs.Z_PK), COALESCE(SUM(gs.ZREPS), 0), MAX(gs.ZREPS),
                          MAX(gs.ZWEIGHT), COALESCE(SUM(gs.ZVOLUME), 0.0)
                   FROM ZWORKOUTRESULT wr
                   JOIN ZEXERCISERESULT er ON er.ZWORKOUT = wr.Z_PK
                   JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = er.ZCONFIGURATION
                   LEFT JOIN ZROUTINE r ON r.Z_PK = wr.ZROUTINE
                   LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
                   LEFT JOIN ZGYMSETRESULT gs ON gs.ZEXERCISE = er.Z_PK
                   WHERE ec.ZINFORMATION = :exercise_id"
        .to_string();
    let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();
    params_map.insert(":exercise_id".into(), Box::new(exercise_id));
    scope.push_conditions(&mut sql, &mut params_map);
    sql.push_str(" GROUP BY wr.Z_PK ORDER BY wr.ZSTARTDATE DESC, wr.Z_PK DESC");
    log::debug!("get_exercise_history_rows: {sql}");

    let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_for_query.as_slice(), |row| {
            let from_result: Option<String> = row.get(2)?;
            let from_plan: Option<String> = row.get(3)?;
            let volume: f64 = row.get(8)?;
            Ok(ExerciseHistoryRow {
                workout_id: row.get(0)?,
                date: epoch_seconds_to_iso(row.get(1)?),
                routine: from_result.or(from_plan),
                set_count: row.get(4)?,
                total_reps: row.get(5)?,
                top_reps: row.get(6)?,
                top_weight: to_display_weight(row.get(7)?, preference),
                volume: to_display_volume(Some(volume), preference),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut filtered: Vec<ExerciseHistoryRow> = rows
        .into_iter()
        .filter(|row| {
            within_bounds(row.top_reps, filters.min_reps, filters.max_reps)
                && within_bounds(row.top_weight, filters.min_weight, filters.max_weight)
        })
        .collect();
    if let Some(limit) = filters.limit {
        filtered.truncate(limit as usize);
    }
    Ok(filtered)
}

/// History rows, each with that workout's sets for the exercise.
pub fn get_exercise_history_with_sets(
    conn: &Connection,
    exercise_id: i64,
    filters: &ExerciseHistoryFilters,
) -> Result<Vec<ExerciseHistoryEntry>, DbError> {
    let preference = resolve_exercise_weight_unit(conn, exercise_id)?;
    get_exercise_history_rows(conn, exercise_id, filters)?
        .into_iter()
        .map(|row| {
            let sets = exercise_sets_in_workout(conn, row.workout_id, exercise_id, preference)?;
            Ok(ExerciseHistoryEntry { row, sets })
        })
        .collect()
}

/// The most recent workout containing the exercise, plus that exercise's slice of it.
pub fn get_last_performed_exercise_snapshot(
    conn: &Connection,
    exercise_id: i64,
) -> Result<Option<ExerciseSnapshot>, DbError> {
    let latest = get_exercise_history_rows(
        conn,
        exercise_id,
        &ExerciseHistoryFilters {
            limit: Some(1),
            ..Default::default()
        },
    )?;
    let Some(latest) = latest.into_iter().next() else {
        return Ok(None);
    };

    let workout = get_workout_detail(conn, latest.workout_id)?;
    let exercise = workout
        .exercises
        .iter()
        .find(|entry| entry.exercise_id == Some(exercise_id))
        .cloned();
    Ok(exercise.map(|exercise| ExerciseSnapshot { workout, exercise }))
}
