//src/workouts.rs
use std::collections::HashMap;

use rusqlite::{named_params, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;

use crate::db::{as_bool, normalize_rpe, resolve_routine_program, DbError, ROUTINE_IN_PROGRAM_SQL};
use crate::names::format_exercise_display_name;
use crate::selectors::{resolve_selector, SelectorTable};
use crate::time::{epoch_seconds_to_iso, resolve_date_range, DateRange};
use crate::units::{
    resolve_global_weight_unit, to_display_volume, to_display_weight, with_weight_unit,
    UnitPreference, UnitValue,
};

#[derive(Default, Debug, Clone)]
pub struct WorkoutFilters<'a> {
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub on: Option<&'a str>,
    pub program: Option<&'a str>, // id or name
    pub routine: Option<&'a str>, // id or name
    pub limit: Option<u32>,       // None = every matching row
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSummary {
    pub id: i64,
    pub date: Option<String>,
    pub duration_seconds: Option<f64>,
    pub program: Option<String>,
    pub routine: Option<String>,
}

/// One performed set. `W` is the weight representation: bare display value or `UnitValue`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSet<W = Option<f64>> {
    #[serde(rename = "setId")]
    pub id: i64,
    pub reps: Option<i64>,
    pub weight: W,
    pub volume: W,
    pub time_seconds: Option<f64>,
    pub rpe: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutExerciseDetail<W = Option<f64>> {
    pub exercise_result_id: i64,
    pub exercise_id: Option<i64>,
    pub name: String,
    pub sets: Vec<WorkoutSet<W>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutDetail<W = Option<f64>> {
    pub id: i64,
    pub date: Option<String>,
    pub duration_seconds: Option<f64>,
    pub program: Option<String>,
    pub routine: Option<String>,
    pub exercises: Vec<WorkoutExerciseDetail<W>>,
}

impl WorkoutSet {
    pub fn with_units(self, preference: UnitPreference) -> WorkoutSet<UnitValue> {
        WorkoutSet {
            id: self.id,
            reps: self.reps,
            weight: with_weight_unit(self.weight, preference),
            volume: with_weight_unit(self.volume, preference),
            time_seconds: self.time_seconds,
            rpe: self.rpe,
        }
    }
}

impl WorkoutExerciseDetail {
    pub fn with_units(self, preference: UnitPreference) -> WorkoutExerciseDetail<UnitValue> {
        WorkoutExerciseDetail {
            exercise_result_id: self.exercise_result_id,
            exercise_id: self.exercise_id,
            name: self.name,
            sets: self.sets.into_iter().map(|s| s.with_units(preference)).collect(),
        }
    }
}

impl WorkoutDetail {
    pub fn with_units(self, preference: UnitPreference) -> WorkoutDetail<UnitValue> {
        WorkoutDetail {
            id: self.id,
            date: self.date,
            duration_seconds: self.duration_seconds,
            program: self.program,
            routine: self.routine,
            exercises: self
                .exercises
                .into_iter()
                .map(|e| e.with_units(preference))
                .collect(),
        }
    }
}

/// Program/routine/date restrictions shared by workout listings and exercise history.
/// Expects the query to alias `ZWORKOUTRESULT wr`, `ZROUTINE r` and `ZPERIOD p`.
#[derive(Debug, Default)]
pub(crate) struct WorkoutScope {
    pub program_id: Option<i64>,
    pub routine_id: Option<i64>,
    pub range: DateRange,
}

impl WorkoutScope {
    pub fn resolve(
        conn: &Connection,
        program: Option<&str>,
        routine: Option<&str>,
        range: DateRange,
    ) -> Result<Self, DbError> {
        Ok(Self {
            program_id: program
                .map(|s| resolve_selector(conn, SelectorTable::Program, s))
                .transpose()?,
            routine_id: routine
                .map(|s| resolve_selector(conn, SelectorTable::Routine, s))
                .transpose()?,
            range,
        })
    }

    pub fn push_conditions(&self, sql: &mut String, params_map: &mut HashMap<String, Box<dyn ToSql>>) {
        if let Some(program_id) = self.program_id {
            sql.push_str(" AND ");
            sql.push_str(ROUTINE_IN_PROGRAM_SQL);
            params_map.insert(":program_id".into(), Box::new(program_id));
        }
        if let Some(routine_id) = self.routine_id {
            sql.push_str(" AND wr.ZROUTINE = :routine_id");
            params_map.insert(":routine_id".into(), Box::new(routine_id));
        }
        if let Some(from) = self.range.from {
            sql.push_str(" AND wr.ZSTARTDATE >= :from");
            params_map.insert(":from".into(), Box::new(from));
        }
        if let Some(to) = self.range.to {
            sql.push_str(" AND wr.ZSTARTDATE <= :to");
            params_map.insert(":to".into(), Box::new(to));
        }
    }
}

/// Workout summaries, newest first.
pub fn list_workouts(
    conn: &Connection,
    filters: &WorkoutFilters,
) -> Result<Vec<WorkoutSummary>, DbError> {
    let range = resolve_date_range(filters.from, filters.to, filters.on)?;
    let scope = WorkoutScope::resolve(conn, filters.program, filters.routine, range)?;

    let mut sql = "SELECT wr.Z_PK, wr.ZSTARTDATE, wr.ZDURATION, wr.ZROUTINENAME, r.ZNAME,
                          plan_direct.ZNAME, plan_period.ZNAME
                   FROM ZWORKOUTRESULT wr
                   LEFT JOIN ZROUTINE r ON r.Z_PK = wr.ZROUTINE
                   LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
                   LEFT JOIN ZWORKOUTPLAN plan_direct ON plan_direct.Z_PK = r.ZWORKOUTPLAN
                   LEFT JOIN ZWORKOUTPLAN plan_period ON plan_period.Z_PK = p.ZWORKOUTPLAN
                   WHERE 1=1"
        .to_string();
    let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();
    scope.push_conditions(&mut sql, &mut params_map);

    sql.push_str(" ORDER BY wr.ZSTARTDATE DESC, wr.Z_PK DESC");
    if let Some(limit) = filters.limit {
        sql.push_str(" LIMIT :limit");
        params_map.insert(":limit".into(), Box::new(limit));
    }
    log::debug!("list_workouts: {sql}");

    let params_for_query: Vec<(&str, &dyn ToSql)> = params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_for_query.as_slice(), map_row_to_workout_summary)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// Columns: id, start, duration, routine name (result), routine name (plan), program (direct), program (period)
fn map_row_to_workout_summary(row: &Row) -> Result<WorkoutSummary, rusqlite::Error> {
    let start: Option<f64> = row.get(1)?;
    let routine_from_result: Option<String> = row.get(3)?;
    let routine_from_plan: Option<String> = row.get(4)?;
    let program_direct: Option<String> = row.get(5)?;
    let program_via_period: Option<String> = row.get(6)?;
    Ok(WorkoutSummary {
        id: row.get(0)?,
        date: epoch_seconds_to_iso(start),
        duration_seconds: row.get(2)?,
        program: resolve_routine_program(program_direct, program_via_period),
        routine: routine_from_result.or(routine_from_plan),
    })
}

/// Id of the most recently started workout.
pub fn latest_workout_id(conn: &Connection) -> Result<i64, DbError> {
    conn.query_row(
        "SELECT Z_PK FROM ZWORKOUTRESULT ORDER BY ZSTARTDATE DESC, Z_PK DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Workout", "latest (no workouts recorded)"))
}

const SET_RESULT_COLUMNS: &str = "gs.Z_PK, gs.ZREPS, gs.ZWEIGHT, gs.ZVOLUME, gs.ZTIME, gs.ZRPE, gs.ZEXERCISE";

fn map_row_to_set(row: &Row, preference: UnitPreference) -> Result<(Option<i64>, WorkoutSet), rusqlite::Error> {
    let set = WorkoutSet {
        id: row.get(0)?,
        reps: row.get(1)?,
        weight: to_display_weight(row.get(2)?, preference),
        volume: to_display_volume(row.get(3)?, preference),
        time_seconds: row.get(4)?,
        rpe: normalize_rpe(row.get(5)?),
    };
    Ok((row.get(6)?, set))
}

/// Sets performed for one exercise within one workout, in relationship order.
pub(crate) fn exercise_sets_in_workout(
    conn: &Connection,
    workout_id: i64,
    exercise_id: i64,
    preference: UnitPreference,
) -> Result<Vec<WorkoutSet>, DbError> {
    let sql = format!(
        "SELECT {SET_RESULT_COLUMNS}
         FROM ZGYMSETRESULT gs
         JOIN ZEXERCISERESULT er ON er.Z_PK = gs.ZEXERCISE
         JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = er.ZCONFIGURATION
         WHERE er.ZWORKOUT = :workout_id AND ec.ZINFORMATION = :exercise_id
         ORDER BY er.Z_FOK_WORKOUT ASC, er.Z_PK ASC, gs.Z_FOK_EXERCISE ASC, gs.Z_PK ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let sets = stmt
        .query_map(
            named_params! { ":workout_id": workout_id, ":exercise_id": exercise_id },
            |row| map_row_to_set(row, preference).map(|(_, set)| set),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sets)
}

/// One workout with its exercises and sets. Weights use the global unit preference.
pub fn get_workout_detail(conn: &Connection, workout_id: i64) -> Result<WorkoutDetail, DbError> {
    let preference = resolve_global_weight_unit(conn)?;

    let header = conn
        .query_row(
            "SELECT wr.Z_PK, wr.ZSTARTDATE, wr.ZDURATION, wr.ZROUTINENAME, r.ZNAME,
                    plan_direct.ZNAME, plan_period.ZNAME
             FROM ZWORKOUTRESULT wr
             LEFT JOIN ZROUTINE r ON r.Z_PK = wr.ZROUTINE
             LEFT JOIN ZPERIOD p ON p.Z_PK = r.ZPERIOD
             LEFT JOIN ZWORKOUTPLAN plan_direct ON plan_direct.Z_PK = r.ZWORKOUTPLAN
             LEFT JOIN ZWORKOUTPLAN plan_period ON plan_period.Z_PK = p.ZWORKOUTPLAN
             WHERE wr.Z_PK = :workout_id",
            named_params! { ":workout_id": workout_id },
            map_row_to_workout_summary,
        )
        .optional()?
        .ok_or_else(|| DbError::not_found("Workout", workout_id))?;

    let mut set_stmt = conn.prepare(&format!(
        "SELECT {SET_RESULT_COLUMNS}
         FROM ZGYMSETRESULT gs
         JOIN ZEXERCISERESULT er ON er.Z_PK = gs.ZEXERCISE
         WHERE er.ZWORKOUT = :workout_id
         ORDER BY gs.Z_FOK_EXERCISE ASC, gs.Z_PK ASC"
    ))?;
    let mut sets_by_exercise: HashMap<i64, Vec<WorkoutSet>> = HashMap::new();
    let set_rows = set_stmt.query_map(named_params! { ":workout_id": workout_id }, |row| {
        map_row_to_set(row, preference)
    })?;
    for set_row in set_rows {
        let (exercise_result_id, set) = set_row?;
        if let Some(exercise_result_id) = exercise_result_id {
            sets_by_exercise.entry(exercise_result_id).or_default().push(set);
        }
    }

    let mut exercise_stmt = conn.prepare(
        "SELECT er.Z_PK, ei.Z_PK, ei.ZNAME, ei.ZISUSERCREATED
         FROM ZEXERCISERESULT er
         LEFT JOIN ZEXERCISECONFIGURATION ec ON ec.Z_PK = er.ZCONFIGURATION
         LEFT JOIN ZEXERCISEINFORMATION ei ON ei.Z_PK = ec.ZINFORMATION
         WHERE er.ZWORKOUT = :workout_id
         ORDER BY er.Z_FOK_WORKOUT ASC, er.Z_PK ASC",
    )?;
    let exercises = exercise_stmt
        .query_map(named_params! { ":workout_id": workout_id }, |row| {
            let exercise_result_id: i64 = row.get(0)?;
            let exercise_id: Option<i64> = row.get(1)?;
            let name: Option<String> = row.get(2)?;
            let user_created: Option<i64> = row.get(3)?;
            if exercise_id.is_none() {
                log::warn!("exercise result {exercise_result_id} has no linked exercise");
            }
            Ok(WorkoutExerciseDetail {
                exercise_result_id,
                exercise_id,
                name: format_exercise_display_name(name.as_deref(), as_bool(user_created)),
                sets: sets_by_exercise.remove(&exercise_result_id).unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WorkoutDetail {
        id: header.id,
        date: header.date,
        duration_seconds: header.duration_seconds,
        program: header.program,
        routine: header.routine,
        exercises,
    })
}
