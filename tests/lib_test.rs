use anyhow::Result;
use liftin_lib::{
    db, exercises, programs, selectors, workouts, AppService, Config, DbError,
    ExerciseHistoryFilters, ExerciseListFilters, ExerciseSort, UnitPreference, UnitValue,
    WorkoutFilters,
};
use rusqlite::Connection;

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE ZSETTINGS (Z_PK INTEGER PRIMARY KEY, ZMEASURMENTUNIT TEXT);
         CREATE TABLE ZEQUIPMENT2 (Z_PK INTEGER PRIMARY KEY, ZNAME TEXT, ZID TEXT, ZMEASURMENTUNIT TEXT);
         CREATE TABLE ZEXERCISEINFORMATION (Z_PK INTEGER PRIMARY KEY, ZNAME TEXT, ZISUSERCREATED INTEGER,
             ZMUSCLES TEXT, ZSECONDARYMUSCLES TEXT, ZEQUIPMENT INTEGER, ZTIMERBASED INTEGER,
             ZSUPPORTSONEREPMAX INTEGER, ZSOFTDELETED INTEGER, ZDEFAULTPROGRESSMETRIC TEXT, ZPERCEPTIONSCALE TEXT);
         CREATE TABLE ZWORKOUTPLAN (Z_PK INTEGER PRIMARY KEY, ZNAME TEXT, ZISCURRENT INTEGER, ZISTEMPLATE INTEGER,
             ZSOFTDELETED INTEGER, ZDATEADDED REAL, ZID BLOB);
         CREATE TABLE ZWORKOUTPROGRAMSINFO (Z_PK INTEGER PRIMARY KEY, ZSECONDARYWORKOUTPROGRAMID BLOB,
             ZSELECTEDWORKOUTPROGRAMID BLOB);
         CREATE TABLE ZPERIOD (Z_PK INTEGER PRIMARY KEY, ZWORKOUTPLAN INTEGER, Z_FOK_WORKOUTPLAN INTEGER);
         CREATE TABLE ZROUTINE (Z_PK INTEGER PRIMARY KEY, ZNAME TEXT, ZSOFTDELETED INTEGER, ZPERIOD INTEGER,
             ZWORKOUTPLAN INTEGER, Z_FOK_PERIOD INTEGER);
         CREATE TABLE Z_12ROUTINES (Z_12EXERCISES INTEGER, Z_28ROUTINES INTEGER, Z_FOK_12EXERCISES INTEGER,
             PRIMARY KEY (Z_12EXERCISES, Z_28ROUTINES));
         CREATE TABLE ZEXERCISECONFIGURATION (Z_PK INTEGER PRIMARY KEY, ZINFORMATION INTEGER, ZREPS INTEGER,
             ZSETS INTEGER, ZWEIGHT REAL, ZTIME REAL);
         CREATE TABLE ZSETCONFIGURATION (Z_PK INTEGER PRIMARY KEY, ZEXERCISECONFIGURATION INTEGER, ZSETINDEX INTEGER,
             ZREPS INTEGER, ZWEIGHT REAL, ZTIME REAL, ZRPE REAL);
         CREATE TABLE ZWORKOUTRESULT (Z_PK INTEGER PRIMARY KEY, ZROUTINE INTEGER, ZROUTINENAME TEXT,
             ZSTARTDATE REAL, ZDURATION REAL);
         CREATE TABLE ZEXERCISERESULT (Z_PK INTEGER PRIMARY KEY, ZWORKOUT INTEGER, ZCONFIGURATION INTEGER,
             Z_FOK_WORKOUT INTEGER);
         CREATE TABLE ZGYMSETRESULT (Z_PK INTEGER PRIMARY KEY, ZEXERCISE INTEGER, ZREPS INTEGER, ZWEIGHT REAL,
             ZVOLUME REAL, ZTIME REAL, ZRPE REAL, Z_FOK_EXERCISE INTEGER);",
    )?;
    Ok(())
}

// Program 1 is selected through the info record; program 2 still carries the legacy flag.
// Relationship order keys deliberately disagree with primary-key order.
fn seed_fixture(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "INSERT INTO ZSETTINGS VALUES (1, 'imperial');
         INSERT INTO ZEQUIPMENT2 VALUES (1, 'barbell', 'eq-barbell', 'kg');

         INSERT INTO ZEXERCISEINFORMATION VALUES (1000, 'squat', 0, 'quadriceps', 'glutes,hamstrings', 1, 0, 1, 0, 'maxWeight', 'rpe');
         INSERT INTO ZEXERCISEINFORMATION VALUES (1001, 'bench_press', 0, 'chest', 'triceps', 1, 0, 1, 0, 'maxWeight', 'rpe');
         INSERT INTO ZEXERCISEINFORMATION VALUES (1002, 'bench', 0, 'chest', 'triceps', 1, 0, 1, 0, 'maxWeight', 'rpe');
         INSERT INTO ZEXERCISEINFORMATION VALUES (1003, 'deadlift', 0, 'back', NULL, 1, 0, 1, 1, NULL, NULL);

         INSERT INTO ZWORKOUTPLAN VALUES (1, 'Active Program', 0, 0, 0, 700000000, X'AA11');
         INSERT INTO ZWORKOUTPLAN VALUES (2, 'Old Program', 1, 0, 0, 690000000, X'BB22');
         INSERT INTO ZWORKOUTPLAN VALUES (3, 'Deleted Program', 0, 0, 1, 710000000, X'CC33');
         INSERT INTO ZWORKOUTPROGRAMSINFO VALUES (1, NULL, X'AA11');

         INSERT INTO ZPERIOD VALUES (10, 1, 1);
         INSERT INTO ZPERIOD VALUES (11, 2, 2);
         INSERT INTO ZPERIOD VALUES (12, 2, 1);

         INSERT INTO ZROUTINE VALUES (100, 'Day A', 0, 10, NULL, 2);
         INSERT INTO ZROUTINE VALUES (101, 'Day B', 0, 10, 1, 1);
         INSERT INTO ZROUTINE VALUES (102, 'Accessory', 0, NULL, 1, NULL);
         INSERT INTO ZROUTINE VALUES (103, 'Retired Day', 1, 10, 1, 3);
         INSERT INTO ZROUTINE VALUES (110, 'Legacy Day', 0, 11, NULL, 1);
         INSERT INTO ZROUTINE VALUES (111, 'Legacy Bench', 0, 12, NULL, 1);

         INSERT INTO ZEXERCISECONFIGURATION VALUES (2000, 1000, 5, 3, 100, NULL);
         INSERT INTO ZEXERCISECONFIGURATION VALUES (2001, 1001, 5, 3, 80, NULL);
         INSERT INTO ZEXERCISECONFIGURATION VALUES (2002, 1000, 8, 2, 60, NULL);
         INSERT INTO ZEXERCISECONFIGURATION VALUES (2003, 1002, 10, 1, 40, NULL);
         INSERT INTO Z_12ROUTINES VALUES (2000, 100, 2);
         INSERT INTO Z_12ROUTINES VALUES (2001, 100, 1);
         INSERT INTO Z_12ROUTINES VALUES (2002, 110, 1);
         INSERT INTO Z_12ROUTINES VALUES (2003, 111, 1);

         INSERT INTO ZSETCONFIGURATION VALUES (3000, 2000, 2, 5, 102.5, NULL, 7);
         INSERT INTO ZSETCONFIGURATION VALUES (3001, 2000, 1, 5, 100, NULL, 16);

         INSERT INTO ZWORKOUTRESULT VALUES (4000, 100, 'Day A', 700000100, 3600);
         INSERT INTO ZWORKOUTRESULT VALUES (4001, 100, NULL, 700000200, 3500);
         INSERT INTO ZEXERCISERESULT VALUES (5000, 4000, 2000, 1);
         INSERT INTO ZEXERCISERESULT VALUES (5001, 4001, 2000, 1);
         INSERT INTO ZGYMSETRESULT VALUES (6000, 5000, 5, 100, 500, NULL, 16, 1);
         INSERT INTO ZGYMSETRESULT VALUES (6001, 5000, 5, 102.5, 512.5, NULL, 0, 2);
         INSERT INTO ZGYMSETRESULT VALUES (6002, 5001, 6, 105, 630, NULL, NULL, 1);",
    )?;
    Ok(())
}

fn create_test_service() -> Result<AppService> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    seed_fixture(&conn)?;

    Ok(AppService {
        config: Config::default(),
        conn,
        db_path: ":memory:".into(),
        config_path: "test_config.toml".into(),
    })
}

fn db_error(err: &anyhow::Error) -> Option<&DbError> {
    err.downcast_ref::<DbError>()
}

#[test]
fn test_list_exercises_excludes_soft_deleted() -> Result<()> {
    let service = create_test_service()?;

    let listed = service.list_exercises(&ExerciseListFilters::default())?;
    let ids: Vec<i64> = listed.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1002, 1001, 1000]);
    assert_eq!(listed[1].name, "Bench Press");
    assert_eq!(listed[2].equipment.as_deref(), Some("Barbell"));
    assert_eq!(listed[2].secondary_muscles.as_deref(), Some("Glutes, Hamstrings"));
    assert_eq!(listed[2].times_performed, 2);
    assert_eq!(listed[2].last_performed.as_deref(), Some("2023-03-08T20:30:00.000Z"));
    assert!(listed[2].supports_1rm);

    let everything = service.list_exercises(&ExerciseListFilters {
        include_deleted: true,
        ..Default::default()
    })?;
    assert_eq!(everything.len(), 4);
    assert!(everything.iter().any(|e| e.id == 1003));
    Ok(())
}

#[test]
fn test_list_exercises_sorting_and_filters() -> Result<()> {
    let service = create_test_service()?;

    for sort in [ExerciseSort::TimesPerformed, ExerciseSort::LastPerformed] {
        let ids: Vec<i64> = service
            .list_exercises(&ExerciseListFilters { sort, ..Default::default() })?
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1000, 1001, 1002]);
    }

    let by_name = service.list_exercises(&ExerciseListFilters {
        name: Some("bench press"),
        ..Default::default()
    })?;
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, 1001);

    let by_muscle = service.list_exercises(&ExerciseListFilters {
        muscle: Some("HAMSTR"),
        ..Default::default()
    })?;
    assert_eq!(by_muscle.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1000]);

    let by_equipment_id = service.list_exercises(&ExerciseListFilters {
        equipment: Some("eq-bar"),
        ..Default::default()
    })?;
    assert_eq!(by_equipment_id.len(), 3);

    let literal_percent = service.list_exercises(&ExerciseListFilters {
        name: Some("%"),
        ..Default::default()
    })?;
    assert!(literal_percent.is_empty());
    Ok(())
}

#[test]
fn test_selector_resolution() -> Result<()> {
    let service = create_test_service()?;
    let conn = &service.conn;

    assert_eq!(selectors::resolve_selector(conn, selectors::SelectorTable::Exercise, "99999")?, 99999);
    assert_eq!(service.resolve_exercise("Bench Press")?, 1001);
    assert_eq!(service.resolve_exercise("bench")?, 1002);
    assert_eq!(service.resolve_exercise("SQU")?, 1000);

    match selectors::resolve_selector(conn, selectors::SelectorTable::Exercise, "ben") {
        Err(DbError::AmbiguousSelector { candidates, .. }) => {
            assert_eq!(candidates, "1001:Bench Press, 1002:Bench");
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }

    let deleted = service.resolve_exercise("dead").unwrap_err();
    assert!(matches!(db_error(&deleted), Some(DbError::NotFound { .. })));

    assert_eq!(selectors::resolve_selector(conn, selectors::SelectorTable::Routine, "day b")?, 101);
    assert!(matches!(
        selectors::resolve_selector(conn, selectors::SelectorTable::Program, "program"),
        Err(DbError::AmbiguousSelector { .. })
    ));
    Ok(())
}

#[test]
fn test_exercise_detail() -> Result<()> {
    let mut service = create_test_service()?;
    service.config.recent_routines = 1;

    let detail = service.get_exercise_detail(1000)?;
    assert_eq!(detail.name, "Squat");
    assert_eq!(detail.primary_muscles.as_deref(), Some("Quadriceps"));
    assert_eq!(detail.default_progress_metric.as_deref(), Some("maxWeight"));
    assert_eq!(detail.recent_routines, vec!["Day A".to_string()]);
    assert_eq!(detail.total_routines, 2);
    assert_eq!(detail.total_workouts, 2);
    let latest = detail.last_history_entry.expect("squat was performed");
    assert_eq!(latest.workout_id, 4001);
    assert_eq!(latest.top_weight, Some(231.0));

    let missing = service.get_exercise_detail(424242).unwrap_err();
    assert!(matches!(db_error(&missing), Some(DbError::NotFound { .. })));
    let deleted = service.get_exercise_detail(1003).unwrap_err();
    assert!(matches!(db_error(&deleted), Some(DbError::NotFound { .. })));
    Ok(())
}

#[test]
fn test_exercise_history_aggregates_per_workout() -> Result<()> {
    let service = create_test_service()?;

    let rows = service.get_exercise_history(1000, &ExerciseHistoryFilters::default())?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].workout_id, 4001);
    assert_eq!(rows[0].routine.as_deref(), Some("Day A"));
    assert_eq!(rows[0].top_reps, Some(6));
    assert_eq!(rows[0].top_weight, Some(231.0));
    assert_eq!(rows[0].volume, Some(1386.0));

    assert_eq!(rows[1].workout_id, 4000);
    assert_eq!(rows[1].set_count, 2);
    assert_eq!(rows[1].total_reps, 10);
    assert_eq!(rows[1].top_weight, Some(225.5));
    assert_eq!(rows[1].volume, Some(2227.5));

    let annotated = rows[0].clone().with_units(UnitPreference::Imperial);
    assert_eq!(annotated.top_weight, UnitValue { unit: "lb", value: Some(231.0) });
    Ok(())
}

#[test]
fn test_exercise_history_filters() -> Result<()> {
    let service = create_test_service()?;
    let history = |filters: ExerciseHistoryFilters| -> Result<Vec<i64>> {
        Ok(service
            .get_exercise_history(1000, &filters)?
            .iter()
            .map(|r| r.workout_id)
            .collect())
    };

    assert_eq!(history(ExerciseHistoryFilters { min_reps: Some(6), ..Default::default() })?, vec![4001]);
    assert_eq!(history(ExerciseHistoryFilters { max_weight: Some(230.0), ..Default::default() })?, vec![4000]);
    assert_eq!(history(ExerciseHistoryFilters { limit: Some(1), ..Default::default() })?, vec![4001]);
    assert_eq!(history(ExerciseHistoryFilters { program: Some("Active Program"), ..Default::default() })?, vec![4001, 4000]);
    assert!(history(ExerciseHistoryFilters { program: Some("Old Program"), ..Default::default() })?.is_empty());
    assert_eq!(history(ExerciseHistoryFilters { routine: Some("Day A"), ..Default::default() })?, vec![4001, 4000]);
    assert_eq!(
        history(ExerciseHistoryFilters { from: Some("2023-03-01"), to: Some("2023-03-31"), ..Default::default() })?,
        vec![4001, 4000]
    );
    assert!(history(ExerciseHistoryFilters { from: Some("2023-04-01"), ..Default::default() })?.is_empty());

    let backwards = service
        .get_exercise_history(
            1000,
            &ExerciseHistoryFilters { from: Some("2026-02-01"), to: Some("2026-01-01"), ..Default::default() },
        )
        .unwrap_err();
    assert!(matches!(db_error(&backwards), Some(DbError::InvalidDateRange)));

    let malformed = service
        .get_exercise_history(1000, &ExerciseHistoryFilters { from: Some("2026-2-1"), ..Default::default() })
        .unwrap_err();
    assert!(matches!(db_error(&malformed), Some(DbError::InvalidDate(_))));
    Ok(())
}

#[test]
fn test_weight_bounds_apply_to_top_weight() -> Result<()> {
    let service = create_test_service()?;
    service.conn.execute_batch(
        "UPDATE ZSETTINGS SET ZMEASURMENTUNIT = 'metric';
         INSERT INTO ZWORKOUTRESULT VALUES (4010, NULL, NULL, 710000000, 1200);
         INSERT INTO ZWORKOUTRESULT VALUES (4011, NULL, NULL, 710100000, 1200);
         INSERT INTO ZWORKOUTRESULT VALUES (4012, NULL, NULL, 710200000, 1200);
         INSERT INTO ZEXERCISERESULT VALUES (5010, 4010, 2001, 1);
         INSERT INTO ZEXERCISERESULT VALUES (5011, 4011, 2001, 1);
         INSERT INTO ZEXERCISERESULT VALUES (5012, 4012, 2001, 1);
         INSERT INTO ZGYMSETRESULT VALUES (6010, 5010, 5, 100, 500, NULL, NULL, 1);
         INSERT INTO ZGYMSETRESULT VALUES (6011, 5011, 5, 105, 525, NULL, NULL, 1);
         INSERT INTO ZGYMSETRESULT VALUES (6012, 5011, 8, 90, 720, NULL, NULL, 2);
         INSERT INTO ZGYMSETRESULT VALUES (6013, 5012, 5, 110, 550, NULL, NULL, 1);",
    )?;

    let rows = service.get_exercise_history(
        1001,
        &ExerciseHistoryFilters {
            min_weight: Some(105.0),
            max_weight: Some(105.0),
            ..Default::default()
        },
    )?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].workout_id, 4011);
    assert_eq!(rows[0].top_weight, Some(105.0));
    assert_eq!(rows[0].top_reps, Some(8));
    Ok(())
}

#[test]
fn test_history_with_sets_and_snapshot() -> Result<()> {
    let service = create_test_service()?;

    let entries = service.get_exercise_history_with_sets(1000, &ExerciseHistoryFilters::default())?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].sets.iter().map(|s| s.id).collect::<Vec<_>>(), vec![6002]);
    assert_eq!(entries[1].sets.iter().map(|s| s.id).collect::<Vec<_>>(), vec![6000, 6001]);

    let snapshot = service
        .get_last_performed_exercise_snapshot(1000)?
        .expect("squat has been performed");
    assert_eq!(snapshot.workout.id, 4001);
    assert_eq!(snapshot.exercise.exercise_id, Some(1000));
    assert_eq!(snapshot.exercise.sets[0].weight, Some(231.0));

    assert!(service.get_last_performed_exercise_snapshot(1002)?.is_none());
    Ok(())
}

#[test]
fn test_list_programs_and_active_flag() -> Result<()> {
    let service = create_test_service()?;

    let listed = service.list_programs()?;
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(listed[0].is_active);
    assert!(!listed[1].is_active);
    assert_eq!(listed[0].date_added.as_deref(), Some("2023-03-08T20:26:40.000Z"));

    assert_eq!(service.resolve_active_program()?, 1);

    service.conn.execute("DELETE FROM ZWORKOUTPROGRAMSINFO", [])?;
    assert_eq!(service.resolve_active_program()?, 2);
    let listed = service.list_programs()?;
    assert!(!listed[0].is_active);
    assert!(listed[1].is_active);

    service.conn.execute("UPDATE ZWORKOUTPLAN SET ZISCURRENT = 1 WHERE Z_PK = 1", [])?;
    let conflict = service.resolve_active_program().unwrap_err();
    match db_error(&conflict) {
        Some(DbError::InvariantViolation(message)) => assert!(message.contains("found 2")),
        other => panic!("expected invariant violation, got {other:?}"),
    }

    service.conn.execute("UPDATE ZWORKOUTPLAN SET ZISCURRENT = 0", [])?;
    assert!(matches!(
        programs::resolve_active_program_id(&service.conn),
        Err(DbError::InvariantViolation(_))
    ));
    Ok(())
}

#[test]
fn test_program_selector_hides_soft_deleted() -> Result<()> {
    let service = create_test_service()?;

    assert_eq!(service.resolve_program("old program")?, 2);
    let deleted = service.resolve_program("Deleted Program").unwrap_err();
    assert!(matches!(db_error(&deleted), Some(DbError::NotFound { .. })));

    let detail = service.get_program_detail(3).unwrap_err();
    assert!(matches!(db_error(&detail), Some(DbError::NotFound { .. })));
    Ok(())
}

#[test]
fn test_program_detail_tree() -> Result<()> {
    let service = create_test_service()?;

    let detail = service.get_program_detail(1)?;
    assert_eq!(detail.program.name, "Active Program");
    assert!(detail.program.is_active);
    assert_eq!(detail.weeks.len(), 1);

    let week = &detail.weeks[0];
    assert_eq!(week.id, 10);
    assert_eq!(week.routines.iter().map(|r| r.id).collect::<Vec<_>>(), vec![101, 100]);
    assert_eq!(detail.unscheduled_routines.iter().map(|r| r.id).collect::<Vec<_>>(), vec![102]);

    let day_a = &week.routines[1];
    assert_eq!(day_a.exercises.iter().map(|e| e.exercise_id).collect::<Vec<_>>(), vec![Some(1001), Some(1000)]);

    let bench = &day_a.exercises[0];
    assert_eq!(bench.name, "Bench Press");
    assert_eq!(bench.planned_weight, Some(176.0));
    assert_eq!(bench.sets.len(), 3);
    assert!(bench.sets.iter().all(|s| s.set_index.is_none() && s.id.is_none() && s.reps == Some(5)));

    let squat = &day_a.exercises[1];
    assert_eq!(squat.sets.iter().map(|s| s.id).collect::<Vec<_>>(), vec![Some(3001), Some(3000)]);
    assert_eq!(squat.sets[0].weight, Some(220.0));
    assert_eq!(squat.sets[0].rpe, None);
    assert_eq!(squat.sets[1].weight, Some(225.5));
    assert_eq!(squat.sets[1].rpe, Some(7.0));
    assert_eq!(squat.planned_weight, Some(220.0));
    Ok(())
}

#[test]
fn test_program_weeks_follow_relationship_order() -> Result<()> {
    let service = create_test_service()?;

    let detail = service.get_program_detail(2)?;
    assert!(!detail.program.is_active);
    assert_eq!(detail.weeks.iter().map(|w| w.id).collect::<Vec<_>>(), vec![12, 11]);
    assert_eq!(detail.weeks[0].routines[0].id, 111);
    assert_eq!(detail.weeks[1].routines[0].id, 110);
    assert!(detail.unscheduled_routines.is_empty());
    Ok(())
}

#[test]
fn test_program_unit_falls_back_to_equipment() -> Result<()> {
    let service = create_test_service()?;
    service.conn.execute("UPDATE ZSETTINGS SET ZMEASURMENTUNIT = NULL", [])?;

    assert_eq!(service.program_unit_preference(1)?, UnitPreference::Metric);
    assert_eq!(service.global_unit_preference()?, UnitPreference::Unknown);

    let detail = service.get_program_detail(1)?;
    assert_eq!(detail.weeks[0].routines[1].exercises[1].sets[0].weight, Some(100.0));

    service.conn.execute("UPDATE ZEQUIPMENT2 SET ZMEASURMENTUNIT = 'lbs'", [])?;
    assert_eq!(service.program_unit_preference(1)?, UnitPreference::Imperial);
    assert_eq!(service.exercise_unit_preference(1000)?, UnitPreference::Imperial);
    Ok(())
}

#[test]
fn test_list_workouts() -> Result<()> {
    let service = create_test_service()?;

    let listed = service.list_workouts(&WorkoutFilters::default())?;
    assert_eq!(listed.iter().map(|w| w.id).collect::<Vec<_>>(), vec![4001, 4000]);
    assert_eq!(listed[0].program.as_deref(), Some("Active Program"));
    assert_eq!(listed[0].routine.as_deref(), Some("Day A"));
    assert_eq!(listed[1].duration_seconds, Some(3600.0));
    assert_eq!(listed[1].date.as_deref(), Some("2023-03-08T20:28:20.000Z"));

    let limited = service.list_workouts(&WorkoutFilters { limit: Some(1), ..Default::default() })?;
    assert_eq!(limited.len(), 1);

    let by_program = service.list_workouts(&WorkoutFilters { program: Some("1"), ..Default::default() })?;
    assert_eq!(by_program.len(), 2);
    let other_program = service.list_workouts(&WorkoutFilters { program: Some("2"), ..Default::default() })?;
    assert!(other_program.is_empty());

    let conflicting = service
        .list_workouts(&WorkoutFilters { on: Some("2023-03-08"), from: Some("2023-03-01"), ..Default::default() })
        .unwrap_err();
    assert!(matches!(db_error(&conflicting), Some(DbError::MutuallyExclusiveFilters(_))));
    Ok(())
}

#[test]
fn test_workout_detail() -> Result<()> {
    let service = create_test_service()?;

    let detail = service.get_workout_detail(Some(4000))?;
    assert_eq!(detail.program.as_deref(), Some("Active Program"));
    assert_eq!(detail.exercises.len(), 1);
    let squat = &detail.exercises[0];
    assert_eq!(squat.exercise_id, Some(1000));
    assert_eq!(squat.name, "Squat");
    assert_eq!(squat.sets.iter().map(|s| s.id).collect::<Vec<_>>(), vec![6000, 6001]);
    assert_eq!(squat.sets[0].rpe, None);
    assert_eq!(squat.sets[1].rpe, Some(0.0));
    assert_eq!(squat.sets[0].weight, Some(220.0));
    assert_eq!(squat.sets[0].volume, Some(1100.0));

    let latest = service.get_workout_detail(None)?;
    assert_eq!(latest.id, 4001);
    assert_eq!(workouts::latest_workout_id(&service.conn)?, 4001);

    let missing = service.get_workout_detail(Some(9999)).unwrap_err();
    assert!(matches!(db_error(&missing), Some(DbError::NotFound { .. })));

    let annotated = detail.with_units(UnitPreference::Imperial);
    let json = serde_json::to_value(&annotated)?;
    assert_eq!(json["exercises"][0]["sets"][0]["weight"]["unit"], "lb");
    assert_eq!(json["exercises"][0]["sets"][0]["setId"], 6000);
    Ok(())
}

#[test]
fn test_empty_store_has_no_latest_workout() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    assert!(matches!(workouts::latest_workout_id(&conn), Err(DbError::NotFound { .. })));
    assert_eq!(db::selected_program_id(&conn)?, None);
    Ok(())
}

#[test]
fn test_squat_plan_and_history_end_to_end() -> Result<()> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    conn.execute_batch(
        "INSERT INTO ZSETTINGS VALUES (1, 'imperial');
         INSERT INTO ZEXERCISEINFORMATION VALUES (1, 'squat', 0, 'quadriceps', NULL, NULL, 0, 1, 0, NULL, NULL);
         INSERT INTO ZWORKOUTPLAN VALUES (1, 'Strength', 1, 0, 0, 700000000, X'01');
         INSERT INTO ZPERIOD VALUES (1, 1, 1);
         INSERT INTO ZROUTINE VALUES (1, 'Legs', 0, 1, 1, 1);
         INSERT INTO ZEXERCISECONFIGURATION VALUES (1, 1, 5, 3, 100, NULL);
         INSERT INTO Z_12ROUTINES VALUES (1, 1, 1);
         INSERT INTO ZWORKOUTRESULT VALUES (1, 1, 'Legs', 700000100, 1800);
         INSERT INTO ZEXERCISERESULT VALUES (1, 1, 1, 1);
         INSERT INTO ZGYMSETRESULT VALUES (1, 1, 6, 105, 630, NULL, NULL, 1);",
    )?;

    let detail = programs::get_program_detail(&conn, 1)?;
    let sets = &detail.weeks[0].routines[0].exercises[0].sets;
    assert_eq!(sets.len(), 3);
    assert!(sets.iter().all(|s| s.reps == Some(5) && s.weight == Some(220.0)));

    let squat = selectors::resolve_selector(&conn, selectors::SelectorTable::Exercise, "squat")?;
    let history = exercises::get_exercise_history_rows(&conn, squat, &ExerciseHistoryFilters::default())?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].top_reps, Some(6));
    assert_eq!(history[0].top_weight, Some(231.0));
    Ok(())
}

#[test]
fn test_oversized_planned_set_count_is_an_error() -> Result<()> {
    let service = create_test_service()?;
    service.conn.execute(
        "UPDATE ZEXERCISECONFIGURATION SET ZSETS = 9223372036854775807 WHERE Z_PK = 2001",
        [],
    )?;

    let err = service.get_program_detail(1).unwrap_err();
    match db_error(&err) {
        Some(DbError::InvariantViolation(message)) => assert!(message.contains("2001")),
        other => panic!("expected invariant violation, got {other:?}"),
    }

    service.conn.execute("UPDATE ZEXERCISECONFIGURATION SET ZSETS = 4 WHERE Z_PK = 2001", [])?;
    let detail = service.get_program_detail(1)?;
    assert_eq!(detail.weeks[0].routines[1].exercises[0].sets.len(), 4);
    Ok(())
}

#[test]
fn test_directly_linked_routine_counts_for_program_filters() -> Result<()> {
    let service = create_test_service()?;
    service.conn.execute_batch(
        "INSERT INTO ZWORKOUTRESULT VALUES (4003, 102, 'Accessory', 700000300, 600);
         INSERT INTO ZEXERCISERESULT VALUES (5003, 4003, 2000, 1);
         INSERT INTO ZGYMSETRESULT VALUES (6003, 5003, 3, 60, 180, NULL, NULL, 1);",
    )?;

    let listed = service.list_workouts(&WorkoutFilters {
        program: Some("Active Program"),
        ..Default::default()
    })?;
    assert_eq!(listed.iter().map(|w| w.id).collect::<Vec<_>>(), vec![4003, 4001, 4000]);
    assert_eq!(listed[0].program.as_deref(), Some("Active Program"));
    assert_eq!(listed[0].routine.as_deref(), Some("Accessory"));

    let history: Vec<i64> = service
        .get_exercise_history(
            1000,
            &ExerciseHistoryFilters {
                program: Some("Active Program"),
                ..Default::default()
            },
        )?
        .iter()
        .map(|r| r.workout_id)
        .collect();
    assert_eq!(history, vec![4003, 4001, 4000]);

    let other = service.list_workouts(&WorkoutFilters {
        program: Some("Old Program"),
        ..Default::default()
    })?;
    assert!(other.is_empty());
    Ok(())
}

#[test]
fn test_single_day_filter_keeps_only_that_day() -> Result<()> {
    let service = create_test_service()?;
    let (start, end) = liftin_lib::time::calendar_date_to_epoch_range("2024-06-15")?;
    let half_day = 12.0 * 3600.0;
    for (id, started) in [(4020, start - half_day), (4021, start + half_day), (4022, end + half_day)] {
        service.conn.execute(
            "INSERT INTO ZWORKOUTRESULT VALUES (?1, NULL, NULL, ?2, 600)",
            rusqlite::params![id, started],
        )?;
    }

    let on_day = service.list_workouts(&WorkoutFilters {
        on: Some("2024-06-15"),
        ..Default::default()
    })?;
    assert_eq!(on_day.iter().map(|w| w.id).collect::<Vec<_>>(), vec![4021]);

    let before = service.list_workouts(&WorkoutFilters {
        on: Some("2024-06-14"),
        ..Default::default()
    })?;
    assert_eq!(before.iter().map(|w| w.id).collect::<Vec<_>>(), vec![4020]);
    Ok(())
}

#[test]
fn test_soft_deleted_names_do_not_make_selectors_ambiguous() -> Result<()> {
    let service = create_test_service()?;
    service.conn.execute_batch(
        "INSERT INTO ZWORKOUTPLAN VALUES (4, 'Old Program', 0, 0, 1, 680000000, X'DD44');
         INSERT INTO ZROUTINE VALUES (104, 'Day A', 1, 10, 1, 4);",
    )?;

    assert_eq!(service.resolve_program("Old Program")?, 2);
    assert_eq!(
        selectors::resolve_selector(&service.conn, selectors::SelectorTable::Routine, "day a")?,
        100
    );
    assert!(matches!(
        selectors::resolve_selector(&service.conn, selectors::SelectorTable::Routine, "retired"),
        Err(DbError::NotFound { .. })
    ));

    let by_routine = service.list_workouts(&WorkoutFilters {
        routine: Some("Day A"),
        ..Default::default()
    })?;
    assert_eq!(by_routine.len(), 2);
    Ok(())
}
