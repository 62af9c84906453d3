//src/main.rs
mod cli;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use log::LevelFilter;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::{self, stdout};

use liftin_lib::{
    parse_color, weight_unit_label, AppService, ExerciseDetail, ExerciseHistoryEntry,
    ExerciseHistoryFilters, ExerciseHistoryRow, ExerciseListFilters, ExerciseSnapshot,
    ExerciseSort, ExerciseSummary, ProgramDetail, ProgramRoutine, ProgramSummary, UnitPreference,
    WorkoutDetail, WorkoutFilters, WorkoutSummary,
};

fn main() {
    let cli_args = cli::parse_args();
    if let Err(e) = init_logger(cli_args.verbose) {
        eprintln!("Warning: failed to initialise logging: {e}");
    }

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return;
    }

    let json_output = cli_args.json;
    if let Err(err) = run(cli_args) {
        if json_output {
            println!("{}", json!({ "error": { "message": format!("{err:#}") } }));
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(1);
    }
}

/// `-v` flags win; without them `RUST_LOG` is honoured, defaulting to warnings.
fn init_logger(verbose: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = match verbose {
        0 => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")),
        n => {
            let level = match n {
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            };
            let mut builder = env_logger::Builder::new();
            builder.filter_level(level);
            builder
        }
    };
    builder.target(env_logger::Target::Stderr);
    builder.try_init()
}

struct Output {
    json: bool,
    csv: bool,
    header_color: Color,
}

fn run(cli_args: cli::Cli) -> Result<()> {
    let service = AppService::initialize().context("Failed to initialize application service")?;
    let header_color = match parse_color(&service.config.theme.header_color) {
        Ok(color) => Color::from(color),
        Err(e) => {
            log::warn!("{e}; falling back to green headers");
            Color::Green
        }
    };
    let out = Output {
        json: cli_args.json,
        csv: cli_args.export_csv,
        header_color,
    };

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::DbPath => {
            if out.json {
                print_json(&json!({ "dbPath": service.get_db_path() }))?;
            } else {
                println!("Database file is located at: {}", service.get_db_path().display());
            }
        }
        cli::Commands::Exercises { command } => run_exercise_command(&service, &out, command)?,
        cli::Commands::Programs { command } => run_program_command(&service, &out, command)?,
        cli::Commands::Workouts { command } => run_workout_command(&service, &out, command)?,
    }
    Ok(())
}

fn cli_sort_to_lib_sort(sort: cli::ExerciseSortCli) -> ExerciseSort {
    match sort {
        cli::ExerciseSortCli::Name => ExerciseSort::Name,
        cli::ExerciseSortCli::TimesPerformed => ExerciseSort::TimesPerformed,
        cli::ExerciseSortCli::LastPerformed => ExerciseSort::LastPerformed,
    }
}

fn run_exercise_command(service: &AppService, out: &Output, command: cli::ExerciseCommands) -> Result<()> {
    match command {
        cli::ExerciseCommands::List { name, muscle, equipment, sort } => {
            let filters = ExerciseListFilters {
                name: name.as_deref(),
                muscle: muscle.as_deref(),
                equipment: equipment.as_deref(),
                sort: cli_sort_to_lib_sort(sort),
                include_deleted: false,
            };
            let exercises = service.list_exercises(&filters)?;
            if out.json {
                print_json(&exercises)?;
            } else if out.csv {
                print_exercise_csv(&exercises)?;
            } else if exercises.is_empty() {
                println!("No exercises found matching the criteria.");
            } else {
                print_exercise_table(&exercises, out.header_color);
            }
        }
        cli::ExerciseCommands::Show { exercise } => {
            let exercise_id = service.resolve_exercise(&exercise)?;
            let detail = service.get_exercise_detail(exercise_id)?;
            let snapshot = service.get_last_performed_exercise_snapshot(exercise_id)?;
            let preference = service.exercise_unit_preference(exercise_id)?;
            let global = service.global_unit_preference()?;
            if out.json {
                let last_performed = snapshot.map(|s| {
                    json!({
                        "workout": s.workout.with_units(global),
                        "exercise": s.exercise.with_units(global),
                    })
                });
                print_json(&json!({
                    "exercise": detail.with_units(preference),
                    "lastPerformed": last_performed,
                }))?;
            } else {
                print_exercise_detail(&detail, preference, out.header_color);
                match snapshot {
                    Some(snapshot) => print_snapshot(&snapshot, global, out.header_color),
                    None => println!("\nNot performed yet."),
                }
            }
        }
        cli::ExerciseCommands::History {
            exercise,
            from,
            to,
            min_reps,
            max_reps,
            min_weight,
            max_weight,
            program,
            routine,
            limit,
            all,
            sets,
        } => {
            let exercise_id = service.resolve_exercise(&exercise)?;
            let preference = service.exercise_unit_preference(exercise_id)?;
            let filters = ExerciseHistoryFilters {
                from: from.as_deref(),
                to: to.as_deref(),
                min_reps,
                max_reps,
                min_weight,
                max_weight,
                program: program.as_deref(),
                routine: routine.as_deref(),
                limit: cli::effective_limit(limit, all, service.config.history_limit),
            };
            if sets {
                let entries = service.get_exercise_history_with_sets(exercise_id, &filters)?;
                if out.json {
                    let annotated: Vec<_> = entries.into_iter().map(|e| e.with_units(preference)).collect();
                    print_json(&annotated)?;
                } else if out.csv {
                    print_history_sets_csv(&entries, preference)?;
                } else if entries.is_empty() {
                    println!("No history found for exercise {exercise_id}.");
                } else {
                    print_history_sets_table(&entries, preference, out.header_color);
                }
            } else {
                let rows = service.get_exercise_history(exercise_id, &filters)?;
                if out.json {
                    let annotated: Vec<_> = rows.into_iter().map(|r| r.with_units(preference)).collect();
                    print_json(&annotated)?;
                } else if out.csv {
                    print_history_csv(&rows, preference)?;
                } else if rows.is_empty() {
                    println!("No history found for exercise {exercise_id}.");
                } else {
                    print_history_table(&rows, preference, out.header_color);
                }
            }
        }
    }
    Ok(())
}

fn run_program_command(service: &AppService, out: &Output, command: cli::ProgramCommands) -> Result<()> {
    match command {
        cli::ProgramCommands::List => {
            let programs = service.list_programs()?;
            if out.json {
                print_json(&programs)?;
            } else if out.csv {
                print_program_csv(&programs)?;
            } else if programs.is_empty() {
                println!("No programs found.");
            } else {
                print_program_table(&programs, out.header_color);
            }
        }
        cli::ProgramCommands::Show { program, active } => {
            let program_id = match (program, active) {
                (_, true) => service.resolve_active_program()?,
                (Some(selector), false) => service.resolve_program(&selector)?,
                (None, false) => anyhow::bail!("A program selector is required unless --active/--current is set."),
            };
            let detail = service.get_program_detail(program_id)?;
            let preference = service.program_unit_preference(program_id)?;
            if out.json {
                print_json(&detail.with_units(preference))?;
            } else {
                print_program_detail(&detail, preference, out.header_color);
            }
        }
    }
    Ok(())
}

fn run_workout_command(service: &AppService, out: &Output, command: cli::WorkoutCommands) -> Result<()> {
    match command {
        cli::WorkoutCommands::List { from, to, on, program, routine, limit, all } => {
            let filters = WorkoutFilters {
                from: from.as_deref(),
                to: to.as_deref(),
                on: on.as_deref(),
                program: program.as_deref(),
                routine: routine.as_deref(),
                limit: cli::effective_limit(limit, all, service.config.workout_list_limit),
            };
            let workouts = service.list_workouts(&filters)?;
            if out.json {
                print_json(&workouts)?;
            } else if out.csv {
                print_workout_csv(&workouts)?;
            } else if workouts.is_empty() {
                println!("No workouts found matching the criteria.");
            } else {
                print_workout_table(&workouts, out.header_color);
            }
        }
        cli::WorkoutCommands::Show { id } => {
            let detail = service.get_workout_detail(id)?;
            let preference = service.global_unit_preference()?;
            if out.json {
                print_json(&detail.with_units(preference))?;
            } else {
                print_workout_detail(&detail, preference, out.header_color);
            }
        }
    }
    Ok(())
}

/// Rewrites every `durationSeconds` field into `duration: {unit: "seconds", value}`.
fn annotate_durations(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(seconds) = map.remove("durationSeconds") {
                map.insert("duration".into(), json!({ "unit": "seconds", "value": seconds }));
            }
            map.values_mut().for_each(annotate_durations);
        }
        Value::Array(items) => items.iter_mut().for_each(annotate_durations),
        _ => {}
    }
}

fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let mut value = serde_json::to_value(data)?;
    annotate_durations(&mut value);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn dash<T: ToString>(value: Option<T>) -> String {
    value.map_or("-".to_string(), |v| v.to_string())
}

fn dash_f64(value: Option<f64>) -> String {
    value.map_or("-".to_string(), |v| format!("{v:.2}"))
}

fn blank<T: ToString>(value: Option<T>) -> String {
    value.map_or(String::new(), |v| v.to_string())
}

fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(total) if total >= 0.0 => {
            let total = total.round() as i64;
            format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
        }
        _ => "-".to_string(),
    }
}

fn new_table(headers: &[String], header_color: Color) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(header_color)).collect::<Vec<_>>());
    table
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn print_exercise_table(exercises: &[ExerciseSummary], header_color: Color) {
    let mut table = new_table(
        &headers(&["ID", "Name", "Equipment", "Primary Muscles", "Secondary Muscles", "Times", "Last Performed"]),
        header_color,
    );
    for exercise in exercises {
        table.add_row(vec![
            Cell::new(exercise.id),
            Cell::new(&exercise.name),
            Cell::new(exercise.equipment.as_deref().unwrap_or("-")),
            Cell::new(exercise.primary_muscles.as_deref().unwrap_or("-")),
            Cell::new(exercise.secondary_muscles.as_deref().unwrap_or("-")),
            Cell::new(exercise.times_performed),
            Cell::new(exercise.last_performed.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_exercise_csv(exercises: &[ExerciseSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID", "Name", "Equipment", "Primary_Muscles", "Secondary_Muscles", "Timer_Based",
        "Supports_1RM", "Times_Performed", "Last_Performed",
    ])?;
    for exercise in exercises {
        writer.write_record(&[
            exercise.id.to_string(),
            exercise.name.clone(),
            exercise.equipment.clone().unwrap_or_default(),
            exercise.primary_muscles.clone().unwrap_or_default(),
            exercise.secondary_muscles.clone().unwrap_or_default(),
            exercise.timer_based.to_string(),
            exercise.supports_1rm.to_string(),
            exercise.times_performed.to_string(),
            exercise.last_performed.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_exercise_detail(detail: &ExerciseDetail, preference: UnitPreference, header_color: Color) {
    println!("\n--- {} (ID {}) ---", detail.name, detail.id);
    println!("Equipment: {}", detail.equipment.as_deref().unwrap_or("-"));
    println!("Primary muscles: {}", detail.primary_muscles.as_deref().unwrap_or("-"));
    println!("Secondary muscles: {}", detail.secondary_muscles.as_deref().unwrap_or("-"));
    println!("Progress metric: {}", detail.default_progress_metric.as_deref().unwrap_or("-"));
    println!("Perception scale: {}", detail.perception_scale.as_deref().unwrap_or("-"));
    println!("Timer based: {}  Supports 1RM: {}", detail.timer_based, detail.supports_1rm);
    println!("Workouts: {}", detail.total_workouts);
    if detail.recent_routines.is_empty() {
        println!("Routines: -");
    } else {
        println!(
            "Routines ({} of {}): {}",
            detail.recent_routines.len(),
            detail.total_routines,
            detail.recent_routines.join(", ")
        );
    }
    if let Some(entry) = &detail.last_history_entry {
        println!("\nLatest session");
        print_history_table(std::slice::from_ref(entry), preference, header_color);
    }
}

fn print_snapshot(snapshot: &ExerciseSnapshot, preference: UnitPreference, header_color: Color) {
    let unit = weight_unit_label(preference);
    println!(
        "\nLast performed: {} ({})",
        snapshot.workout.date.as_deref().unwrap_or("-"),
        snapshot.workout.routine.as_deref().unwrap_or("no routine")
    );
    let mut table = new_table(
        &headers(&["Set", "Reps", &format!("Weight ({unit})"), &format!("Volume ({unit})"), "Time (s)", "RPE"]),
        header_color,
    );
    for (index, set) in snapshot.exercise.sets.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(dash(set.reps)),
            Cell::new(dash_f64(set.weight)),
            Cell::new(dash_f64(set.volume)),
            Cell::new(dash(set.time_seconds)),
            Cell::new(dash(set.rpe)),
        ]);
    }
    println!("{table}");
}

fn print_history_table(rows: &[ExerciseHistoryRow], preference: UnitPreference, header_color: Color) {
    let unit = weight_unit_label(preference);
    let mut table = new_table(
        &headers(&[
            "Workout", "Date", "Routine", "Sets", "Total Reps", "Top Reps",
            &format!("Top Weight ({unit})"), &format!("Volume ({unit})"),
        ]),
        header_color,
    );
    for row in rows {
        table.add_row(vec![
            Cell::new(row.workout_id),
            Cell::new(row.date.as_deref().unwrap_or("-")),
            Cell::new(row.routine.as_deref().unwrap_or("-")),
            Cell::new(row.set_count),
            Cell::new(row.total_reps),
            Cell::new(dash(row.top_reps)),
            Cell::new(dash_f64(row.top_weight)),
            Cell::new(dash_f64(row.volume)),
        ]);
    }
    println!("{table}");
}

fn print_history_csv(rows: &[ExerciseHistoryRow], preference: UnitPreference) -> Result<()> {
    let unit = weight_unit_label(preference);
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(&[
        "Workout_ID".to_string(),
        "Date".to_string(),
        "Routine".to_string(),
        "Sets".to_string(),
        "Total_Reps".to_string(),
        "Top_Reps".to_string(),
        format!("Top_Weight_{unit}"),
        format!("Volume_{unit}"),
    ])?;
    for row in rows {
        writer.write_record(&[
            row.workout_id.to_string(),
            row.date.clone().unwrap_or_default(),
            row.routine.clone().unwrap_or_default(),
            row.set_count.to_string(),
            row.total_reps.to_string(),
            blank(row.top_reps),
            blank(row.top_weight),
            blank(row.volume),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_history_sets_table(entries: &[ExerciseHistoryEntry], preference: UnitPreference, header_color: Color) {
    let unit = weight_unit_label(preference);
    let mut table = new_table(
        &headers(&[
            "Workout", "Date", "Set", "Reps", &format!("Weight ({unit})"),
            &format!("Volume ({unit})"), "Time (s)", "RPE",
        ]),
        header_color,
    );
    for entry in entries {
        for (index, set) in entry.sets.iter().enumerate() {
            table.add_row(vec![
                Cell::new(entry.row.workout_id),
                Cell::new(entry.row.date.as_deref().unwrap_or("-")),
                Cell::new(index + 1),
                Cell::new(dash(set.reps)),
                Cell::new(dash_f64(set.weight)),
                Cell::new(dash_f64(set.volume)),
                Cell::new(dash(set.time_seconds)),
                Cell::new(dash(set.rpe)),
            ]);
        }
    }
    println!("{table}");
}

fn print_history_sets_csv(entries: &[ExerciseHistoryEntry], preference: UnitPreference) -> Result<()> {
    let unit = weight_unit_label(preference);
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(&[
        "Workout_ID".to_string(),
        "Date".to_string(),
        "Set_ID".to_string(),
        "Reps".to_string(),
        format!("Weight_{unit}"),
        format!("Volume_{unit}"),
        "Time_Seconds".to_string(),
        "RPE".to_string(),
    ])?;
    for entry in entries {
        for set in &entry.sets {
            writer.write_record(&[
                entry.row.workout_id.to_string(),
                entry.row.date.clone().unwrap_or_default(),
                set.id.to_string(),
                blank(set.reps),
                blank(set.weight),
                blank(set.volume),
                blank(set.time_seconds),
                blank(set.rpe),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn print_program_table(programs: &[ProgramSummary], header_color: Color) {
    let mut table = new_table(&headers(&["ID", "Name", "Active", "Template", "Added"]), header_color);
    for program in programs {
        table.add_row(vec![
            Cell::new(program.id),
            Cell::new(&program.name),
            Cell::new(if program.is_active { "yes" } else { "" }),
            Cell::new(if program.is_template { "yes" } else { "" }),
            Cell::new(program.date_added.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_program_csv(programs: &[ProgramSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Name", "Active", "Template", "Date_Added"])?;
    for program in programs {
        writer.write_record(&[
            program.id.to_string(),
            program.name.clone(),
            program.is_active.to_string(),
            program.is_template.to_string(),
            program.date_added.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn add_routine_rows(table: &mut Table, week: &str, routine: &ProgramRoutine) {
    if routine.exercises.is_empty() {
        table.add_row(vec![Cell::new(week), Cell::new(&routine.name), Cell::new("-")]);
    }
    for exercise in &routine.exercises {
        for (index, set) in exercise.sets.iter().enumerate() {
            table.add_row(vec![
                Cell::new(week),
                Cell::new(&routine.name),
                Cell::new(&exercise.name),
                Cell::new(set.set_index.map_or(index as i64 + 1, |i| i)),
                Cell::new(dash(set.reps)),
                Cell::new(dash_f64(set.weight)),
                Cell::new(dash(set.time_seconds)),
                Cell::new(dash(set.rpe)),
            ]);
        }
    }
}

fn print_program_detail(detail: &ProgramDetail, preference: UnitPreference, header_color: Color) {
    let unit = weight_unit_label(preference);
    let program = &detail.program;
    println!(
        "\n--- {} (ID {}){}{} ---",
        program.name,
        program.id,
        if program.is_active { " [active]" } else { "" },
        if program.is_template { " [template]" } else { "" }
    );
    let mut table = new_table(
        &headers(&["Week", "Routine", "Exercise", "Set", "Reps", &format!("Weight ({unit})"), "Time (s)", "RPE"]),
        header_color,
    );
    for (index, week) in detail.weeks.iter().enumerate() {
        let label = format!("{}", index + 1);
        for routine in &week.routines {
            add_routine_rows(&mut table, &label, routine);
        }
    }
    for routine in &detail.unscheduled_routines {
        add_routine_rows(&mut table, "-", routine);
    }
    println!("{table}");
}

fn print_workout_table(workouts: &[WorkoutSummary], header_color: Color) {
    let mut table = new_table(&headers(&["ID", "Date", "Duration", "Program", "Routine"]), header_color);
    for workout in workouts {
        table.add_row(vec![
            Cell::new(workout.id),
            Cell::new(workout.date.as_deref().unwrap_or("-")),
            Cell::new(format_duration(workout.duration_seconds)),
            Cell::new(workout.program.as_deref().unwrap_or("-")),
            Cell::new(workout.routine.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_workout_csv(workouts: &[WorkoutSummary]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["ID", "Date", "Duration_Seconds", "Program", "Routine"])?;
    for workout in workouts {
        writer.write_record(&[
            workout.id.to_string(),
            workout.date.clone().unwrap_or_default(),
            blank(workout.duration_seconds),
            workout.program.clone().unwrap_or_default(),
            workout.routine.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_workout_detail(detail: &WorkoutDetail, preference: UnitPreference, header_color: Color) {
    let unit = weight_unit_label(preference);
    println!(
        "\n--- Workout {} on {} ---\nProgram: {}  Routine: {}  Duration: {}",
        detail.id,
        detail.date.as_deref().unwrap_or("-"),
        detail.program.as_deref().unwrap_or("-"),
        detail.routine.as_deref().unwrap_or("-"),
        format_duration(detail.duration_seconds)
    );
    let mut table = new_table(
        &headers(&["Exercise", "Set", "Reps", &format!("Weight ({unit})"), &format!("Volume ({unit})"), "Time (s)", "RPE"]),
        header_color,
    );
    for exercise in &detail.exercises {
        if exercise.sets.is_empty() {
            table.add_row(vec![Cell::new(&exercise.name), Cell::new("-")]);
        }
        for (index, set) in exercise.sets.iter().enumerate() {
            table.add_row(vec![
                Cell::new(&exercise.name),
                Cell::new(index + 1),
                Cell::new(dash(set.reps)),
                Cell::new(dash_f64(set.weight)),
                Cell::new(dash_f64(set.volume)),
                Cell::new(dash(set.time_seconds)),
                Cell::new(dash(set.rpe)),
            ]);
        }
    }
    println!("{table}");
}
