// src/cli.rs
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "liftin", author, version, about = "Read-only reports over a Liftin workout database", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Print JSON instead of tables
    #[arg(long, global = true, conflicts_with = "export_csv")]
    pub json: bool,
    /// Print list output as CSV
    #[arg(long, global = true)]
    pub export_csv: bool,
    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExerciseSortCli {
    #[default]
    Name,
    TimesPerformed,
    LastPerformed,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exercise catalogue and history
    Exercises {
        #[command(subcommand)]
        command: ExerciseCommands,
    },
    /// Training programs
    Programs {
        #[command(subcommand)]
        command: ProgramCommands,
    },
    /// Performed workouts
    Workouts {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Show the path to the database file
    DbPath,
    GenerateCompletion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExerciseCommands {
    /// List exercises
    List {
        /// Substring of the exercise name
        #[arg(long)]
        name: Option<String>,
        /// Substring of a primary or secondary muscle
        #[arg(long)]
        muscle: Option<String>,
        /// Substring of the equipment name
        #[arg(long)]
        equipment: Option<String>,
        #[arg(long, value_enum, default_value_t = ExerciseSortCli::Name)]
        sort: ExerciseSortCli,
    },
    /// Show one exercise and its most recent workout
    Show {
        /// Exercise id or name
        exercise: String,
    },
    /// Per-workout history of one exercise
    History {
        /// Exercise id or name
        exercise: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        min_reps: Option<i64>,
        #[arg(long)]
        max_reps: Option<i64>,
        /// Lower bound on the heaviest set, in the display unit
        #[arg(long)]
        min_weight: Option<f64>,
        /// Upper bound on the heaviest set, in the display unit
        #[arg(long)]
        max_weight: Option<f64>,
        /// Program id or name
        #[arg(long)]
        program: Option<String>,
        /// Routine id or name
        #[arg(long)]
        routine: Option<String>,
        /// Show at most N workouts (defaults to the configured history limit)
        #[arg(short, long, conflicts_with = "all")]
        limit: Option<u32>,
        /// Show every matching workout
        #[arg(long)]
        all: bool,
        /// Include each workout's sets
        #[arg(long)]
        sets: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProgramCommands {
    /// List programs
    List,
    /// Show a program's weeks, routines and planned sets
    Show {
        /// Program id or name
        #[arg(required_unless_present = "active", conflicts_with = "active")]
        program: Option<String>,
        /// Show the active program
        #[arg(long, visible_alias = "current")]
        active: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkoutCommands {
    /// List workouts, newest first
    List {
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// A single day (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = &["from", "to"])]
        on: Option<String>,
        /// Program id or name
        #[arg(long)]
        program: Option<String>,
        /// Routine id or name
        #[arg(long)]
        routine: Option<String>,
        /// Show at most N workouts (defaults to the configured list limit)
        #[arg(short, long, conflicts_with = "all")]
        limit: Option<u32>,
        /// Show every matching workout
        #[arg(long)]
        all: bool,
    },
    /// Show one workout (the latest when no id is given)
    Show { id: Option<i64> },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

/// `--all` wins; otherwise an explicit limit, otherwise the configured default.
pub fn effective_limit(limit: Option<u32>, all: bool, default: u32) -> Option<u32> {
    if all {
        None
    } else {
        Some(limit.unwrap_or(default))
    }
}
