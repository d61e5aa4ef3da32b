use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "liftsync")]
#[command(about = "Training log with offline-first sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push local changes and pull remote ones
    Sync {
        /// Ignore stored cursors and fetch every remote row
        #[arg(long)]
        full: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show pending changes and last sync per entity kind
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the foreground until interrupted
    Watch {
        /// Seconds between periodic syncs (config value when omitted)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Log and manage workouts
    Workout {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Plan trainings
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum WorkoutCommands {
    /// Log a workout
    #[command(alias = "new")]
    Add {
        /// Workout name
        name: Vec<String>,
        /// Day performed, YYYY-MM-DD (today when omitted)
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Duration in minutes
        #[arg(long, value_name = "MINUTES")]
        duration: Option<i64>,
    },
    /// List workouts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a workout
    Delete {
        /// Workout ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Plan a training for a day
    Add {
        /// Training title
        title: Vec<String>,
        /// Planned day, YYYY-MM-DD
        #[arg(long, value_name = "DATE")]
        date: NaiveDate,
    },
    /// List trainings planned for today or later
    Upcoming {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Access token of the signed-in user
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// Id of the signed-in user
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Seconds between periodic syncs
        #[arg(long, value_name = "SECS")]
        sync_interval: Option<u64>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout: Option<u64>,
    },
    /// Print the effective config with credentials redacted
    Show,
}
