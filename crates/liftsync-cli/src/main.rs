//! liftsync CLI - training log from the command line
//!
//! Logs workouts into the local store and syncs it with the remote backend.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, ScheduleCommands, WorkoutCommands};
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::sync::{run_status, run_sync, run_sync_conflicts, run_watch};
use crate::commands::{schedule, workout};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "liftsync=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = CliContext::load(cli.config, cli.db_path)?;

    match cli.command {
        Commands::Sync { full, json } => run_sync(&context, full, json).await?,
        Commands::Status { json } => run_status(&context, json).await?,
        Commands::Conflicts { limit, json } => run_sync_conflicts(&context, limit, json).await?,
        Commands::Watch { interval } => run_watch(&context, interval).await?,
        Commands::Workout { command } => match command {
            WorkoutCommands::Add {
                name,
                date,
                notes,
                duration,
            } => workout::run_add(&context, &name, date, notes, duration).await?,
            WorkoutCommands::List { json } => workout::run_list(&context, json).await?,
            WorkoutCommands::Delete { id } => workout::run_delete(&context, &id).await?,
        },
        Commands::Schedule { command } => match command {
            ScheduleCommands::Add { title, date } => {
                schedule::run_add(&context, &title, date).await?;
            }
            ScheduleCommands::Upcoming { json } => schedule::run_upcoming(&context, json).await?,
        },
        Commands::Config { command } => run_config(command, &context)?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
