use std::sync::Arc;
use std::time::Duration;

use liftsync_core::db::{
    count_pending, ConflictRepository, LibSqlSyncStateRepository, SyncStateRepository,
};
use liftsync_core::sync::{SyncResult, SyncScheduler, SyncTrigger, UserSync};
use serde::Serialize;

use crate::commands::common::{
    format_sync_conflict_lines, format_sync_timestamp, sync_conflict_to_item, CliContext,
    SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(context: &CliContext, full: bool, as_json: bool) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let engine = context.engine().await?;

    let result = if full {
        engine.sync_all(&user_id).await
    } else {
        engine.sync(&user_id).await
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_sync_result_lines(&result) {
            println!("{line}");
        }
    }

    check_result(&result)
}

/// Map a finished cycle to the process outcome.
pub fn check_result(result: &SyncResult) -> Result<(), CliError> {
    if result.has_auth_failure() {
        return Err(CliError::AuthRejected);
    }
    let failed = result.iter().filter(|(_, report)| !report.is_ok()).count();
    if failed > 0 {
        return Err(CliError::SyncIncomplete(failed));
    }
    Ok(())
}

pub fn format_sync_result_lines(result: &SyncResult) -> Vec<String> {
    let mut lines = result
        .iter()
        .map(|(kind, report)| {
            let mut line = format!(
                "{:<20} pushed {:>3}  pulled {:>3}  deleted {:>3}",
                kind.as_str(),
                report.pushed,
                report.pulled,
                report.deleted
            );
            if let Some(error) = &report.error {
                line.push_str("  error: ");
                line.push_str(error);
            }
            line
        })
        .collect::<Vec<_>>();
    lines.push(format!("Sync completed: {result}"));
    lines
}

#[derive(Debug, Serialize)]
pub struct StatusItem {
    pub kind: String,
    pub pending: u64,
    pub cursor: Option<i64>,
    pub last_synced_at: Option<i64>,
}

pub async fn collect_status(context: &CliContext) -> Result<Vec<StatusItem>, CliError> {
    let user_id = context.user_id()?;
    let db = context.open_database().await?;
    let statuses = LibSqlSyncStateRepository::new(db.connection())
        .statuses(&user_id)
        .await?;

    let mut items = Vec::with_capacity(statuses.len());
    for status in statuses {
        items.push(StatusItem {
            kind: status.kind.to_string(),
            pending: count_pending(db.connection(), status.kind, &user_id).await?,
            cursor: status.cursor,
            last_synced_at: status.last_synced_at,
        });
    }
    Ok(items)
}

pub async fn run_status(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let items = collect_status(context).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for item in &items {
        let last = item
            .last_synced_at
            .map_or_else(|| "never".to_string(), format_sync_timestamp);
        println!(
            "{:<20} pending {:>3}  last synced {last}",
            item.kind, item.pending
        );
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    context: &CliContext,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let db = context.open_database().await?;
    let conflicts = ConflictRepository::new(db.connection())
        .list_conflicts(limit)
        .await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

/// Sync on start and then periodically until Ctrl-C.
pub async fn run_watch(context: &CliContext, interval: Option<u64>) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let engine = Arc::new(context.engine().await?);
    let interval = interval.map_or(engine.config().sync_interval, Duration::from_secs);

    let trigger = SyncTrigger::new(UserSync::new(engine, user_id));
    let mut results = trigger.runner().subscribe();
    let scheduler = SyncScheduler::start(&trigger, interval, None);
    tracing::info!("Watching; syncing every {}s", interval.as_secs());

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = results.borrow_and_update().clone();
                if let Some(result) = latest {
                    println!("{result}");
                    if result.has_auth_failure() {
                        return Err(CliError::AuthRejected);
                    }
                }
            }
        }
    }

    scheduler.shutdown();
    trigger.wait_idle().await;
    Ok(())
}
