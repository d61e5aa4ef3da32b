use chrono::NaiveDate;
use liftsync_core::db::EntityRepository;
use liftsync_core::models::{Record, ScheduledTraining};
use liftsync_core::util::today_utc;
use serde::Serialize;

use crate::commands::common::{join_name, pending_marker, short_id, CliContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ScheduledItem {
    pub id: String,
    pub title: String,
    pub scheduled_on: NaiveDate,
    pub completed: bool,
    pub pending_sync: bool,
}

fn to_item(record: &Record<ScheduledTraining>) -> Option<ScheduledItem> {
    record.entity().map(|training| ScheduledItem {
        id: record.id.as_str(),
        title: training.title.clone(),
        scheduled_on: training.scheduled_on,
        completed: training.completed,
        pending_sync: record.pending_sync,
    })
}

pub fn format_upcoming_lines(
    records: &[Record<ScheduledTraining>],
    today: NaiveDate,
) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| {
            let training = record.entity()?;
            let day = if training.scheduled_on == today {
                "today".to_string()
            } else {
                training.scheduled_on.to_string()
            };
            Some(format!(
                "{}  {day:<10}  {}{}",
                short_id(&record.id.as_str()),
                training.title,
                pending_marker(record.pending_sync)
            ))
        })
        .collect()
}

pub async fn run_add(
    context: &CliContext,
    title_parts: &[String],
    date: NaiveDate,
) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let db = context.open_database().await?;
    let record = EntityRepository::new(db.connection())
        .create(&user_id, ScheduledTraining::new(join_name(title_parts)?, date))
        .await?;

    println!("{}", record.id);
    Ok(())
}

pub async fn run_upcoming(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let today = today_utc();
    let db = context.open_database().await?;
    let records = EntityRepository::<ScheduledTraining>::new(db.connection())
        .list_upcoming(&user_id, today)
        .await?;

    if as_json {
        let json_items = records.iter().filter_map(to_item).collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("Nothing planned.");
    } else {
        for line in format_upcoming_lines(&records, today) {
            println!("{line}");
        }
    }
    Ok(())
}
