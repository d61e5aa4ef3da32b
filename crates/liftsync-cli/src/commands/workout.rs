use chrono::NaiveDate;
use liftsync_core::db::EntityRepository;
use liftsync_core::models::{Record, Workout};
use liftsync_core::util::{normalize_text_option, today_utc};
use serde::Serialize;

use crate::commands::common::{join_name, pending_marker, resolve_record, short_id, CliContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct WorkoutListItem {
    pub id: String,
    pub name: String,
    pub performed_on: NaiveDate,
    pub notes: Option<String>,
    pub duration_minutes: Option<i64>,
    pub modified_at: i64,
    pub pending_sync: bool,
}

pub fn workout_to_item(record: &Record<Workout>) -> Option<WorkoutListItem> {
    record.entity().map(|workout| WorkoutListItem {
        id: record.id.as_str(),
        name: workout.name.clone(),
        performed_on: workout.performed_on,
        notes: workout.notes.clone(),
        duration_minutes: workout.duration_minutes,
        modified_at: record.modified_at,
        pending_sync: record.pending_sync,
    })
}

pub fn format_workout_lines(records: &[Record<Workout>]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| {
            let workout = record.entity()?;
            let duration = workout
                .duration_minutes
                .map(|minutes| format!(" ({minutes} min)"))
                .unwrap_or_default();
            Some(format!(
                "{}  {}  {}{duration}{}",
                short_id(&record.id.as_str()),
                workout.performed_on,
                workout.name,
                pending_marker(record.pending_sync)
            ))
        })
        .collect()
}

pub async fn run_add(
    context: &CliContext,
    name_parts: &[String],
    date: Option<NaiveDate>,
    notes: Option<String>,
    duration: Option<i64>,
) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let mut workout = Workout::new(join_name(name_parts)?, date.unwrap_or_else(today_utc));
    workout.notes = normalize_text_option(notes);
    workout.duration_minutes = duration;

    let db = context.open_database().await?;
    let record = EntityRepository::new(db.connection())
        .create(&user_id, workout)
        .await?;

    println!("{}", record.id);
    Ok(())
}

pub async fn run_list(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let db = context.open_database().await?;
    let mut records = EntityRepository::<Workout>::new(db.connection())
        .list(&user_id)
        .await?;
    records.sort_by(|a, b| {
        let date = |record: &Record<Workout>| record.entity().map(|workout| workout.performed_on);
        date(b).cmp(&date(a)).then(b.modified_at.cmp(&a.modified_at))
    });

    if as_json {
        let json_items = records
            .iter()
            .filter_map(workout_to_item)
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_workout_lines(&records) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_delete(context: &CliContext, id: &str) -> Result<(), CliError> {
    let user_id = context.user_id()?;
    let db = context.open_database().await?;
    let repo = EntityRepository::<Workout>::new(db.connection());
    let record = resolve_record(&repo, &user_id, id).await?;

    repo.delete(&record.id).await?;
    println!("{}", record.id);
    Ok(())
}
