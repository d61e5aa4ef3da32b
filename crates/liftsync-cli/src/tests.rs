use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use liftsync_core::config::RemoteConfig;
use liftsync_core::db::EntityRepository;
use liftsync_core::models::{EntityKind, Record, ScheduledTraining, SyncConflict, Workout};
use liftsync_core::sync::{EntitySyncReport, FailureKind, SyncResult};
use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use crate::cli::{Cli, CompletionShell, Commands, WorkoutCommands};
use crate::commands::common::{
    format_sync_conflict_lines, format_sync_timestamp, join_name, normalize_identifier,
    resolve_record, CliContext,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{merge_config_init, run_config_init, ConfigInit};
use crate::commands::schedule::format_upcoming_lines;
use crate::commands::sync::{check_result, collect_status, format_sync_result_lines};
use crate::commands::workout::{self, format_workout_lines};
use crate::error::CliError;

const USER: &str = "user-1";

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn test_context() -> (TempDir, CliContext) {
    let dir = tempdir().unwrap();
    let context = CliContext {
        config_path: dir.path().join("config.json"),
        config: RemoteConfig {
            user_id: Some(USER.to_string()),
            ..RemoteConfig::default()
        },
        db_path: dir.path().join("liftsync.db"),
    };
    (dir, context)
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_sync_flags() {
    let cli = Cli::try_parse_from(["liftsync", "sync", "--full", "--json"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Sync {
            full: true,
            json: true
        }
    ));
}

#[test]
fn parses_workout_add_with_date() {
    let cli = Cli::try_parse_from([
        "liftsync",
        "--db-path",
        "/tmp/test.db",
        "workout",
        "add",
        "Leg",
        "day",
        "--date",
        "2024-06-01",
        "--duration",
        "45",
    ])
    .unwrap();

    assert_eq!(
        cli.db_path.as_deref(),
        Some(std::path::Path::new("/tmp/test.db"))
    );
    match cli.command {
        Commands::Workout {
            command:
                WorkoutCommands::Add {
                    name,
                    date,
                    duration,
                    ..
                },
        } => {
            assert_eq!(name, vec!["Leg".to_string(), "day".to_string()]);
            assert_eq!(date, Some(day(2024, 6, 1)));
            assert_eq!(duration, Some(45));
        }
        _ => panic!("expected workout add"),
    }
}

#[test]
fn rejects_malformed_dates() {
    let result = Cli::try_parse_from(["liftsync", "schedule", "add", "Run", "--date", "June 1"]);
    assert!(result.is_err());
}

#[test]
fn join_name_trims_and_rejects_blank() {
    assert_eq!(
        join_name(&["  Squat".to_string(), "day ".to_string()]).unwrap(),
        "Squat day"
    );
    assert!(matches!(join_name(&[" ".to_string()]), Err(CliError::EmptyName)));
    assert!(matches!(join_name(&[]), Err(CliError::EmptyName)));
}

#[test]
fn normalize_identifier_lowercases_and_rejects_empty() {
    assert_eq!(normalize_identifier(" 0190ABC ").unwrap(), "0190abc");
    assert!(matches!(normalize_identifier("  "), Err(CliError::EmptyId)));
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_sync_conflict_lines_include_key_fields() {
    let conflicts = vec![SyncConflict {
        id: 1,
        kind: EntityKind::Goal,
        row_id: "11111111-1111-7111-8111-111111111111".to_string(),
        local_modified_at: 200,
        incoming_modified_at: 100,
        resolved_at: 300,
        strategy: "lww".to_string(),
    }];

    let rendered = format_sync_conflict_lines(&conflicts);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("lww"));
    assert!(rendered[0].contains("goal=11111111-1111-7111-8111-111111111111"));
    assert!(rendered[0].contains("local=200"));
    assert!(rendered[0].contains("incoming=100"));
}

#[test]
fn sync_result_maps_to_exit_status() {
    let mut ok = SyncResult::default();
    for kind in EntityKind::ALL {
        ok.insert(kind, EntitySyncReport::default());
    }
    assert!(check_result(&ok).is_ok());

    let lines = format_sync_result_lines(&ok);
    assert_eq!(lines.len(), EntityKind::ALL.len() + 1);
    assert_eq!(
        lines.last().map(String::as_str),
        Some("Sync completed: pushed 0, pulled 0, deleted 0")
    );

    let mut failed = ok.clone();
    failed.insert(
        EntityKind::Cycle,
        EntitySyncReport {
            error: Some("Network error: offline".to_string()),
            failure: Some(FailureKind::Transient),
            ..EntitySyncReport::default()
        },
    );
    assert!(matches!(check_result(&failed), Err(CliError::SyncIncomplete(1))));
    assert!(format_sync_result_lines(&failed)
        .iter()
        .any(|line| line.starts_with("cycle") && line.contains("error: Network error")));

    failed.insert(
        EntityKind::Goal,
        EntitySyncReport {
            error: Some("expired".to_string()),
            failure: Some(FailureKind::Unauthorized),
            ..EntitySyncReport::default()
        },
    );
    assert!(matches!(check_result(&failed), Err(CliError::AuthRejected)));
}

#[test]
fn merge_config_init_keeps_unset_values() {
    let existing = RemoteConfig {
        supabase_url: Some("https://old.supabase.co".to_string()),
        access_token: Some("token-secret".to_string()),
        ..RemoteConfig::default()
    };

    let merged = merge_config_init(
        existing,
        ConfigInit {
            supabase_url: Some("https://new.supabase.co/".to_string()),
            user_id: Some(" user-9 ".to_string()),
            access_token: Some("   ".to_string()),
            ..ConfigInit::default()
        },
    )
    .unwrap();

    assert_eq!(merged.supabase_url.as_deref(), Some("https://new.supabase.co"));
    assert_eq!(merged.user_id.as_deref(), Some("user-9"));
    assert_eq!(merged.access_token.as_deref(), Some("token-secret"));
}

#[test]
fn merge_config_init_requires_http_scheme() {
    let result = merge_config_init(
        RemoteConfig::default(),
        ConfigInit {
            supabase_url: Some("project.supabase.co".to_string()),
            ..ConfigInit::default()
        },
    );
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[test]
fn config_init_writes_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    run_config_init(
        &path,
        ConfigInit {
            supabase_url: Some("https://demo.supabase.co".to_string()),
            supabase_anon_key: Some("anon-secret".to_string()),
            access_token: Some("token-secret".to_string()),
            user_id: Some(USER.to_string()),
            request_timeout: Some(5),
            ..ConfigInit::default()
        },
    )
    .unwrap();

    let loaded = RemoteConfig::load(&path).unwrap();
    assert_eq!(loaded.user_id.as_deref(), Some(USER));
    assert_eq!(loaded.request_timeout_secs, Some(5));
    assert!(loaded.endpoint().is_ok());
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("liftsync"));
}

#[test]
fn upcoming_lines_label_today() {
    let today = day(2024, 6, 10);
    let records = vec![
        Record {
            id: liftsync_core::EntityId::new(),
            owner_id: USER.to_string(),
            modified_at: 1,
            pending_sync: true,
            state: liftsync_core::models::RowState::Active(ScheduledTraining::new("Squats", today)),
        },
        Record {
            id: liftsync_core::EntityId::new(),
            owner_id: USER.to_string(),
            modified_at: 1,
            pending_sync: false,
            state: liftsync_core::models::RowState::Active(ScheduledTraining::new(
                "Bench",
                day(2024, 6, 12),
            )),
        },
    ];

    let lines = format_upcoming_lines(&records, today);
    assert!(lines[0].contains("today") && lines[0].contains("Squats") && lines[0].ends_with(" *"));
    assert!(lines[1].contains("2024-06-12") && lines[1].ends_with("Bench"));
}

#[tokio::test(flavor = "multi_thread")]
async fn workout_commands_round_trip_through_local_store() {
    let (_dir, context) = test_context();

    workout::run_add(&context, &["Pull".to_string()], Some(day(2024, 6, 3)), None, Some(40))
        .await
        .unwrap();
    workout::run_add(&context, &["Push".to_string()], Some(day(2024, 6, 4)), None, None)
        .await
        .unwrap();

    let db = context.open_database().await.unwrap();
    let repo = EntityRepository::<Workout>::new(db.connection());
    let records = repo.list(USER).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.pending_sync));

    let lines = format_workout_lines(&records);
    assert!(lines.iter().any(|line| line.contains("Pull (40 min) *")));

    let pull = records
        .iter()
        .find(|record| record.entity().is_some_and(|w| w.name == "Pull"))
        .unwrap();
    workout::run_delete(&context, &pull.id.as_str()).await.unwrap();

    let remaining = repo.list(USER).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].entity().unwrap().name, "Push");
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_record_matches_prefixes() {
    let (_dir, context) = test_context();
    let db = context.open_database().await.unwrap();
    let repo = EntityRepository::<Workout>::new(db.connection());
    let first = repo
        .create(USER, Workout::new("A", day(2024, 6, 5)))
        .await
        .unwrap();
    repo.create(USER, Workout::new("B", day(2024, 6, 5)))
        .await
        .unwrap();

    let id = first.id.as_str();
    let by_full = resolve_record(&repo, USER, &id).await.unwrap();
    assert_eq!(by_full.id, first.id);

    let by_prefix = resolve_record(&repo, USER, &id[..30]).await.unwrap();
    assert_eq!(by_prefix.id, first.id);

    assert!(matches!(
        resolve_record(&repo, USER, "ffffffff").await,
        Err(CliError::NotFound(_))
    ));
    // UUIDv7 ids lead with their creation time, so both start with "0".
    assert!(matches!(
        resolve_record(&repo, USER, "0").await,
        Err(CliError::AmbiguousId(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_pending_counts_per_kind() {
    let (_dir, context) = test_context();
    workout::run_add(&context, &["Run".to_string()], None, None, None)
        .await
        .unwrap();

    let items = collect_status(&context).await.unwrap();
    assert_eq!(items.len(), EntityKind::ALL.len());

    let workouts = items.iter().find(|item| item.kind == "workout").unwrap();
    assert_eq!(workouts.pending, 1);
    assert_eq!(workouts.last_synced_at, None);
    assert!(items
        .iter()
        .filter(|item| item.kind != "workout")
        .all(|item| item.pending == 0));
}
