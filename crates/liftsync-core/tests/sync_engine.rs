//! Integration tests for the sync engine against an in-memory backend.
//!
//! Each `Device` is an independent local store; devices that share a
//! `MemoryBackend` behave like two installs signed in as the same user.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use liftsync_core::config::SyncConfig;
use liftsync_core::db::{
    ConflictRepository, Database, EntityRepository, LibSqlSyncStateRepository,
    SyncStateRepository,
};
use liftsync_core::models::{
    EntityKind, Goal, Record, RemoteRow, ScheduledTraining, SyncEntity, Workout,
};
use liftsync_core::sync::{
    FailureKind, MemoryBackend, RemoteError, SyncEngine, SyncTrigger, TriggerOutcome,
    TriggerReason, UserSync,
};
use liftsync_core::util::today_utc;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const USER: &str = "user-1";

struct Device {
    engine: Arc<SyncEngine<Arc<MemoryBackend>>>,
}

impl Device {
    async fn new(backend: &Arc<MemoryBackend>) -> Self {
        Self::with_config(backend, SyncConfig::default()).await
    }

    async fn with_config(backend: &Arc<MemoryBackend>, config: SyncConfig) -> Self {
        let database = Arc::new(Database::open_in_memory().await.unwrap());
        Self {
            engine: Arc::new(SyncEngine::new(database, Arc::clone(backend), config)),
        }
    }

    fn repo<E: SyncEntity>(&self) -> EntityRepository<'_, E> {
        EntityRepository::new(self.engine.database().connection())
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn goal(title: &str) -> Goal {
    Goal {
        title: title.to_string(),
        target_value: 100.0,
        unit: "kg".to_string(),
        deadline: Some(day(2024, 12, 31)),
        achieved: false,
    }
}

fn remote_json<E: SyncEntity>(record: &Record<E>, modified_at: i64, data: E) -> serde_json::Value {
    RemoteRow {
        id: record.id,
        owner_id: record.owner_id.clone(),
        modified_at,
        data,
    }
    .to_json()
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_create_push_pull_round_trip() {
    let backend = Arc::new(MemoryBackend::new());
    let phone = Device::new(&backend).await;
    let laptop = Device::new(&backend).await;

    let workout = phone
        .repo::<Workout>()
        .create(USER, Workout::new("Squat day", day(2024, 6, 1)))
        .await
        .unwrap();
    assert!(workout.pending_sync);

    let result = phone.engine.sync(USER).await;
    assert!(result.is_ok());
    assert_eq!(result.get(EntityKind::Workout).unwrap().pushed, 1);

    let remote = backend
        .row(EntityKind::Workout, &workout.id.as_str())
        .expect("workout should be on the backend");
    assert_eq!(remote["name"], "Squat day");
    assert_eq!(remote["owner_id"], USER);
    assert_eq!(remote["performed_on"], "2024-06-01");
    assert!(!phone
        .repo::<Workout>()
        .get(&workout.id)
        .await
        .unwrap()
        .unwrap()
        .pending_sync);

    let result = laptop.engine.sync(USER).await;
    assert_eq!(result.get(EntityKind::Workout).unwrap().pulled, 1);
    let pulled = laptop
        .repo::<Workout>()
        .get(&workout.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pulled.entity(), workout.entity());
    assert_eq!(pulled.modified_at, workout.modified_at);
    assert!(!pulled.pending_sync);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_sync_without_mutations_is_a_no_op() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;

    device
        .repo::<Workout>()
        .create(USER, Workout::new("Bench", day(2024, 6, 2)))
        .await
        .unwrap();
    device.repo::<Goal>().create(USER, goal("Bench 100")).await.unwrap();
    device
        .repo::<ScheduledTraining>()
        .create(USER, ScheduledTraining::new("Deadlift", day(2024, 6, 3)))
        .await
        .unwrap();

    let first = device.engine.sync(USER).await;
    assert!(first.is_ok());
    assert_eq!(first.total_pushed(), 3);

    let second = device.engine.sync(USER).await;
    assert!(second.is_ok());
    for (kind, report) in second.iter() {
        assert_eq!(
            (report.pushed, report.pulled, report.deleted),
            (0, 0, 0),
            "{kind}"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deletion_converges_across_devices() {
    let backend = Arc::new(MemoryBackend::new());
    let a = Device::new(&backend).await;
    let b = Device::new(&backend).await;

    let x = a
        .repo::<Workout>()
        .create(USER, Workout::new("Shared", day(2024, 6, 4)))
        .await
        .unwrap();
    a.engine.sync(USER).await;
    b.engine.sync(USER).await;
    assert!(b.repo::<Workout>().get(&x.id).await.unwrap().is_some());

    a.repo::<Workout>().delete(&x.id).await.unwrap();
    let result = a.engine.sync(USER).await;
    assert_eq!(result.get(EntityKind::Workout).unwrap().pushed, 1);
    assert!(backend.row(EntityKind::Workout, &x.id.as_str()).is_none());
    assert_eq!(a.repo::<Workout>().count_pending(USER).await.unwrap(), 0);

    let result = b.engine.sync(USER).await;
    assert_eq!(result.get(EntityKind::Workout).unwrap().deleted, 1);
    assert!(b.repo::<Workout>().get(&x.id).await.unwrap().is_none());
    assert!(b.repo::<Workout>().list(USER).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deletion_detection_spares_rows_with_unpushed_changes() {
    let backend = Arc::new(MemoryBackend::new());
    let a = Device::new(&backend).await;
    let b = Device::new(&backend).await;

    let x = a
        .repo::<Workout>()
        .create(USER, Workout::new("Contested", day(2024, 6, 5)))
        .await
        .unwrap();
    a.engine.sync(USER).await;
    b.engine.sync(USER).await;

    a.repo::<Workout>().delete(&x.id).await.unwrap();
    a.engine.sync(USER).await;

    b.repo::<Workout>()
        .update(&x.id, |workout| workout.notes = Some("edited offline".to_string()))
        .await
        .unwrap();
    backend.fail_row(x.id.as_str());

    let result = b.engine.sync(USER).await;
    let report = result.get(EntityKind::Workout).unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.failure, Some(FailureKind::Transient));

    let kept = b.repo::<Workout>().get(&x.id).await.unwrap().unwrap();
    assert!(kept.pending_sync);
    assert_eq!(
        kept.entity().unwrap().notes.as_deref(),
        Some("edited offline")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pull_never_overwrites_rows_with_unpushed_changes() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;

    let local = device
        .repo::<Goal>()
        .create(USER, goal("Local wording"))
        .await
        .unwrap();
    backend.fail_row(local.id.as_str());
    backend.put_row(
        EntityKind::Goal,
        remote_json(&local, local.modified_at + 60_000, goal("Remote wording")),
    );

    let result = device.engine.sync(USER).await;
    assert_eq!(result.get(EntityKind::Goal).unwrap().pulled, 0);

    let kept = device.repo::<Goal>().get(&local.id).await.unwrap().unwrap();
    assert_eq!(kept, local);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_echo_of_unacknowledged_push_is_not_a_conflict() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;

    let local = device
        .repo::<Goal>()
        .create(USER, goal("Deadlift 200"))
        .await
        .unwrap();
    // The server stored the row but the push reported a failure.
    backend.fail_row(local.id.as_str());
    backend.put_row(
        EntityKind::Goal,
        remote_json(&local, local.modified_at, goal("Deadlift 200")),
    );

    let result = device.engine.sync(USER).await;
    let report = result.get(EntityKind::Goal).unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.pulled, 0);

    let conflicts = ConflictRepository::new(device.engine.database().connection())
        .list_conflicts(10)
        .await
        .unwrap();
    assert!(conflicts.is_empty());

    let kept = device.repo::<Goal>().get(&local.id).await.unwrap().unwrap();
    assert_eq!(kept, local);
    assert!(kept.pending_sync);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mutation_during_push_stays_pending() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;

    let record = device
        .repo::<Workout>()
        .create(USER, Workout::new("Before", day(2024, 6, 6)))
        .await
        .unwrap();

    backend.set_latency(Some(Duration::from_millis(300)));
    let engine = Arc::clone(&device.engine);
    let running = tokio::spawn(async move { engine.sync(USER).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let edited = device
        .repo::<Workout>()
        .update(&record.id, |workout| workout.name = "During".to_string())
        .await
        .unwrap();
    running.await.unwrap();

    let after = device.repo::<Workout>().get(&record.id).await.unwrap().unwrap();
    assert!(after.pending_sync);
    assert_eq!(after.entity().unwrap().name, "During");
    assert_eq!(after.modified_at, edited.modified_at);

    backend.set_latency(None);
    device.engine.sync(USER).await;
    assert_eq!(
        backend.row(EntityKind::Workout, &record.id.as_str()).unwrap()["name"],
        "During"
    );
    assert!(!device
        .repo::<Workout>()
        .get(&record.id)
        .await
        .unwrap()
        .unwrap()
        .pending_sync);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_conflicts_resolve_by_newest_timestamp_and_ties_keep_local() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;

    let local = device
        .repo::<Goal>()
        .create(USER, goal("Local"))
        .await
        .unwrap();
    device.engine.sync(USER).await;
    let t1 = local.modified_at;

    // Older remote write loses.
    backend.put_row(EntityKind::Goal, remote_json(&local, t1 - 5, goal("Older")));
    device.engine.sync_all(USER).await;
    let stored = device.repo::<Goal>().get(&local.id).await.unwrap().unwrap();
    assert_eq!(stored.entity().unwrap().title, "Local");
    assert_eq!(stored.modified_at, t1);

    // Tie keeps the local payload.
    backend.put_row(EntityKind::Goal, remote_json(&local, t1, goal("Tied")));
    device.engine.sync_all(USER).await;
    let stored = device.repo::<Goal>().get(&local.id).await.unwrap().unwrap();
    assert_eq!(stored.entity().unwrap().title, "Local");

    // Newer remote write wins.
    backend.put_row(EntityKind::Goal, remote_json(&local, t1 + 5, goal("Newer")));
    let result = device.engine.sync(USER).await;
    assert_eq!(result.get(EntityKind::Goal).unwrap().pulled, 1);
    let stored = device.repo::<Goal>().get(&local.id).await.unwrap().unwrap();
    assert_eq!(stored.entity().unwrap().title, "Newer");
    assert_eq!(stored.modified_at, t1 + 5);

    let conflicts = ConflictRepository::new(device.engine.database().connection())
        .list_conflicts(10)
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, EntityKind::Goal);
    assert_eq!(conflicts[0].local_modified_at, t1);
    assert_eq!(conflicts[0].incoming_modified_at, t1 - 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_triggers_during_a_sync_coalesce_into_one_rerun() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;
    backend.set_latency(Some(Duration::from_millis(100)));

    let trigger = SyncTrigger::new(UserSync::new(Arc::clone(&device.engine), USER));
    let mut results = trigger.runner().subscribe();

    assert_eq!(trigger.fire(TriggerReason::AppStart), TriggerOutcome::Started);
    for reason in [
        TriggerReason::Mutation,
        TriggerReason::Mutation,
        TriggerReason::Foreground,
        TriggerReason::NetworkReconnect,
        TriggerReason::Periodic,
    ] {
        assert_eq!(trigger.fire(reason), TriggerOutcome::Coalesced);
    }

    trigger.wait_idle().await;
    assert_eq!(trigger.run_count(), 2);

    // Each cycle lists ids once per kind.
    let per_cycle = EntityKind::ALL.len() as u64;
    assert_eq!(backend.call_counts().list_ids, 2 * per_cycle);

    assert!(results.has_changed().unwrap());
    assert!(results.borrow_and_update().as_ref().unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mutation_hook_schedules_a_sync() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;
    let trigger = SyncTrigger::new(UserSync::new(Arc::clone(&device.engine), USER));

    let repo = device.repo::<Workout>().with_hook(trigger.mutation_hook());
    let record = repo
        .create(USER, Workout::new("Hooked", day(2024, 6, 7)))
        .await
        .unwrap();

    trigger.wait_idle().await;
    assert!(trigger.run_count() >= 1);
    assert!(backend.row(EntityKind::Workout, &record.id.as_str()).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upcoming_trainings_include_today_after_sync() {
    let backend = Arc::new(MemoryBackend::new());
    let planner = Device::new(&backend).await;
    let phone = Device::new(&backend).await;
    let today = today_utc();

    let repo = planner.repo::<ScheduledTraining>();
    repo.create(USER, ScheduledTraining::new("Past", today.pred_opt().unwrap()))
        .await
        .unwrap();
    let due = repo
        .create(USER, ScheduledTraining::new("Due today", today))
        .await
        .unwrap();
    planner.engine.sync(USER).await;
    phone.engine.sync(USER).await;

    let upcoming = phone
        .repo::<ScheduledTraining>()
        .list_upcoming(USER, today)
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].id, due.id);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_auth_failure_is_isolated_to_its_kind() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;

    let rejected = device.repo::<Goal>().create(USER, goal("Blocked")).await.unwrap();
    device
        .repo::<Workout>()
        .create(USER, Workout::new("Allowed", day(2024, 6, 8)))
        .await
        .unwrap();
    backend.reject_kind(
        EntityKind::Goal,
        RemoteError::Unauthorized("JWT expired".to_string()),
    );

    let result = device.engine.sync(USER).await;
    let goals = result.get(EntityKind::Goal).unwrap();
    assert_eq!(goals.failure, Some(FailureKind::Unauthorized));
    assert!(goals.error.as_deref().unwrap().contains("JWT expired"));
    assert_eq!(goals.pushed, 0);
    assert!(result.has_auth_failure());

    let workouts = result.get(EntityKind::Workout).unwrap();
    assert!(workouts.is_ok());
    assert_eq!(workouts.pushed, 1);

    let state = LibSqlSyncStateRepository::new(device.engine.database().connection());
    assert_eq!(state.last_synced(USER, EntityKind::Goal).await.unwrap(), None);
    assert!(state
        .last_synced(USER, EntityKind::Workout)
        .await
        .unwrap()
        .is_some());
    assert!(device
        .repo::<Goal>()
        .get(&rejected.id)
        .await
        .unwrap()
        .unwrap()
        .pending_sync);

    backend.clear_rejections();
    let retry = device.engine.sync(USER).await;
    assert_eq!(retry.get(EntityKind::Goal).unwrap().pushed, 1);
    assert!(retry.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_row_push_failure_does_not_abort_the_batch() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::new(&backend).await;
    let repo = device.repo::<Workout>();

    let first = repo
        .create(USER, Workout::new("One", day(2024, 6, 9)))
        .await
        .unwrap();
    let broken = repo
        .create(USER, Workout::new("Two", day(2024, 6, 9)))
        .await
        .unwrap();
    let third = repo
        .create(USER, Workout::new("Three", day(2024, 6, 9)))
        .await
        .unwrap();
    backend.fail_row(broken.id.as_str());

    let result = device.engine.sync(USER).await;
    let report = result.get(EntityKind::Workout).unwrap();
    assert_eq!(report.pushed, 2);
    assert_eq!(report.failure, Some(FailureKind::Transient));

    assert!(!repo.get(&first.id).await.unwrap().unwrap().pending_sync);
    assert!(repo.get(&broken.id).await.unwrap().unwrap().pending_sync);
    assert!(!repo.get(&third.id).await.unwrap().unwrap().pending_sync);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeouts_and_outages_leave_rows_pending() {
    let backend = Arc::new(MemoryBackend::new());
    let device = Device::with_config(
        &backend,
        SyncConfig::default().with_request_timeout(Duration::from_millis(100)),
    )
    .await;
    let record = device
        .repo::<Workout>()
        .create(USER, Workout::new("Offline", day(2024, 6, 10)))
        .await
        .unwrap();

    backend.set_latency(Some(Duration::from_secs(1)));
    let result = device.engine.sync(USER).await;
    let report = result.get(EntityKind::Workout).unwrap();
    assert_eq!(report.failure, Some(FailureKind::Transient));
    assert!(report.error.as_deref().unwrap().contains("timed out"));
    backend.set_latency(None);

    backend.set_offline(true);
    let result = device.engine.sync(USER).await;
    assert!(!result.is_ok());
    assert!(result
        .iter()
        .all(|(_, report)| report.failure == Some(FailureKind::Transient)));
    assert!(device
        .repo::<Workout>()
        .get(&record.id)
        .await
        .unwrap()
        .unwrap()
        .pending_sync);

    backend.set_offline(false);
    let result = device.engine.sync(USER).await;
    assert!(result.is_ok());
    assert_eq!(result.get(EntityKind::Workout).unwrap().pushed, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_sync_recovers_rows_behind_the_cursor() {
    let backend = Arc::new(MemoryBackend::new());
    let a = Device::new(&backend).await;
    let b = Device::new(&backend).await;

    let newest = a
        .repo::<Workout>()
        .create(USER, Workout::new("Newest", day(2024, 6, 11)))
        .await
        .unwrap();
    a.engine.sync(USER).await;
    b.engine.sync(USER).await;

    // A row that reaches the backend with a timestamp behind B's cursor.
    let straggler = RemoteRow {
        id: liftsync_core::EntityId::new(),
        owner_id: USER.to_string(),
        modified_at: newest.modified_at - 10_000,
        data: Workout::new("Straggler", day(2024, 6, 1)),
    };
    backend.put_row(EntityKind::Workout, straggler.to_json().unwrap());

    let incremental = b.engine.sync(USER).await;
    assert_eq!(incremental.get(EntityKind::Workout).unwrap().pulled, 0);
    assert!(b.repo::<Workout>().get(&straggler.id).await.unwrap().is_none());

    let full = b.engine.sync_all(USER).await;
    assert_eq!(full.get(EntityKind::Workout).unwrap().pulled, 1);
    assert!(b.repo::<Workout>().get(&straggler.id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cursors_survive_restart() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("liftsync.db");
    let backend = Arc::new(MemoryBackend::new());

    {
        let database = Arc::new(Database::open(&path).await.unwrap());
        EntityRepository::<Workout>::new(database.connection())
            .create(USER, Workout::new("Persisted", day(2024, 6, 12)))
            .await
            .unwrap();
        let engine = SyncEngine::new(database, Arc::clone(&backend), SyncConfig::default());
        assert!(engine.sync(USER).await.is_ok());
    }

    let database = Arc::new(Database::open(&path).await.unwrap());
    let state = LibSqlSyncStateRepository::new(database.connection());
    assert!(state
        .cursor(USER, EntityKind::Workout)
        .await
        .unwrap()
        .is_some());

    let before = backend.call_counts();
    let engine = SyncEngine::new(database, Arc::clone(&backend), SyncConfig::default());
    let result = engine.sync(USER).await;
    assert!(result.is_ok());
    assert_eq!(result.total_pulled(), 0);
    assert_eq!(
        backend.call_counts().list_changed - before.list_changed,
        EntityKind::ALL.len() as u64
    );
}
