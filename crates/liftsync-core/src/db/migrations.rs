//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Bookkeeping columns every synced table starts with, in the order the
/// repository selects them.
macro_rules! synced_table {
    ($name:literal, $payload:literal) => {
        concat!(
            "CREATE TABLE IF NOT EXISTS ",
            $name,
            " (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                modified_at INTEGER NOT NULL,
                pending_sync INTEGER NOT NULL DEFAULT 1,
                deleted INTEGER NOT NULL DEFAULT 0,
                ",
            $payload,
            "
            )"
        )
    };
}

macro_rules! synced_indexes {
    ($name:literal) => {
        [
            concat!(
                "CREATE INDEX IF NOT EXISTS idx_",
                $name,
                "_owner_pending ON ",
                $name,
                "(owner_id, pending_sync)"
            ),
            concat!(
                "CREATE INDEX IF NOT EXISTS idx_",
                $name,
                "_owner_modified ON ",
                $name,
                "(owner_id, modified_at DESC)"
            ),
        ]
    };
}

/// Migration to version 1: entity tables and persisted sync cursors
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let tables = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        synced_table!(
            "workouts",
            "name TEXT NOT NULL,
                notes TEXT,
                performed_on TEXT NOT NULL,
                duration_minutes INTEGER"
        ),
        synced_table!(
            "exercises",
            "workout_id TEXT,
                name TEXT NOT NULL,
                sets INTEGER NOT NULL,
                reps INTEGER NOT NULL,
                weight_kg REAL"
        ),
        synced_table!(
            "cycles",
            "name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT"
        ),
        synced_table!(
            "goals",
            "title TEXT NOT NULL,
                target_value REAL NOT NULL,
                unit TEXT NOT NULL,
                deadline TEXT,
                achieved INTEGER NOT NULL DEFAULT 0"
        ),
        synced_table!(
            "body_measurements",
            "measured_on TEXT NOT NULL,
                weight_kg REAL,
                body_fat_pct REAL,
                waist_cm REAL"
        ),
        synced_table!(
            "strength_tests",
            "exercise_name TEXT NOT NULL,
                tested_on TEXT NOT NULL,
                one_rep_max_kg REAL NOT NULL"
        ),
        synced_table!(
            "scheduled_trainings",
            "title TEXT NOT NULL,
                scheduled_on TEXT NOT NULL,
                workout_id TEXT,
                completed INTEGER NOT NULL DEFAULT 0"
        ),
        synced_table!(
            "profiles",
            "display_name TEXT NOT NULL,
                height_cm REAL,
                birth_date TEXT,
                unit_system TEXT NOT NULL DEFAULT 'metric'"
        ),
        // Incremental pull position per user and kind (local only)
        "CREATE TABLE IF NOT EXISTS sync_state (
            user_id TEXT NOT NULL,
            entity_kind TEXT NOT NULL,
            cursor INTEGER,
            last_synced_at INTEGER,
            PRIMARY KEY (user_id, entity_kind)
        )",
        "CREATE INDEX IF NOT EXISTS idx_scheduled_trainings_day
            ON scheduled_trainings(owner_id, scheduled_on)",
    ];

    let mut statements: Vec<&str> = tables.to_vec();
    statements.extend(synced_indexes!("workouts"));
    statements.extend(synced_indexes!("exercises"));
    statements.extend(synced_indexes!("cycles"));
    statements.extend(synced_indexes!("goals"));
    statements.extend(synced_indexes!("body_measurements"));
    statements.extend(synced_indexes!("strength_tests"));
    statements.extend(synced_indexes!("scheduled_trainings"));
    statements.extend(synced_indexes!("profiles"));
    statements.push("INSERT INTO schema_version (version) VALUES (1)");

    apply(conn, 1, &statements).await
}

/// Migration to version 2: LWW conflict logging support
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_kind TEXT NOT NULL,
            row_id TEXT NOT NULL,
            local_modified_at INTEGER NOT NULL,
            incoming_modified_at INTEGER NOT NULL,
            resolved_at INTEGER NOT NULL,
            strategy TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_row ON sync_conflicts(entity_kind, row_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    apply(conn, 2, &statements).await
}

/// Run one migration's statements inside a single transaction.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}
