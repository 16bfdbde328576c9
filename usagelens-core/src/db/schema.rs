//! Usage store schema
//!
//! The store is written by the ingestion and rollup jobs; this crate only
//! reads it. The DDL lives here so an empty store (tests, `usagelens --init`)
//! has the layout the engine expects. Versions are tracked via
//! PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Rollup tables, finest resolution first
pub const ROLLUP_TABLES: [&str; 3] = ["hourly_stats", "daily_stats", "monthly_stats"];

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: raw usage events and session summaries
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id                TEXT PRIMARY KEY,
        session_id        TEXT NOT NULL,
        role              TEXT NOT NULL,
        created_at        INTEGER NOT NULL,   -- ms since epoch
        completed_at      INTEGER,
        provider_id       TEXT,
        model_id          TEXT,
        agent             TEXT,
        project_id        TEXT,

        -- Token counts arrive as text from the ingestion side
        token_input       TEXT,
        token_output      TEXT,
        token_reasoning   TEXT,

        cache_read        INTEGER DEFAULT 0,
        cache_write       INTEGER DEFAULT 0,
        cost              REAL DEFAULT 0,

        -- Code change summary
        summary_additions INTEGER DEFAULT 0,
        summary_deletions INTEGER DEFAULT 0,
        summary_files     INTEGER DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS sessions (
        session_id              TEXT PRIMARY KEY,
        project_name            TEXT,
        created_at              INTEGER NOT NULL,
        updated_at              INTEGER,
        user_message_count      INTEGER DEFAULT 0,
        assistant_message_count INTEGER DEFAULT 0,
        total_input_tokens      INTEGER DEFAULT 0,
        total_output_tokens     INTEGER DEFAULT 0,
        total_cost              REAL DEFAULT 0,
        total_additions         INTEGER DEFAULT 0,
        total_deletions         INTEGER DEFAULT 0,
        total_files             INTEGER DEFAULT 0,
        is_orphan               INTEGER DEFAULT 0,
        finish_reason           TEXT
    );

    CREATE TABLE IF NOT EXISTS sync_files (
        path               TEXT PRIMARY KEY,
        file_hash          TEXT,
        hourly_aggregated  INTEGER DEFAULT 0,
        daily_aggregated   INTEGER DEFAULT 0,
        monthly_aggregated INTEGER DEFAULT 0,
        updated_at         INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);
    CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_messages_project ON messages(project_id, created_at);
    CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);
    "#,
    // Version 2: multi-resolution rollups
    r#"
    CREATE TABLE IF NOT EXISTS hourly_stats (
        time_bucket      INTEGER NOT NULL,
        project          TEXT NOT NULL DEFAULT '',
        provider         TEXT NOT NULL DEFAULT '',
        model            TEXT NOT NULL DEFAULT '',
        role             TEXT NOT NULL DEFAULT '',
        agent            TEXT NOT NULL DEFAULT '',
        tool             TEXT NOT NULL DEFAULT '',
        session_count    INTEGER NOT NULL DEFAULT 0,
        message_count    INTEGER NOT NULL DEFAULT 0,
        input_tokens     INTEGER NOT NULL DEFAULT 0,
        output_tokens    INTEGER NOT NULL DEFAULT 0,
        reasoning_tokens INTEGER NOT NULL DEFAULT 0,
        cache_read       INTEGER NOT NULL DEFAULT 0,
        cache_write      INTEGER NOT NULL DEFAULT 0,
        duration_ms      INTEGER NOT NULL DEFAULT 0,
        cost             REAL NOT NULL DEFAULT 0,
        net_code_lines   INTEGER NOT NULL DEFAULT 0,
        file_count       INTEGER NOT NULL DEFAULT 0,
        last_created_at  INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (time_bucket, project, provider, model, role, agent, tool)
    );

    CREATE TABLE IF NOT EXISTS daily_stats (
        time_bucket      INTEGER NOT NULL,
        project          TEXT NOT NULL DEFAULT '',
        provider         TEXT NOT NULL DEFAULT '',
        model            TEXT NOT NULL DEFAULT '',
        role             TEXT NOT NULL DEFAULT '',
        agent            TEXT NOT NULL DEFAULT '',
        tool             TEXT NOT NULL DEFAULT '',
        session_count    INTEGER NOT NULL DEFAULT 0,
        message_count    INTEGER NOT NULL DEFAULT 0,
        input_tokens     INTEGER NOT NULL DEFAULT 0,
        output_tokens    INTEGER NOT NULL DEFAULT 0,
        reasoning_tokens INTEGER NOT NULL DEFAULT 0,
        cache_read       INTEGER NOT NULL DEFAULT 0,
        cache_write      INTEGER NOT NULL DEFAULT 0,
        duration_ms      INTEGER NOT NULL DEFAULT 0,
        cost             REAL NOT NULL DEFAULT 0,
        net_code_lines   INTEGER NOT NULL DEFAULT 0,
        file_count       INTEGER NOT NULL DEFAULT 0,
        last_created_at  INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (time_bucket, project, provider, model, role, agent, tool)
    );

    CREATE TABLE IF NOT EXISTS monthly_stats (
        time_bucket      INTEGER NOT NULL,
        project          TEXT NOT NULL DEFAULT '',
        provider         TEXT NOT NULL DEFAULT '',
        model            TEXT NOT NULL DEFAULT '',
        role             TEXT NOT NULL DEFAULT '',
        agent            TEXT NOT NULL DEFAULT '',
        tool             TEXT NOT NULL DEFAULT '',
        session_count    INTEGER NOT NULL DEFAULT 0,
        message_count    INTEGER NOT NULL DEFAULT 0,
        input_tokens     INTEGER NOT NULL DEFAULT 0,
        output_tokens    INTEGER NOT NULL DEFAULT 0,
        reasoning_tokens INTEGER NOT NULL DEFAULT 0,
        cache_read       INTEGER NOT NULL DEFAULT 0,
        cache_write      INTEGER NOT NULL DEFAULT 0,
        duration_ms      INTEGER NOT NULL DEFAULT 0,
        cost             REAL NOT NULL DEFAULT 0,
        net_code_lines   INTEGER NOT NULL DEFAULT 0,
        file_count       INTEGER NOT NULL DEFAULT 0,
        last_created_at  INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (time_bucket, project, provider, model, role, agent, tool)
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    run_migrations_to(conn, SCHEMA_VERSION)
}

/// Run migrations up to and including `target` (clamped to [`SCHEMA_VERSION`])
pub fn run_migrations_to(conn: &Connection, target: i32) -> crate::error::Result<()> {
    let target = target.min(SCHEMA_VERSION);
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = target,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version && version <= target {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < target {
        tracing::info!(from = current_version, to = target, "Migrations complete");
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
