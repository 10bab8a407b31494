//! Database schema for the call ledger.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Create the calls table and its indexes.
pub async fn create_calls_table(pool: &SqlitePool) -> Result<()> {
    debug!("Creating calls table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            id TEXT PRIMARY KEY,
            caller_id TEXT NOT NULL,
            caller_kind TEXT NOT NULL,
            caller_name TEXT NOT NULL,
            receiver_id TEXT NOT NULL,
            receiver_kind TEXT NOT NULL,
            receiver_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ringing',
            started_at TEXT NOT NULL,
            connected_at TEXT,
            ended_at TEXT,
            end_reason TEXT,
            is_recorded INTEGER NOT NULL DEFAULT 0,
            recording_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_status ON calls(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_calls_started_at ON calls(started_at)")
        .execute(pool)
        .await?;

    Ok(())
}
