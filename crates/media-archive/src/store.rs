//! Recording rows (sqlx-based).
//!
//! Status changes are monotonic (recording, processing, ready or failed,
//! deleted) and enforced the same way call transitions are: a conditional
//! UPDATE that only fires from the expected predecessor state.

use anyhow::Result as DbResult;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use roadcall_call_ledger::CallId;

use crate::error::{ArchiveError, Result};

/// Archival artifact lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingStatus {
    /// Capture in progress alongside the live call.
    Recording,
    /// Call ended; encode job pending or running.
    Processing,
    /// Artifact uploaded and playable.
    Ready,
    /// Encode or upload failed after retries; kept for manual cleanup.
    Failed,
    /// Removed by retention; terminal.
    Deleted,
}

impl RecordingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "recording" => Ok(Self::Recording),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            other => Err(ArchiveError::invalid_state(format!(
                "unknown recording status: {other}"
            ))),
        }
    }
}

impl RecordingStatus {
    /// The monotonic lifecycle: recording → processing → ready | failed →
    /// deleted. Nothing moves backwards.
    pub fn can_advance_to(self, next: RecordingStatus) -> bool {
        use RecordingStatus::*;
        matches!(
            (self, next),
            (Recording, Processing)
                | (Processing, Ready)
                | (Processing, Failed)
                | (Ready, Deleted)
                | (Failed, Deleted)
        )
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archival artifact for one call (1:1 with a recorded call).
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: String,
    pub call_id: CallId,
    pub file_path: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub duration_seconds: f64,
    pub status: RecordingStatus,
    pub compression_ratio: f64,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
struct DbRecording {
    id: String,
    call_id: String,
    file_path: String,
    file_name: String,
    file_size_bytes: i64,
    duration_seconds: f64,
    status: String,
    compression_ratio: f64,
    play_count: i64,
    last_played_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DbRecording {
    fn into_recording(self) -> Result<Recording> {
        Ok(Recording {
            call_id: self
                .call_id
                .parse()
                .map_err(|_| ArchiveError::invalid_state(format!("bad call id {}", self.call_id)))?,
            status: RecordingStatus::parse(&self.status)?,
            id: self.id,
            file_path: self.file_path,
            file_name: self.file_name,
            file_size_bytes: self.file_size_bytes,
            duration_seconds: self.duration_seconds,
            compression_ratio: self.compression_ratio,
            play_count: self.play_count,
            last_played_at: self.last_played_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, call_id, file_path, file_name, file_size_bytes, \
     duration_seconds, status, compression_ratio, play_count, last_played_at, \
     created_at, updated_at FROM recordings";

/// Handle to the recordings table.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    pool: SqlitePool,
}

impl RecordingStore {
    /// Wrap an existing pool (shared with the call store) and ensure the
    /// schema exists.
    pub async fn new(pool: SqlitePool) -> DbResult<Self> {
        create_recordings_table(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert a row in `recording` for a call that just started capture.
    pub async fn create(
        &self,
        call_id: CallId,
        file_path: &str,
        file_name: &str,
    ) -> Result<Recording> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO recordings (id, call_id, file_path, file_name, \
             file_size_bytes, duration_seconds, status, compression_ratio, \
             play_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 0, 0, 'recording', 0, 0, ?, ?)",
        )
        .bind(&id)
        .bind(call_id.to_string())
        .bind(file_path)
        .bind(file_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        debug!("Recording {} created for call {}", id, call_id);
        self.require(&id).await
    }

    /// Advance the status, enforcing the monotonic lifecycle.
    pub async fn advance(
        &self,
        recording_id: &str,
        from: RecordingStatus,
        to: RecordingStatus,
    ) -> Result<()> {
        if !from.can_advance_to(to) {
            return Err(ArchiveError::invalid_state(format!(
                "recording status cannot move {from} -> {to}"
            )));
        }

        let result = sqlx::query(
            "UPDATE recordings SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(recording_id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            let current = self.require(recording_id).await?;
            return Err(ArchiveError::invalid_state(format!(
                "recording {recording_id} is {}, cannot move {from} -> {to}",
                current.status
            )));
        }
        Ok(())
    }

    /// Record the finished artifact and flip processing → ready.
    pub async fn complete(
        &self,
        recording_id: &str,
        file_size_bytes: i64,
        duration_seconds: f64,
        compression_ratio: f64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE recordings SET status = 'ready', file_size_bytes = ?, \
             duration_seconds = ?, compression_ratio = ?, updated_at = ? \
             WHERE id = ? AND status = 'processing'",
        )
        .bind(file_size_bytes)
        .bind(duration_seconds)
        .bind(compression_ratio)
        .bind(Utc::now())
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(ArchiveError::invalid_state(format!(
                "recording {recording_id} was not processing"
            )));
        }
        Ok(())
    }

    /// Playback side effect: bump play_count and stamp last_played_at.
    pub async fn mark_played(&self, recording_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE recordings SET play_count = play_count + 1, \
             last_played_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;
        Ok(())
    }

    /// Fetch a recording by id.
    pub async fn get(&self, recording_id: &str) -> Result<Option<Recording>> {
        let row = sqlx::query_as::<_, DbRecording>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(recording_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        row.map(DbRecording::into_recording).transpose()
    }

    /// Fetch the recording for a call, if one exists.
    pub async fn find_by_call(&self, call_id: CallId) -> Result<Option<Recording>> {
        let row = sqlx::query_as::<_, DbRecording>(&format!("{SELECT_COLUMNS} WHERE call_id = ?"))
            .bind(call_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        row.map(DbRecording::into_recording).transpose()
    }

    async fn require(&self, recording_id: &str) -> Result<Recording> {
        self.get(recording_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(recording_id.to_string()))
    }
}

/// Create the recordings table and its indexes.
async fn create_recordings_table(pool: &SqlitePool) -> DbResult<()> {
    debug!("Creating recordings table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            id TEXT PRIMARY KEY,
            call_id TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size_bytes INTEGER NOT NULL DEFAULT 0,
            duration_seconds REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'recording',
            compression_ratio REAL NOT NULL DEFAULT 0,
            play_count INTEGER NOT NULL DEFAULT 0,
            last_played_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings(status)")
        .execute(pool)
        .await?;

    Ok(())
}
