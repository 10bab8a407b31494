//! Call row operations (sqlx-based).

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use super::CallStore;
use crate::call::{Call, CallFilter};
use crate::types::{CallId, CallStatus, EndReason, Party, PartyKind};

const SELECT_COLUMNS: &str = "SELECT id, caller_id, caller_kind, caller_name, \
     receiver_id, receiver_kind, receiver_name, status, started_at, \
     connected_at, ended_at, end_reason, is_recorded, recording_id FROM calls";

const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Result of a guarded call insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    CallerBusy,
    ReceiverBusy,
}

/// Non-terminal calls a party participates in, within an open transaction.
async fn active_count_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    party_id: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM calls \
         WHERE status IN ('ringing', 'connected') \
         AND (caller_id = ? OR receiver_id = ?)",
    )
    .bind(party_id)
    .bind(party_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// Raw call row; converted to the domain [`Call`] on read.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DbCall {
    pub id: String,
    pub caller_id: String,
    pub caller_kind: String,
    pub caller_name: String,
    pub receiver_id: String,
    pub receiver_kind: String,
    pub receiver_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub is_recorded: bool,
    pub recording_id: Option<String>,
}

impl DbCall {
    fn into_call(self) -> Result<Call> {
        Ok(Call {
            id: self.id.parse()?,
            caller: Party {
                id: crate::types::PartyId::new(self.caller_id),
                kind: PartyKind::parse(&self.caller_kind)?,
            },
            caller_name: self.caller_name,
            receiver: Party {
                id: crate::types::PartyId::new(self.receiver_id),
                kind: PartyKind::parse(&self.receiver_kind)?,
            },
            receiver_name: self.receiver_name,
            status: CallStatus::parse(&self.status)?,
            started_at: self.started_at,
            connected_at: self.connected_at,
            ended_at: self.ended_at,
            end_reason: self.end_reason.as_deref().map(EndReason::parse).transpose()?,
            is_recorded: self.is_recorded,
            recording_id: self.recording_id,
        })
    }
}

impl CallStore {
    /// Insert a freshly created call row, enforcing the one-active-call
    /// rule inside a single transaction so concurrent creates cannot slip
    /// past each other's busy checks.
    pub async fn insert_call_checked(
        &self,
        call: &Call,
        check_receiver: bool,
    ) -> Result<InsertOutcome> {
        let mut tx = self.pool().begin().await?;

        let caller_active: i64 = active_count_in_tx(&mut tx, call.caller.id.as_str()).await?;
        if caller_active > 0 {
            tx.rollback().await?;
            return Ok(InsertOutcome::CallerBusy);
        }

        if check_receiver {
            let receiver_active: i64 =
                active_count_in_tx(&mut tx, call.receiver.id.as_str()).await?;
            if receiver_active > 0 {
                tx.rollback().await?;
                return Ok(InsertOutcome::ReceiverBusy);
            }
        }

        sqlx::query(
            "INSERT INTO calls (id, caller_id, caller_kind, caller_name, \
             receiver_id, receiver_kind, receiver_name, status, started_at, \
             is_recorded) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(call.id.to_string())
        .bind(call.caller.id.as_str())
        .bind(call.caller.kind.as_str())
        .bind(&call.caller_name)
        .bind(call.receiver.id.as_str())
        .bind(call.receiver.kind.as_str())
        .bind(&call.receiver_name)
        .bind(call.status.as_str())
        .bind(call.started_at)
        .bind(call.is_recorded)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InsertOutcome::Inserted)
    }

    /// Fetch a call by id.
    pub async fn find(&self, call_id: CallId) -> Result<Option<Call>> {
        let row = sqlx::query_as::<_, DbCall>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(call_id.to_string())
            .fetch_optional(self.pool())
            .await?;

        row.map(DbCall::into_call).transpose()
    }

    /// Compare-and-set status update. Returns false if the row's status was
    /// no longer `from`, in which case the caller revalidates and retries.
    pub async fn cas_status(
        &self,
        call_id: CallId,
        from: CallStatus,
        to: CallStatus,
        connected_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
        end_reason: Option<EndReason>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE calls SET status = ?, \
             connected_at = COALESCE(?, connected_at), \
             ended_at = COALESCE(?, ended_at), \
             end_reason = COALESCE(?, end_reason) \
             WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(connected_at)
        .bind(ended_at)
        .bind(end_reason.map(EndReason::as_str))
        .bind(call_id.to_string())
        .bind(from.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewrite the receiver leg of a still-ringing call (queue assignment).
    pub async fn update_receiver(
        &self,
        call_id: CallId,
        receiver: &Party,
        receiver_name: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE calls SET receiver_id = ?, receiver_kind = ?, receiver_name = ? \
             WHERE id = ? AND status = 'ringing'",
        )
        .bind(receiver.id.as_str())
        .bind(receiver.kind.as_str())
        .bind(receiver_name)
        .bind(call_id.to_string())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Link the archival recording row created for this call.
    pub async fn set_recording_id(&self, call_id: CallId, recording_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE calls SET recording_id = ? WHERE id = ?")
            .bind(recording_id)
            .bind(call_id.to_string())
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All calls currently in `ringing` or `connected`, oldest first.
    pub async fn active_calls(&self) -> Result<Vec<Call>> {
        let rows = sqlx::query_as::<_, DbCall>(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('ringing', 'connected') ORDER BY started_at ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(DbCall::into_call).collect()
    }

    /// Historical calls matching `filter`, newest first.
    pub async fn history(&self, filter: &CallFilter) -> Result<Vec<Call>> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        qb.push(" WHERE 1=1");

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(after) = filter.started_after {
            qb.push(" AND started_at >= ").push_bind(after);
        }
        if let Some(before) = filter.started_before {
            qb.push(" AND started_at <= ").push_bind(before);
        }
        if let Some(name) = &filter.party_name {
            let pattern = format!("%{name}%");
            qb.push(" AND (caller_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR receiver_name LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        let limit = filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        qb.push(" ORDER BY started_at DESC LIMIT ")
            .push_bind(i64::from(limit));

        let rows: Vec<DbCall> = qb.build_query_as().fetch_all(self.pool()).await?;
        rows.into_iter().map(DbCall::into_call).collect()
    }
}
