//! The call record and its lifecycle invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CallId, CallStatus, EndReason, Party};

/// One attempted or completed voice session between two parties.
///
/// This is the single source of truth other components observe through the
/// change feed. Timestamps obey the ledger invariants: `connected_at` is set
/// iff the call passed through `connected`, `ended_at` iff it reached a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,

    pub caller: Party,
    /// Display name resolved at creation time, kept for history search.
    pub caller_name: String,

    pub receiver: Party,
    pub receiver_name: String,

    pub status: CallStatus,

    pub started_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,

    /// Recording eligibility, decided once at creation and never revisited.
    pub is_recorded: bool,
    /// Set by the recorder once an archival row exists for this call.
    pub recording_id: Option<String>,
}

impl Call {
    /// Whether the given party is on either leg of this call.
    pub fn involves(&self, party: &Party) -> bool {
        self.caller == *party || self.receiver == *party
    }

    /// Talk time so far, if the call ever connected.
    pub fn talk_time(&self) -> Option<chrono::Duration> {
        let connected = self.connected_at?;
        let until = self.ended_at.unwrap_or_else(Utc::now);
        Some(until - connected)
    }
}

/// History query filter for the administrative surface.
#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    pub status: Option<CallStatus>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring match against either party's display name.
    pub party_name: Option<String>,
    /// Result cap; `None` falls back to the store default.
    pub limit: Option<u32>,
}
