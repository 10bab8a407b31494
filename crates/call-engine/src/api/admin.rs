//! Administrative API.
//!
//! The complete contract the admin tooling needs from the voice core: list
//! active calls, force-end, browse history, fetch playback URLs, download
//! archives, and read queue/agent state. Every operation takes the
//! requester explicitly and requires the admin party kind.

use std::sync::Arc;

use bytes::Bytes;

use roadcall_call_ledger::{Call, CallFilter, CallId, CallLedger, Party, PartyKind};
use roadcall_media_archive::{PlaybackGateway, SignedUrl};

use crate::agent::Agent;
use crate::error::{EngineError, Result};
use crate::monitor::LiveMonitor;
use crate::orchestrator::CallOrchestrator;
use crate::queue::{QueueManager, QueueStats};

/// Administrative surface over the voice core.
#[derive(Clone)]
pub struct AdminApi {
    ledger: Arc<CallLedger>,
    orchestrator: Arc<CallOrchestrator>,
    monitor: Arc<LiveMonitor>,
    queue: Arc<QueueManager>,
    playback: Arc<PlaybackGateway>,
}

impl AdminApi {
    pub fn new(
        ledger: Arc<CallLedger>,
        orchestrator: Arc<CallOrchestrator>,
        monitor: Arc<LiveMonitor>,
        queue: Arc<QueueManager>,
        playback: Arc<PlaybackGateway>,
    ) -> Self {
        Self {
            ledger,
            orchestrator,
            monitor,
            queue,
            playback,
        }
    }

    /// All calls currently ringing or connected.
    pub fn list_active_calls(&self, requester: &Party) -> Result<Vec<Call>> {
        require_admin(requester)?;
        Ok(self.monitor.active_calls())
    }

    /// Force-end a call, reason `admin_forced`. Works even when neither
    /// party is reachable for normal hangup signaling.
    pub async fn force_end(&self, requester: &Party, call_id: CallId) -> Result<Call> {
        require_admin(requester)?;
        self.orchestrator.force_end(call_id).await
    }

    /// Historical calls with status, date-range, and party-name filters.
    pub async fn call_history(&self, requester: &Party, filter: &CallFilter) -> Result<Vec<Call>> {
        require_admin(requester)?;
        Ok(self.ledger.history(filter).await?)
    }

    /// Time-limited playback URL for a ready recording. Counts as a play.
    pub async fn playback_url(&self, requester: &Party, recording_id: &str) -> Result<SignedUrl> {
        Ok(self.playback.playback_url(recording_id, requester).await?)
    }

    /// Raw artifact download. Does not count as a play.
    pub async fn download(&self, requester: &Party, recording_id: &str) -> Result<Bytes> {
        Ok(self.playback.download(recording_id, requester).await?)
    }

    /// Queue depth and wait-time metrics.
    pub async fn queue_stats(&self, requester: &Party) -> Result<QueueStats> {
        require_admin(requester)?;
        Ok(self.queue.stats().await)
    }

    /// All registered support agents.
    pub async fn list_agents(&self, requester: &Party) -> Result<Vec<Agent>> {
        require_admin(requester)?;
        Ok(self.queue.list_agents().await)
    }
}

fn require_admin(requester: &Party) -> Result<()> {
    if requester.kind == PartyKind::Admin {
        Ok(())
    } else {
        Err(EngineError::forbidden(format!(
            "{} is not an administrator",
            requester
        )))
    }
}
