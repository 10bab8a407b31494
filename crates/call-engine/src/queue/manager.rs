//! Queue & assignment manager.
//!
//! One queue for support-bound calls: partner callers sort ahead of
//! customer callers, FIFO within a class. Waiting entries and agent
//! availability live behind the same mutex, so popping an entry and
//! reserving an agent is one critical section; two triggers racing through
//! [`QueueManager::try_assign`] can never double-assign an entry or an
//! agent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use roadcall_call_ledger::{CallId, Party, PartyKind};

use crate::agent::{Agent, AgentId, AgentStatus};
use crate::error::{EngineError, Result};

/// A caller waiting for an agent.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub call_id: CallId,
    pub caller: Party,
    pub enqueued_at: DateTime<Utc>,
    pub assigned_agent: Option<AgentId>,
}

/// A matched entry/agent pair popped from the critical section.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub entry: QueueEntry,
    pub agent: Agent,
}

/// Wait-time metrics for external dashboards. The queue has no hard
/// timeout; alerting on these numbers is the dashboards' job.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub depth: usize,
    pub partner_depth: usize,
    pub average_wait_seconds: u64,
    pub longest_wait_seconds: u64,
}

/// Lower sorts first: partners ahead of everyone else.
fn priority(kind: PartyKind) -> u8 {
    match kind {
        PartyKind::Partner => 0,
        PartyKind::Customer | PartyKind::Admin => 1,
    }
}

#[derive(Default)]
struct AssignState {
    entries: Vec<QueueEntry>,
    agents: HashMap<String, Agent>,
}

/// Support queue with a single-writer assignment critical section.
pub struct QueueManager {
    state: Mutex<AssignState>,
    max_size: usize,
}

impl QueueManager {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(AssignState::default()),
            max_size,
        }
    }

    /// Register an agent (offline until marked available).
    pub async fn register_agent(&self, agent: Agent) {
        let mut state = self.state.lock().await;
        info!("👤 Agent {} registered ({})", agent.id, agent.display_name);
        state.agents.insert(agent.id.as_str().to_string(), agent);
    }

    /// Update an agent's availability.
    pub async fn set_agent_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        let agent = state
            .agents
            .get_mut(agent_id.as_str())
            .ok_or_else(|| EngineError::agent(format!("unknown agent {agent_id}")))?;

        agent.available_since = match status {
            AgentStatus::Available => Some(Utc::now()),
            _ => None,
        };
        agent.status = status;
        debug!("Agent {} status set to {:?}", agent_id, status);
        Ok(())
    }

    /// Snapshot of all registered agents.
    pub async fn list_agents(&self) -> Vec<Agent> {
        let state = self.state.lock().await;
        let mut agents: Vec<Agent> = state.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        agents
    }

    /// Insert a waiting caller: priority first, FIFO within a class.
    /// Re-enqueueing a queued call is a logged no-op.
    pub async fn enqueue(&self, call_id: CallId, caller: Party) -> Result<usize> {
        let mut state = self.state.lock().await;

        if let Some(pos) = state.entries.iter().position(|e| e.call_id == call_id) {
            warn!("📞 Call {} already queued at {}, not re-queuing", call_id, pos);
            return Ok(pos);
        }
        if state.entries.len() >= self.max_size {
            return Err(EngineError::queue("queue is full"));
        }

        let entry = QueueEntry {
            call_id,
            caller,
            enqueued_at: Utc::now(),
            assigned_agent: None,
        };

        let p = priority(entry.caller.kind);
        let position = state
            .entries
            .iter()
            .position(|existing| priority(existing.caller.kind) > p)
            .unwrap_or(state.entries.len());
        state.entries.insert(position, entry);

        info!(
            "📋 Call {} queued at position {} (depth {})",
            call_id,
            position,
            state.entries.len()
        );
        Ok(position)
    }

    /// Remove a waiting caller. No-op if the entry was already assigned or
    /// never queued.
    pub async fn cancel(&self, call_id: CallId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|e| e.call_id != call_id);
        let removed = state.entries.len() < before;
        if removed {
            info!("Call {} left the queue (caller cancelled)", call_id);
        }
        removed
    }

    /// Match the head entry to the longest-available agent, atomically.
    ///
    /// Called whenever an agent becomes free or a new entry arrives. Both
    /// the pop and the agent reservation happen under one lock; there is no
    /// window in which two callers can see the same free agent or the same
    /// head entry.
    pub async fn try_assign(&self) -> Option<Assignment> {
        let mut state = self.state.lock().await;

        if state.entries.is_empty() {
            return None;
        }

        let agent_key = state
            .agents
            .values()
            .filter(|a| a.status == AgentStatus::Available)
            .min_by_key(|a| a.available_since)
            .map(|a| a.id.as_str().to_string())?;

        // The key came from the same locked map a moment ago.
        let Some(agent) = state.agents.get_mut(&agent_key) else {
            return None;
        };
        agent.status = AgentStatus::Busy;
        agent.available_since = None;
        let agent = agent.clone();

        let mut entry = state.entries.remove(0);

        entry.assigned_agent = Some(agent.id.clone());
        info!(
            "🎯 Call {} assigned to agent {} (waited {}s)",
            entry.call_id,
            agent.id,
            (Utc::now() - entry.enqueued_at).num_seconds()
        );

        Some(Assignment { entry, agent })
    }

    /// Number of waiting entries.
    pub async fn depth(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Wait-time metrics.
    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        let now = Utc::now();

        let waits: Vec<i64> = state
            .entries
            .iter()
            .map(|e| (now - e.enqueued_at).num_seconds().max(0))
            .collect();

        let depth = waits.len();
        let (average, longest) = if depth > 0 {
            let total: i64 = waits.iter().sum();
            (total / depth as i64, *waits.iter().max().unwrap_or(&0))
        } else {
            (0, 0)
        };

        QueueStats {
            depth,
            partner_depth: state
                .entries
                .iter()
                .filter(|e| e.caller.kind == PartyKind::Partner)
                .count(),
            average_wait_seconds: average as u64,
            longest_wait_seconds: longest as u64,
        }
    }
}
