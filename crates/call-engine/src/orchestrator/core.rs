//! The call orchestrator.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use roadcall_call_ledger::{
    Call, CallEvent, CallId, CallLedger, CallStatus, EndReason, LedgerError, Party, PartyKind,
};

use crate::agent::{AgentId, AgentStatus};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::policy::CallPolicy;
use crate::queue::QueueManager;

/// Orchestrates call placement, answering, queueing, and teardown.
pub struct CallOrchestrator {
    ledger: Arc<CallLedger>,
    queue: Arc<QueueManager>,
    direct_policy: Arc<dyn CallPolicy>,
    support_policy: Arc<dyn CallPolicy>,
    config: EngineConfig,
    /// Calls whose post-connect policy hook already ran; the hook (lead
    /// debit) must fire at most once per call.
    connected_seen: DashSet<CallId>,
}

impl CallOrchestrator {
    pub fn new(
        ledger: Arc<CallLedger>,
        queue: Arc<QueueManager>,
        direct_policy: Arc<dyn CallPolicy>,
        support_policy: Arc<dyn CallPolicy>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            queue,
            direct_policy,
            support_policy,
            config,
            connected_seen: DashSet::new(),
        }
    }

    /// Place a direct call (customer↔partner channel). The policy gates
    /// creation; the ring watchdog is armed immediately because signaling
    /// starts right away.
    pub async fn place_call(&self, caller: Party, receiver: Party, record: bool) -> Result<Call> {
        self.direct_policy.authorize(&caller, &receiver).await?;
        let call = self.ledger.create_call(caller, receiver, record).await?;
        self.arm_ring_watchdog(call.id);
        Ok(call)
    }

    /// Place a support-bound call. The call rings against the shared intake
    /// party and waits in the queue; the watchdog is armed only once an
    /// agent is assigned, because queue wait is not ring time.
    pub async fn place_support_call(&self, caller: Party, record: bool) -> Result<Call> {
        let intake = Party::support_intake();
        self.support_policy.authorize(&caller, &intake).await?;

        let call = self
            .ledger
            .create_call(caller.clone(), intake, record)
            .await?;

        if let Err(err) = self.queue.enqueue(call.id, caller).await {
            // A full queue rejects the caller; the row must not dangle in
            // ringing with nobody ever going to pick it up.
            self.ledger
                .transition(call.id, CallStatus::Rejected, Some(EndReason::Rejected))
                .await?;
            return Err(err);
        }
        self.assignment_pass().await;

        // The pass may already have assigned this call; hand back fresh state.
        Ok(self.ledger.find(call.id).await?.unwrap_or(call))
    }

    /// Callee accepts: the call connects.
    pub async fn answer(&self, call_id: CallId) -> Result<Call> {
        Ok(self
            .ledger
            .transition(call_id, CallStatus::Connected, None)
            .await?)
    }

    /// Callee declines before answering.
    pub async fn reject(&self, call_id: CallId) -> Result<Call> {
        Ok(self
            .ledger
            .transition(call_id, CallStatus::Rejected, Some(EndReason::Rejected))
            .await?)
    }

    /// Caller gives up before the callee answers. Also removes a waiting
    /// queue entry; if the entry was already assigned this degrades to a
    /// normal pre-answer cancel at the agent.
    pub async fn cancel(&self, call_id: CallId) -> Result<Call> {
        self.queue.cancel(call_id).await;
        Ok(self
            .ledger
            .transition(call_id, CallStatus::Ended, Some(EndReason::CallerCancelled))
            .await?)
    }

    /// Either party hangs up. Idempotent: the second hangup of a pair is
    /// reported as success by the ledger.
    pub async fn hangup(&self, call_id: CallId) -> Result<Call> {
        Ok(self
            .ledger
            .transition(call_id, CallStatus::Ended, Some(EndReason::Hangup))
            .await?)
    }

    /// Administrative force-termination. Unilateral: succeeds even if
    /// hangup signaling never reaches either party.
    pub async fn force_end(&self, call_id: CallId) -> Result<Call> {
        warn!("Admin force-ending call {}", call_id);
        Ok(self
            .ledger
            .transition(call_id, CallStatus::Ended, Some(EndReason::AdminForced))
            .await?)
    }

    /// Mark an agent available and run an assignment pass.
    pub async fn agent_available(&self, agent_id: &AgentId) -> Result<()> {
        self.queue
            .set_agent_status(agent_id, AgentStatus::Available)
            .await?;
        self.assignment_pass().await;
        Ok(())
    }

    /// Mark an agent offline. Does not touch calls already assigned.
    pub async fn agent_offline(&self, agent_id: &AgentId) -> Result<()> {
        self.queue
            .set_agent_status(agent_id, AgentStatus::Offline)
            .await
    }

    /// Drain the queue while both an entry and a free agent exist. For each
    /// match the assigned agent becomes the call's receiver and signaling
    /// (with its ring timeout) starts toward them.
    pub async fn assignment_pass(&self) {
        while let Some(assignment) = self.queue.try_assign().await {
            let call_id = assignment.entry.call_id;
            let agent_party = Party::admin(assignment.agent.id.as_str());

            match self.ledger.assign_receiver(call_id, agent_party).await {
                Ok(_) => {
                    self.arm_ring_watchdog(call_id);
                }
                Err(err) => {
                    // The caller vanished between queueing and assignment
                    // (cancel or force-end); put the agent back to work.
                    info!(
                        "Assignment of call {} abandoned ({}), freeing agent {}",
                        call_id, err, assignment.agent.id
                    );
                    if let Err(err) = self
                        .queue
                        .set_agent_status(&assignment.agent.id, AgentStatus::Available)
                        .await
                    {
                        error!("Could not free agent {}: {}", assignment.agent.id, err);
                    }
                }
            }
        }
    }

    /// Spawn the feed-driven coordination task: post-connect policy hooks,
    /// queue cleanup, and agent release on call end.
    pub fn run(self: &Arc<Self>, mut events: broadcast::Receiver<CallEvent>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => orchestrator.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Orchestrator driver lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Orchestrator driver stopped: feed closed");
        })
    }

    async fn handle_event(&self, event: CallEvent) {
        if event.is_connected() {
            // First connect only; duplicate events must not double-debit.
            if self.connected_seen.insert(event.call.id) {
                let policy = self.policy_for(&event.call);
                if let Err(err) = policy.on_connected(&event.call).await {
                    error!(
                        "Post-connect policy failed for call {}: {}",
                        event.call.id, err
                    );
                }
            }
        } else if event.is_terminal() {
            self.connected_seen.remove(&event.call.id);

            // A caller who hung up while waiting leaves the queue.
            self.queue.cancel(event.call.id).await;

            // A support agent whose call ended is free for the next caller.
            if let Some(agent_id) = assigned_agent(&event.call) {
                debug!("Agent {} freed by end of call {}", agent_id, event.call.id);
                if let Err(err) = self.agent_available(&agent_id).await {
                    debug!("Agent {} not re-marked available: {}", agent_id, err);
                }
            }
        }
    }

    fn policy_for(&self, call: &Call) -> &Arc<dyn CallPolicy> {
        if call.receiver.kind == PartyKind::Admin {
            &self.support_policy
        } else {
            &self.direct_policy
        }
    }

    /// Arm the ring watchdog: if the call is still ringing when the timeout
    /// elapses, it is marked missed. Losing the race to an answer or hangup
    /// surfaces as `InvalidTransition`, which is exactly the quiet outcome
    /// wanted.
    fn arm_ring_watchdog(&self, call_id: CallId) {
        let ledger = Arc::clone(&self.ledger);
        let timeout = self.config.general.ring_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            match ledger
                .transition(call_id, CallStatus::Missed, Some(EndReason::NoAnswer))
                .await
            {
                Ok(_) => info!("⏰ Call {} missed after {:?} of ringing", call_id, timeout),
                Err(LedgerError::InvalidTransition { .. }) => {
                    debug!("Ring watchdog for call {} found it already settled", call_id);
                }
                Err(err) => warn!("Ring watchdog for call {} errored: {}", call_id, err),
            }
        });
    }
}

/// The assigned support agent on a call, if its receiver is one.
fn assigned_agent(call: &Call) -> Option<AgentId> {
    if call.receiver.kind == PartyKind::Admin && !call.receiver.is_support_intake() {
        Some(AgentId::new(call.receiver.id.as_str()))
    } else {
        None
    }
}
