//! Live call monitor.
//!
//! Maintains a real-time view of every call in `ringing` or `connected` by
//! consuming the ledger feed. Elapsed time is computed client-side from
//! `connected_at`; the monitor only serves snapshots. On feed lag the view
//! resyncs from the ledger instead of trusting what it last saw.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use roadcall_call_ledger::{Call, CallEvent, CallId, CallLedger};

/// Real-time view of active calls.
pub struct LiveMonitor {
    ledger: Arc<CallLedger>,
    view: DashMap<CallId, Call>,
}

impl LiveMonitor {
    pub fn new(ledger: Arc<CallLedger>) -> Self {
        Self {
            ledger,
            view: DashMap::new(),
        }
    }

    /// Snapshot of all active calls, oldest first.
    pub fn active_calls(&self) -> Vec<Call> {
        let mut calls: Vec<Call> = self.view.iter().map(|e| e.value().clone()).collect();
        calls.sort_by_key(|c| c.started_at);
        calls
    }

    /// Number of active calls in the view.
    pub fn active_count(&self) -> usize {
        self.view.len()
    }

    /// Replace the view with the ledger's current active set.
    pub async fn resync(&self) {
        match self.ledger.active_calls().await {
            Ok(calls) => {
                self.view.clear();
                for call in calls {
                    self.view.insert(call.id, call);
                }
                debug!("Monitor resynced: {} active calls", self.view.len());
            }
            Err(err) => warn!("Monitor resync failed: {}", err),
        }
    }

    fn apply(&self, event: CallEvent) {
        if event.call.status.is_active() {
            self.view.insert(event.call.id, event.call);
        } else {
            self.view.remove(&event.call.id);
        }
    }

    /// Spawn the feed consumer.
    pub fn run(self: &Arc<Self>, mut events: broadcast::Receiver<CallEvent>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            // Pick up calls that predate this monitor.
            monitor.resync().await;

            loop {
                match events.recv().await {
                    Ok(event) => monitor.apply(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Monitor lagged by {} events, resyncing", skipped);
                        monitor.resync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Monitor stopped: feed closed");
        })
    }
}
