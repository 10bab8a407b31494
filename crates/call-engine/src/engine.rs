//! Engine assembly.
//!
//! Wires the ledger, relay, queue, recorder, monitor, and admin API into
//! one runnable unit and owns their driver tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use roadcall_call_ledger::{
    store::connect_pool, CallLedger, CallStore, Directory, StaticDirectory,
};
use roadcall_media_archive::{
    CallRecorder, MemoryObjectStore, ObjectStore, PlaybackGateway, RecordingStore,
};
use roadcall_signal_relay::SignalRelay;

use crate::api::AdminApi;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::monitor::LiveMonitor;
use crate::orchestrator::CallOrchestrator;
use crate::policy::{CallPolicy, CreditAuthority, DirectCallPolicy, SupportCallPolicy, UnlimitedCredit};
use crate::queue::QueueManager;

/// Builder for a [`CallEngine`].
pub struct CallEngineBuilder {
    config: EngineConfig,
    database_url: String,
    directory: Arc<dyn Directory>,
    credits: Arc<dyn CreditAuthority>,
    objects: Arc<dyn ObjectStore>,
}

impl CallEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            database_url: "sqlite::memory:".to_string(),
            directory: Arc::new(StaticDirectory::new()),
            credits: Arc::new(UnlimitedCredit),
            objects: Arc::new(MemoryObjectStore::new()),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_credit_authority(mut self, credits: Arc<dyn CreditAuthority>) -> Self {
        self.credits = credits;
        self
    }

    pub fn with_object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = objects;
        self
    }

    /// Connect the stores, assemble the components, and spawn the feed
    /// drivers.
    pub async fn build(self) -> Result<CallEngine> {
        let pool = connect_pool(&self.database_url)
            .await
            .map_err(|e| EngineError::internal(e.to_string()))?;
        let call_store = CallStore::new(pool.clone())
            .await
            .map_err(|e| EngineError::internal(e.to_string()))?;
        let recording_store = RecordingStore::new(pool)
            .await
            .map_err(|e| EngineError::internal(e.to_string()))?;

        let ledger = Arc::new(CallLedger::new(call_store, self.directory));

        let relay = Arc::new(SignalRelay::new());
        let relay_task = relay.spawn_driver(ledger.subscribe());

        let recorder = Arc::new(CallRecorder::new(
            Arc::clone(&ledger),
            recording_store.clone(),
            Arc::clone(&self.objects),
            self.config.recording.recorder_config(),
        ));
        let recorder_task = recorder.run(ledger.subscribe());

        let playback = Arc::new(PlaybackGateway::with_ttl(
            recording_store,
            Arc::clone(&self.objects),
            self.config.recording.url_ttl,
        ));

        let queue = Arc::new(QueueManager::new(self.config.queue.max_size));

        let direct_policy: Arc<dyn CallPolicy> = Arc::new(DirectCallPolicy::new(
            Arc::clone(&self.credits),
            self.config.general.lead_price_credits,
        ));
        let support_policy: Arc<dyn CallPolicy> = Arc::new(SupportCallPolicy);

        let orchestrator = Arc::new(CallOrchestrator::new(
            Arc::clone(&ledger),
            Arc::clone(&queue),
            direct_policy,
            support_policy,
            self.config.clone(),
        ));
        let orchestrator_task = orchestrator.run(ledger.subscribe());

        let monitor = Arc::new(LiveMonitor::new(Arc::clone(&ledger)));
        let monitor_task = monitor.run(ledger.subscribe());

        let admin = AdminApi::new(
            Arc::clone(&ledger),
            Arc::clone(&orchestrator),
            Arc::clone(&monitor),
            Arc::clone(&queue),
            Arc::clone(&playback),
        );

        info!("🚀 Call engine assembled");

        Ok(CallEngine {
            config: self.config,
            ledger,
            relay,
            queue,
            orchestrator,
            monitor,
            recorder,
            playback,
            admin,
            tasks: vec![relay_task, recorder_task, orchestrator_task, monitor_task],
        })
    }
}

impl Default for CallEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled voice core.
pub struct CallEngine {
    config: EngineConfig,
    ledger: Arc<CallLedger>,
    relay: Arc<SignalRelay>,
    queue: Arc<QueueManager>,
    orchestrator: Arc<CallOrchestrator>,
    monitor: Arc<LiveMonitor>,
    recorder: Arc<CallRecorder>,
    playback: Arc<PlaybackGateway>,
    admin: AdminApi,
    tasks: Vec<JoinHandle<()>>,
}

impl CallEngine {
    pub fn builder() -> CallEngineBuilder {
        CallEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<CallLedger> {
        &self.ledger
    }

    pub fn relay(&self) -> &Arc<SignalRelay> {
        &self.relay
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn orchestrator(&self) -> &Arc<CallOrchestrator> {
        &self.orchestrator
    }

    pub fn monitor(&self) -> &Arc<LiveMonitor> {
        &self.monitor
    }

    pub fn recorder(&self) -> &Arc<CallRecorder> {
        &self.recorder
    }

    pub fn playback(&self) -> &Arc<PlaybackGateway> {
        &self.playback
    }

    pub fn admin(&self) -> &AdminApi {
        &self.admin
    }

    /// Stop the driver tasks. In-flight encode jobs are not cancelled; they
    /// are already detached and idempotent.
    pub fn shutdown(&mut self) {
        info!("🛑 Call engine shutting down");
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for CallEngine {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
