//! Dual-stream recorder.
//!
//! The live call is one stream; the archival copy is the other. This
//! component owns only the second: it taps the media path through a
//! [`Capture`], and after the call ends it encodes the buffer with the
//! low-bitrate archival codec and uploads the artifact. Everything here runs
//! on spawned tasks; a slow or failing encode cannot touch an in-progress
//! or future call.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use roadcall_call_ledger::{Call, CallEvent, CallId, CallLedger};

use crate::capture::{Capture, CaptureSink};
use crate::codec::{AdpcmCodec, VoiceCodec, SAMPLE_RATE};
use crate::container;
use crate::error::Result;
use crate::object_store::{archive_key, ObjectStore};
use crate::store::{Recording, RecordingStatus, RecordingStore};

/// Recorder tuning.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Hard cap on captured audio per call.
    pub max_capture: Duration,
    /// Encode/upload attempts before a recording is marked failed.
    pub encode_attempts: u32,
    /// Base backoff between attempts; doubles per retry.
    pub retry_backoff: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_capture: Duration::from_secs(4 * 3600),
            encode_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

struct ActiveRecording {
    recording_id: String,
    capture: Capture,
}

/// Feed-driven recorder for all calls with recording enabled.
pub struct CallRecorder {
    ledger: Arc<CallLedger>,
    store: RecordingStore,
    objects: Arc<dyn ObjectStore>,
    config: RecorderConfig,
    active: DashMap<CallId, ActiveRecording>,
}

impl CallRecorder {
    pub fn new(
        ledger: Arc<CallLedger>,
        store: RecordingStore,
        objects: Arc<dyn ObjectStore>,
        config: RecorderConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            objects,
            config,
            active: DashMap::new(),
        }
    }

    /// The recording row store (shared with the playback gateway).
    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    /// Capture sink for the live path to tap, if this call is recording.
    pub fn sink(&self, call_id: CallId) -> Option<CaptureSink> {
        self.active.get(&call_id).map(|entry| entry.capture.sink())
    }

    /// Number of captures currently running.
    pub fn active_captures(&self) -> usize {
        self.active.len()
    }

    /// Drive the recorder from the ledger feed: start capture when a
    /// recorded call connects, finalize when it reaches a terminal state.
    pub fn run(self: &Arc<Self>, mut events: broadcast::Receiver<CallEvent>) -> JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.is_connected() && event.call.is_recorded {
                            if let Err(err) = recorder.start_capture(&event.call).await {
                                error!(
                                    "Failed to start recording for call {}: {}",
                                    event.call.id, err
                                );
                            }
                        } else if event.is_terminal() {
                            recorder.finalize(event.call.id).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Recorder driver lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Recorder driver stopped: feed closed");
        })
    }

    /// Create the recording row and begin capturing off the live path.
    pub async fn start_capture(&self, call: &Call) -> Result<Recording> {
        if self.active.contains_key(&call.id) {
            debug!("Capture already running for call {}", call.id);
            return self
                .store
                .find_by_call(call.id)
                .await?
                .ok_or_else(|| crate::error::ArchiveError::not_found(call.id.to_string()));
        }

        let file_path = archive_key(call.id);
        let file_name = format!("{}.adp", call.id);
        let recording = self.store.create(call.id, &file_path, &file_name).await?;
        self.ledger
            .link_recording(call.id, &recording.id)
            .await
            .map_err(|e| crate::error::ArchiveError::invalid_state(e.to_string()))?;

        let max_samples = self.config.max_capture.as_secs() as usize * SAMPLE_RATE as usize;
        let capture = Capture::start(max_samples);

        info!("🎙️ Recording {} started for call {}", recording.id, call.id);
        self.active.insert(
            call.id,
            ActiveRecording {
                recording_id: recording.id.clone(),
                capture,
            },
        );

        Ok(recording)
    }

    /// Stop the capture for an ended call and hand the buffer to the
    /// background encode job.
    pub async fn finalize(&self, call_id: CallId) {
        let Some((_, active)) = self.active.remove(&call_id) else {
            return;
        };

        let samples = active.capture.finalize().await;
        let recording_id = active.recording_id;

        if let Err(err) = self
            .store
            .advance(
                &recording_id,
                RecordingStatus::Recording,
                RecordingStatus::Processing,
            )
            .await
        {
            error!("Recording {} could not enter processing: {}", recording_id, err);
            return;
        }

        info!(
            "Recording {} finalized with {} samples, queueing encode",
            recording_id,
            samples.len()
        );

        let store = self.store.clone();
        let objects = Arc::clone(&self.objects);
        let config = self.config.clone();
        tokio::spawn(async move {
            encode_job(store, objects, config, recording_id, call_id, samples).await;
        });
    }
}

/// Background encode job: compress, upload, flip the row to ready; bounded
/// retries with exponential backoff, then failed. Retrying is idempotent:
/// the artifact key is deterministic and a re-upload simply overwrites.
async fn encode_job(
    store: RecordingStore,
    objects: Arc<dyn ObjectStore>,
    config: RecorderConfig,
    recording_id: String,
    call_id: CallId,
    samples: Vec<i16>,
) {
    let raw_size = (samples.len() * 2) as i64;
    let duration_seconds = samples.len() as f64 / f64::from(SAMPLE_RATE);
    let key = archive_key(call_id);

    if samples.is_empty() {
        warn!(
            "Recording {} captured no audio, marking failed",
            recording_id
        );
        mark_failed(&store, &recording_id).await;
        return;
    }

    let mut backoff = config.retry_backoff;
    for attempt in 1..=config.encode_attempts.max(1) {
        match attempt_encode(&objects, &key, &samples).await {
            Ok(artifact_size) => {
                let ratio = raw_size as f64 / artifact_size as f64;
                match store
                    .complete(&recording_id, artifact_size, duration_seconds, ratio)
                    .await
                {
                    Ok(()) => info!(
                        "✅ Recording {} ready: {} bytes, {:.1}s, ratio {:.1}",
                        recording_id, artifact_size, duration_seconds, ratio
                    ),
                    Err(err) => error!("Recording {} completion failed: {}", recording_id, err),
                }
                return;
            }
            Err(err) => {
                warn!(
                    "Encode attempt {}/{} for recording {} failed: {}",
                    attempt, config.encode_attempts, recording_id, err
                );
                if attempt < config.encode_attempts {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    error!(
        "Recording {} failed after {} attempts, leaving for manual cleanup",
        recording_id, config.encode_attempts
    );
    mark_failed(&store, &recording_id).await;
}

async fn attempt_encode(
    objects: &Arc<dyn ObjectStore>,
    key: &str,
    samples: &[i16],
) -> Result<i64> {
    let mut codec = AdpcmCodec::new();
    let payload = codec.encode(samples)?;
    let artifact = container::write_archive(SAMPLE_RATE, samples.len() as u64, &payload);
    let artifact_size = artifact.len() as i64;

    objects.put(key, Bytes::from(artifact)).await?;
    Ok(artifact_size)
}

async fn mark_failed(store: &RecordingStore, recording_id: &str) {
    if let Err(err) = store
        .advance(
            recording_id,
            RecordingStatus::Processing,
            RecordingStatus::Failed,
        )
        .await
    {
        error!("Recording {} could not be marked failed: {}", recording_id, err);
    }
}
