//! Live-path capture tap.
//!
//! The recorder never sits on the live media path. The path is handed a
//! [`CaptureSink`] whose push is a non-blocking channel send; a drain task
//! accumulates the PCM off to the side. Finalizing waits only for frames
//! already pushed, then yields the raw buffer for the encode job.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One block of 16-bit mono PCM from the live path.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }
}

/// Cheap cloneable handle given to the media path.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    tx: mpsc::UnboundedSender<AudioFrame>,
}

impl CaptureSink {
    /// Push one frame. Never blocks; frames pushed after the capture is
    /// finalized are dropped.
    pub fn push(&self, frame: AudioFrame) {
        let _ = self.tx.send(frame);
    }
}

/// An in-progress capture for one call.
pub struct Capture {
    sink: CaptureSink,
    stop: watch::Sender<bool>,
    task: JoinHandle<Vec<i16>>,
}

impl Capture {
    /// Start a capture bounded at `max_samples` (memory cap; overflow is
    /// dropped with a warning rather than growing without bound).
    pub fn start(max_samples: usize) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AudioFrame>();
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut buffer: Vec<i16> = Vec::new();
            let mut truncated = false;

            loop {
                tokio::select! {
                    frame = rx.recv() => match frame {
                        Some(frame) => {
                            append_capped(&mut buffer, &frame.samples, max_samples, &mut truncated);
                        }
                        None => break,
                    },
                    _ = stopped.changed() => {
                        // Drain whatever was pushed before the stop signal.
                        while let Ok(frame) = rx.try_recv() {
                            append_capped(&mut buffer, &frame.samples, max_samples, &mut truncated);
                        }
                        break;
                    }
                }
            }

            debug!("Capture drained {} samples", buffer.len());
            buffer
        });

        Self {
            sink: CaptureSink { tx },
            stop,
            task,
        }
    }

    /// Handle for the live path.
    pub fn sink(&self) -> CaptureSink {
        self.sink.clone()
    }

    /// Stop the capture and take the accumulated PCM.
    pub async fn finalize(self) -> Vec<i16> {
        let Self { sink, stop, task } = self;
        let _ = stop.send(true);
        drop(sink);
        match task.await {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!("Capture task failed: {}", err);
                Vec::new()
            }
        }
    }
}

fn append_capped(buffer: &mut Vec<i16>, samples: &[i16], max: usize, truncated: &mut bool) {
    let room = max.saturating_sub(buffer.len());
    if room >= samples.len() {
        buffer.extend_from_slice(samples);
        return;
    }
    buffer.extend_from_slice(&samples[..room]);
    if !*truncated {
        *truncated = true;
        warn!("Capture hit the {} sample cap, dropping overflow", max);
    }
}
