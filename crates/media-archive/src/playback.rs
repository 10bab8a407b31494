//! Recording playback gateway.
//!
//! Controlled read access to archival recordings. Administrators are the
//! only supported viewer role; everything else is `Forbidden`. Playback and
//! download differ in exactly one way: issuing a playback URL counts as a
//! play, a raw download does not.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::info;

use roadcall_call_ledger::{Party, PartyKind};

use crate::error::{ArchiveError, Result};
use crate::object_store::{ObjectStore, SignedUrl};
use crate::store::{Recording, RecordingStatus, RecordingStore};

/// Default lifetime of issued playback URLs.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// Gateway over the recording store and object storage.
pub struct PlaybackGateway {
    store: RecordingStore,
    objects: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl PlaybackGateway {
    pub fn new(store: RecordingStore, objects: Arc<dyn ObjectStore>) -> Self {
        Self::with_ttl(store, objects, DEFAULT_URL_TTL)
    }

    pub fn with_ttl(store: RecordingStore, objects: Arc<dyn ObjectStore>, url_ttl: Duration) -> Self {
        Self {
            store,
            objects,
            url_ttl,
        }
    }

    /// Issue a time-limited signed URL for a ready recording.
    ///
    /// Side effect: increments `play_count` and stamps `last_played_at`.
    pub async fn playback_url(&self, recording_id: &str, requester: &Party) -> Result<SignedUrl> {
        let recording = self.authorized_ready(recording_id, requester).await?;

        let url = self.objects.signed_url(&recording.file_path, self.url_ttl)?;
        self.store.mark_played(recording_id).await?;
        info!(
            "Playback URL issued for recording {} to {} (expires {})",
            recording_id, requester, url.expires_at
        );
        Ok(url)
    }

    /// Download the raw artifact. Same authorization as playback, but does
    /// not count as a play.
    pub async fn download(&self, recording_id: &str, requester: &Party) -> Result<Bytes> {
        let recording = self.authorized_ready(recording_id, requester).await?;
        self.objects.get(&recording.file_path).await
    }

    async fn authorized_ready(&self, recording_id: &str, requester: &Party) -> Result<Recording> {
        if requester.kind != PartyKind::Admin {
            return Err(ArchiveError::forbidden(format!(
                "{} may not access recordings",
                requester
            )));
        }

        let recording = self
            .store
            .get(recording_id)
            .await?
            .ok_or_else(|| ArchiveError::not_found(recording_id.to_string()))?;

        if recording.status != RecordingStatus::Ready {
            return Err(ArchiveError::not_ready(format!(
                "recording {} is {}",
                recording_id, recording.status
            )));
        }

        Ok(recording)
    }
}
