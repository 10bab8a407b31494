//! Object storage capability.
//!
//! Archival audio is written at a deterministic key per call; reads go
//! exclusively through time-limited signed URLs, never a public path.
//! The store itself is a collaborator: a local-filesystem implementation is
//! provided for single-node deployments and an in-memory one for tests.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::error::{ArchiveError, Result};

type HmacSha256 = Hmac<Sha256>;

/// A time-limited, authorization-scoped download link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// HMAC-SHA256 URL signer shared by store implementations.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
    base: String,
}

impl UrlSigner {
    /// `base` is the URL prefix signed links are rooted at, without a
    /// trailing slash.
    pub fn new(secret: &[u8], base: impl Into<String>) -> Self {
        // HMAC accepts keys of any length; this cannot fail.
        let mac = HmacSha256::new_from_slice(secret).expect("hmac key");
        Self {
            mac,
            base: base.into(),
        }
    }

    fn token(&self, key: &str, expires_unix: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_unix.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Issue a signed URL for `key` valid for `ttl`.
    pub fn url_for(&self, key: &str, ttl: Duration) -> SignedUrl {
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64);
        let expires_unix = expires_at.timestamp();
        let sig = self.token(key, expires_unix);
        SignedUrl {
            url: format!(
                "{}/{}?expires={}&signature={}",
                self.base, key, expires_unix, sig
            ),
            expires_at,
        }
    }

    /// Verify a signature for `key`: authentic and not yet expired.
    pub fn verify(&self, key: &str, expires_unix: i64, signature: &str) -> bool {
        let Some(expiry) = Utc.timestamp_opt(expires_unix, 0).single() else {
            return false;
        };
        if expiry <= Utc::now() {
            return false;
        }

        let Ok(presented) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires_unix.to_string().as_bytes());
        mac.verify_slice(&presented).is_ok()
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").field("base", &self.base).finish()
    }
}

/// Object storage contract used by the recorder and playback gateway.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any previous content at `key`.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read an object back.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Issue a time-limited signed download URL for `key`.
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl>;
}

/// Filesystem-backed store for single-node deployments.
pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, secret: &[u8], url_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            signer: UrlSigner::new(secret, url_base),
        }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys must stay under the store root.
        if key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(ArchiveError::object_store(format!("bad key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::object_store(e.to_string()))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ArchiveError::object_store(e.to_string()))?;
        debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| ArchiveError::object_store(format!("{}: {e}", path.display())))?;
        Ok(Bytes::from(data))
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl> {
        Ok(self.signer.url_for(key, ttl))
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Bytes>,
    signer: Option<UrlSigner>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            signer: Some(UrlSigner::new(b"memory-store-secret", "mem://archive")),
        }
    }

    pub fn signer(&self) -> Option<&UrlSigner> {
        self.signer.as_ref()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.objects.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ArchiveError::object_store(format!("no object at {key}")))
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| ArchiveError::object_store("signer not configured"))?;
        Ok(signer.url_for(key, ttl))
    }
}

/// Deterministic archive key for a call.
pub fn archive_key(call_id: roadcall_call_ledger::CallId) -> String {
    format!("recordings/{call_id}.adp")
}
