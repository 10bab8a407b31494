//! # Media Archive
//!
//! Dual-stream recording for the roadcall voice core. The live,
//! high-fidelity stream is the direct media path between the participants
//! and is never touched here; this crate owns the second stream, a heavily
//! compressed archival copy produced after the call and off the live path,
//! plus the gateway that serves finished archives to administrators through
//! time-limited signed URLs.
//!
//! ## Modules
//!
//! - [`codec`]: low-bitrate archival voice coder (16 kbit/s mono)
//! - [`container`]: artifact framing
//! - [`capture`]: non-blocking live-path tap
//! - [`recorder`]: feed-driven capture lifecycle and encode pipeline
//! - [`store`]: recording rows and the monotonic status lifecycle
//! - [`object_store`]: storage capability with signed URLs
//! - [`playback`]: admin playback/download gateway

pub mod capture;
pub mod codec;
pub mod container;
pub mod error;
pub mod object_store;
pub mod playback;
pub mod recorder;
pub mod store;

pub use capture::{AudioFrame, Capture, CaptureSink};
pub use codec::{AdpcmCodec, CodecInfo, VoiceCodec};
pub use error::{ArchiveError, Result};
pub use object_store::{
    archive_key, LocalObjectStore, MemoryObjectStore, ObjectStore, SignedUrl, UrlSigner,
};
pub use playback::PlaybackGateway;
pub use recorder::{CallRecorder, RecorderConfig};
pub use store::{Recording, RecordingStatus, RecordingStore};
