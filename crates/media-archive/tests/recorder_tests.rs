//! End-to-end recorder and playback tests against in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use roadcall_call_ledger::{Call, CallId, CallLedger, CallStatus, CallStore, Party, StaticDirectory};
use roadcall_media_archive::{
    archive_key, container, ArchiveError, AudioFrame, CallRecorder, CaptureSink,
    MemoryObjectStore, ObjectStore, PlaybackGateway, Recording, RecorderConfig, RecordingStatus,
    RecordingStore, SignedUrl,
};

const SAMPLE_RATE: usize = 8_000;

struct TestRig {
    ledger: Arc<CallLedger>,
    recorder: Arc<CallRecorder>,
    objects: Arc<MemoryObjectStore>,
    _driver: tokio::task::JoinHandle<()>,
}

async fn rig_with(
    objects: Arc<dyn ObjectStore>,
    config: RecorderConfig,
) -> (Arc<CallLedger>, Arc<CallRecorder>, tokio::task::JoinHandle<()>) {
    let call_store = CallStore::in_memory().await.expect("store creation failed");
    let recording_store = RecordingStore::new(call_store.pool().clone())
        .await
        .expect("recording store creation failed");
    let ledger = Arc::new(CallLedger::new(call_store, Arc::new(StaticDirectory::new())));
    let recorder = Arc::new(CallRecorder::new(
        Arc::clone(&ledger),
        recording_store,
        objects,
        config,
    ));
    let driver = recorder.run(ledger.subscribe());
    (ledger, recorder, driver)
}

async fn rig() -> TestRig {
    let objects = Arc::new(MemoryObjectStore::new());
    let config = RecorderConfig {
        retry_backoff: Duration::from_millis(5),
        ..Default::default()
    };
    let (ledger, recorder, driver) = rig_with(objects.clone(), config).await;
    TestRig {
        ledger,
        recorder,
        objects,
        _driver: driver,
    }
}

async fn connected_recorded_call(ledger: &CallLedger) -> Call {
    let call = ledger
        .create_call(Party::customer("cust-1"), Party::partner("part-1"), true)
        .await
        .expect("call creation failed");
    ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .expect("connect failed")
}

/// Wait for the recorder driver to open the capture for a call.
async fn wait_sink(recorder: &CallRecorder, call_id: CallId) -> CaptureSink {
    for _ in 0..100 {
        if let Some(sink) = recorder.sink(call_id) {
            return sink;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("capture never started for call {call_id}");
}

/// Wait for the recording row of a call to reach `status`.
async fn wait_status(
    store: &RecordingStore,
    call_id: CallId,
    status: RecordingStatus,
) -> Recording {
    for _ in 0..100 {
        if let Some(recording) = store.find_by_call(call_id).await.expect("store read failed") {
            if recording.status == status {
                return recording;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("recording for call {call_id} never reached {status}");
}

fn tone(seconds: usize) -> Vec<i16> {
    (0..seconds * SAMPLE_RATE)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            ((t * 330.0 * std::f64::consts::TAU).sin() * 12_000.0) as i16
        })
        .collect()
}

#[tokio::test]
async fn three_minute_call_produces_ready_archive() {
    let rig = rig().await;
    let call = connected_recorded_call(&rig.ledger).await;

    // The driver starts the capture off the connected event.
    let sink = wait_sink(&rig.recorder, call.id).await;

    // Feed three minutes of audio in 20ms frames, the way a media path would.
    for chunk in tone(180).chunks(160) {
        sink.push(AudioFrame::new(chunk.to_vec()));
    }

    rig.ledger
        .transition(call.id, CallStatus::Ended, None)
        .await
        .unwrap();

    let recording = wait_status(rig.recorder.store(), call.id, RecordingStatus::Ready).await;

    assert!((recording.duration_seconds - 180.0).abs() < 0.5);
    assert!(
        recording.compression_ratio > 7.5 && recording.compression_ratio < 12.0,
        "ratio was {}",
        recording.compression_ratio
    );

    // file_size_bytes reflects the compressed artifact, not the capture.
    let artifact = rig.objects.get(&archive_key(call.id)).await.unwrap();
    assert_eq!(artifact.len() as i64, recording.file_size_bytes);
    assert!(recording.compression_ratio > 1.0);

    let (header, payload) = container::read_archive(&artifact).unwrap();
    assert_eq!(header.sample_rate, SAMPLE_RATE as u32);
    assert_eq!(header.sample_count, (180 * SAMPLE_RATE) as u64);
    assert_eq!(payload.len(), 180 * SAMPLE_RATE / 4);

    // The call row points back at the archive.
    let call = rig.ledger.find(call.id).await.unwrap().unwrap();
    assert_eq!(call.recording_id.as_deref(), Some(recording.id.as_str()));
}

#[tokio::test]
async fn unrecorded_call_leaves_no_recording_row() {
    let rig = rig().await;
    let call = rig
        .ledger
        .create_call(Party::customer("cust-1"), Party::partner("part-1"), false)
        .await
        .unwrap();
    rig.ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .unwrap();
    rig.ledger
        .transition(call.id, CallStatus::Ended, None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rig
        .recorder
        .store()
        .find_by_call(call.id)
        .await
        .unwrap()
        .is_none());
    assert!(rig.objects.is_empty());
}

#[tokio::test]
async fn call_that_never_connects_is_never_recorded() {
    let rig = rig().await;
    let call = rig
        .ledger
        .create_call(Party::customer("cust-1"), Party::partner("part-1"), true)
        .await
        .unwrap();
    rig.ledger
        .transition(call.id, CallStatus::Missed, None)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rig
        .recorder
        .store()
        .find_by_call(call.id)
        .await
        .unwrap()
        .is_none());
}

/// Object store that refuses every upload.
struct BrokenObjectStore;

#[async_trait]
impl ObjectStore for BrokenObjectStore {
    async fn put(&self, _key: &str, _data: Bytes) -> roadcall_media_archive::Result<()> {
        Err(ArchiveError::object_store("disk on fire"))
    }

    async fn get(&self, key: &str) -> roadcall_media_archive::Result<Bytes> {
        Err(ArchiveError::object_store(format!("no object at {key}")))
    }

    fn signed_url(&self, _key: &str, _ttl: Duration) -> roadcall_media_archive::Result<SignedUrl> {
        Err(ArchiveError::object_store("unavailable"))
    }
}

#[tokio::test]
async fn upload_failure_exhausts_retries_then_marks_failed() {
    let config = RecorderConfig {
        encode_attempts: 2,
        retry_backoff: Duration::from_millis(5),
        ..Default::default()
    };
    let (ledger, recorder, _driver) = rig_with(Arc::new(BrokenObjectStore), config).await;

    let call = connected_recorded_call(&ledger).await;
    let sink = wait_sink(&recorder, call.id).await;
    sink.push(AudioFrame::new(vec![100i16; 8000]));

    ledger
        .transition(call.id, CallStatus::Ended, None)
        .await
        .unwrap();

    // Failed recordings are kept for manual cleanup, never deleted.
    wait_status(recorder.store(), call.id, RecordingStatus::Failed).await;
}

#[tokio::test]
async fn empty_capture_is_marked_failed_not_ready() {
    let rig = rig().await;
    let call = connected_recorded_call(&rig.ledger).await;
    wait_sink(&rig.recorder, call.id).await;

    rig.ledger
        .transition(call.id, CallStatus::Ended, None)
        .await
        .unwrap();

    wait_status(rig.recorder.store(), call.id, RecordingStatus::Failed).await;
}

#[tokio::test]
async fn recording_status_is_monotonic() {
    let call_store = CallStore::in_memory().await.unwrap();
    let store = RecordingStore::new(call_store.pool().clone()).await.unwrap();
    let recording = store
        .create(CallId::new(), "recordings/x.adp", "x.adp")
        .await
        .unwrap();

    store
        .advance(
            &recording.id,
            RecordingStatus::Recording,
            RecordingStatus::Processing,
        )
        .await
        .unwrap();
    store.complete(&recording.id, 1000, 1.0, 8.0).await.unwrap();

    // No going back from ready.
    assert!(store
        .advance(
            &recording.id,
            RecordingStatus::Ready,
            RecordingStatus::Processing,
        )
        .await
        .is_err());
    assert!(store
        .advance(
            &recording.id,
            RecordingStatus::Ready,
            RecordingStatus::Recording,
        )
        .await
        .is_err());

    // recording -> ready without processing is rejected.
    let second = store
        .create(CallId::new(), "recordings/y.adp", "y.adp")
        .await
        .unwrap();
    assert!(store.complete(&second.id, 1000, 1.0, 8.0).await.is_err());

    // Retention may delete a ready artifact; that is the end of the line.
    store
        .advance(&recording.id, RecordingStatus::Ready, RecordingStatus::Deleted)
        .await
        .unwrap();
    assert!(store
        .advance(
            &recording.id,
            RecordingStatus::Deleted,
            RecordingStatus::Ready,
        )
        .await
        .is_err());
}

mod playback {
    use super::*;

    async fn ready_recording() -> (TestRig, Recording, PlaybackGateway) {
        let rig = rig().await;
        let call = connected_recorded_call(&rig.ledger).await;
        let sink = wait_sink(&rig.recorder, call.id).await;
        sink.push(AudioFrame::new(tone(2)));
        rig.ledger
            .transition(call.id, CallStatus::Ended, None)
            .await
            .unwrap();

        let recording = wait_status(rig.recorder.store(), call.id, RecordingStatus::Ready).await;
        let gateway = PlaybackGateway::new(
            rig.recorder.store().clone(),
            rig.objects.clone() as Arc<dyn ObjectStore>,
        );
        (rig, recording, gateway)
    }

    #[tokio::test]
    async fn playback_requires_admin() {
        let (_rig, recording, gateway) = ready_recording().await;

        for requester in [Party::customer("cust-1"), Party::partner("part-1")] {
            let err = gateway
                .playback_url(&recording.id, &requester)
                .await
                .unwrap_err();
            assert!(matches!(err, ArchiveError::Forbidden(_)));
        }

        gateway
            .playback_url(&recording.id, &Party::admin("ops-1"))
            .await
            .expect("admin playback must succeed");
    }

    #[tokio::test]
    async fn playback_counts_plays_and_download_does_not() {
        let (rig, recording, gateway) = ready_recording().await;
        let admin = Party::admin("ops-1");

        gateway.playback_url(&recording.id, &admin).await.unwrap();
        gateway.playback_url(&recording.id, &admin).await.unwrap();
        let bytes = gateway.download(&recording.id, &admin).await.unwrap();
        assert!(!bytes.is_empty());

        let row = rig
            .recorder
            .store()
            .get(&recording.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.play_count, 2);
        assert!(row.last_played_at.is_some());
    }

    #[tokio::test]
    async fn playback_of_unready_recording_is_rejected() {
        let rig = rig().await;
        let call = connected_recorded_call(&rig.ledger).await;
        wait_sink(&rig.recorder, call.id).await;
        // Call still live: the recording row exists but is not ready.
        let recording = rig
            .recorder
            .store()
            .find_by_call(call.id)
            .await
            .unwrap()
            .unwrap();

        let gateway = PlaybackGateway::new(
            rig.recorder.store().clone(),
            rig.objects.clone() as Arc<dyn ObjectStore>,
        );
        let err = gateway
            .playback_url(&recording.id, &Party::admin("ops-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotReady(_)));

        let err = gateway
            .download("no-such-recording", &Party::admin("ops-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }

    #[tokio::test]
    async fn issued_url_is_signed_and_time_limited() {
        let (rig, recording, gateway) = ready_recording().await;
        let url = gateway
            .playback_url(&recording.id, &Party::admin("ops-1"))
            .await
            .unwrap();

        assert!(url.expires_at > chrono::Utc::now());
        assert!(url.url.contains("expires="));
        assert!(url.url.contains("signature="));

        // The signature checks out against the store's signer.
        let query = url.url.split('?').nth(1).unwrap();
        let mut expires = 0i64;
        let mut sig = String::new();
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("signature", v) => sig = v.to_string(),
                _ => {}
            }
        }
        let signer = rig.objects.signer().unwrap();
        assert!(signer.verify(&recording.file_path, expires, &sig));
        assert!(!signer.verify(&recording.file_path, expires, "tampered"));
    }
}
