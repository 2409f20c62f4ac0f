use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use framepipe::{
    EncodeOptions, EncoderSink, EncoderSpawner, FramepipeError, FramepipeResult, FrameStream,
    SourceImage,
};

/// Shared observer for everything a mock encoder run sees.
#[derive(Default)]
struct PipeLog {
    spawns: AtomicUsize,
    writes: AtomicUsize,
    bytes: AtomicUsize,
    finishes: AtomicUsize,
    spawned_geometry: Mutex<Option<(u32, u32)>>,
}

struct MockSpawner {
    log: Arc<PipeLog>,
    failures_left: AtomicUsize,
}

impl MockSpawner {
    fn ok(log: Arc<PipeLog>) -> Box<Self> {
        Box::new(Self {
            log,
            failures_left: AtomicUsize::new(0),
        })
    }

    fn failing_once(log: Arc<PipeLog>) -> Box<Self> {
        Box::new(Self {
            log,
            failures_left: AtomicUsize::new(1),
        })
    }
}

impl EncoderSpawner for MockSpawner {
    fn spawn(
        &self,
        geometry: (u32, u32),
        _options: &EncodeOptions,
        _output: &Path,
    ) -> FramepipeResult<Box<dyn EncoderSink>> {
        self.log.spawns.fetch_add(1, Ordering::Relaxed);
        if self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FramepipeError::init("mock spawn failure"));
        }
        *self.log.spawned_geometry.lock().unwrap() = Some(geometry);
        Ok(Box::new(MockSink {
            log: self.log.clone(),
        }))
    }
}

struct MockSink {
    log: Arc<PipeLog>,
}

impl EncoderSink for MockSink {
    fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.log.writes.fetch_add(1, Ordering::Relaxed);
        self.log.bytes.fetch_add(bytes.len(), Ordering::Relaxed);
        Ok(())
    }

    fn finish(self: Box<Self>) -> FramepipeResult<()> {
        self.log.finishes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn frame(width: u32, height: u32) -> SourceImage {
    SourceImage::rgba8(
        width,
        height,
        vec![0x42; (width * height * 4) as usize],
    )
}

fn mock_stream(log: &Arc<PipeLog>) -> FrameStream {
    FrameStream::with_spawner("out.mp4", EncodeOptions::default(), MockSpawner::ok(log.clone()))
}

#[test]
fn geometry_locks_to_the_first_frame() {
    let log = Arc::new(PipeLog::default());
    let mut stream = mock_stream(&log);

    stream.submit_image(&frame(64, 64)).unwrap();
    assert_eq!(stream.geometry(), Some((64, 64)));
    assert!(stream.is_active());
    assert_eq!(log.bytes.load(Ordering::Relaxed), 64 * 64 * 4);

    let err = stream.submit_image(&frame(100, 100)).unwrap_err();
    assert!(matches!(err, FramepipeError::GeometryMismatch(_)));

    // The mismatch wrote nothing; only the accepted frame hit the pipe.
    assert_eq!(log.writes.load(Ordering::Relaxed), 1);
    assert_eq!(stream.geometry(), Some((64, 64)));

    stream.close().unwrap();
    assert_eq!(log.finishes.load(Ordering::Relaxed), 1);
}

#[test]
fn preset_geometry_is_used_for_the_spawn_and_enforced() {
    let log = Arc::new(PipeLog::default());
    let mut stream = mock_stream(&log).with_geometry(64, 64);

    let err = stream.submit_image(&frame(32, 32)).unwrap_err();
    assert!(matches!(err, FramepipeError::GeometryMismatch(_)));
    assert_eq!(*log.spawned_geometry.lock().unwrap(), Some((64, 64)));
    assert_eq!(log.writes.load(Ordering::Relaxed), 0);

    stream.submit_image(&frame(64, 64)).unwrap();
    assert_eq!(log.writes.load(Ordering::Relaxed), 1);
}

#[test]
fn close_before_any_submit_is_not_open() {
    let log = Arc::new(PipeLog::default());
    let mut stream = mock_stream(&log);
    let err = stream.close().unwrap_err();
    assert!(matches!(err, FramepipeError::NotOpen(_)));
    assert_eq!(log.finishes.load(Ordering::Relaxed), 0);
}

#[test]
fn closed_stream_rejects_submits_and_further_closes() {
    let log = Arc::new(PipeLog::default());
    let mut stream = mock_stream(&log);

    stream.submit_image(&frame(8, 8)).unwrap();
    stream.close().unwrap();

    let err = stream.submit_image(&frame(8, 8)).unwrap_err();
    assert!(matches!(err, FramepipeError::NotOpen(_)));

    // close is not idempotent: a second close errors too.
    let err = stream.close().unwrap_err();
    assert!(matches!(err, FramepipeError::NotOpen(_)));
    assert_eq!(log.finishes.load(Ordering::Relaxed), 1);
}

#[test]
fn failed_init_leaves_the_stream_unopened_and_retryable() {
    let log = Arc::new(PipeLog::default());
    let mut stream = FrameStream::with_spawner(
        "out.mp4",
        EncodeOptions::default(),
        MockSpawner::failing_once(log.clone()),
    );

    let err = stream.submit_image(&frame(16, 16)).unwrap_err();
    assert!(matches!(err, FramepipeError::Init(_)));
    assert!(!stream.is_active());
    assert_eq!(stream.geometry(), None);
    assert_eq!(log.writes.load(Ordering::Relaxed), 0);

    // Same stream, second attempt succeeds once the environment is fixed.
    stream.submit_image(&frame(16, 16)).unwrap();
    assert!(stream.is_active());
    assert_eq!(stream.geometry(), Some((16, 16)));
    assert_eq!(log.spawns.load(Ordering::Relaxed), 2);
    assert_eq!(log.writes.load(Ordering::Relaxed), 1);
}

#[test]
fn decode_failure_surfaces_before_any_spawn() {
    let log = Arc::new(PipeLog::default());
    let mut stream = mock_stream(&log);
    let err = stream.submit_path("no/such/frame.png").unwrap_err();
    assert!(matches!(err, FramepipeError::Decode(_)));
    assert_eq!(log.spawns.load(Ordering::Relaxed), 0);
}
