//! RTSP to MJPEG relay

pub mod capture;
pub mod mjpeg;
pub mod placeholder;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use image::{imageops, RgbImage};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::camera_state::CameraState;
use crate::config::{ConfigStore, VideoConfig};
use crate::types::StreamStatus;

pub use capture::{CaptureOpener, FfmpegOpener, FrameSource};

const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Closed,
    Opening,
    Reading,
    Buffering,
    Offline,
}

impl RelayState {
    /// What the UI sees; `None` leaves the published status untouched
    fn stream_status(self) -> Option<StreamStatus> {
        match self {
            RelayState::Reading => Some(StreamStatus::Live),
            RelayState::Buffering => Some(StreamStatus::Buffering),
            RelayState::Offline => Some(StreamStatus::Offline),
            RelayState::Closed | RelayState::Opening => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub failure_threshold: u32,
    pub retry_delay: Duration,
    pub error_backoff: Duration,
}

impl From<&VideoConfig> for RelaySettings {
    fn from(video: &VideoConfig) -> Self {
        Self {
            width: video.width,
            height: video.height,
            jpeg_quality: video.jpeg_quality,
            failure_threshold: video.failure_threshold,
            retry_delay: Duration::from_millis(video.retry_delay_ms),
            error_backoff: Duration::from_millis(video.error_backoff_ms),
        }
    }
}

/// Result of one relay iteration
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Frame(Bytes),
    Placeholder(Bytes),
    Skipped,
}

/// One viewer's relay loop.
///
/// The session owns its capture handle; dropping the session drops the
/// handle and with it the decoder process.
pub struct StreamSession {
    opener: Arc<dyn CaptureOpener>,
    config: Arc<ConfigStore>,
    state: CameraState,
    settings: RelaySettings,
    capture: Option<Box<dyn FrameSource>>,
    relay_state: RelayState,
    published: Option<StreamStatus>,
    opened_once: bool,
    failures: u32,
    fps_window_start: Instant,
    fps_frames: u32,
    placeholder: Option<Bytes>,
}

impl StreamSession {
    pub fn new(opener: Arc<dyn CaptureOpener>, config: Arc<ConfigStore>, state: CameraState) -> Self {
        let settings = RelaySettings::from(config.video());
        Self {
            opener,
            config,
            state,
            settings,
            capture: None,
            relay_state: RelayState::Closed,
            published: None,
            opened_once: false,
            failures: 0,
            fps_window_start: Instant::now(),
            fps_frames: 0,
            placeholder: None,
        }
    }

    pub fn relay_state(&self) -> RelayState {
        self.relay_state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    async fn transition(&mut self, next: RelayState) {
        if self.relay_state == next {
            return;
        }
        debug!("📺 Relay {:?} -> {:?}", self.relay_state, next);

        self.relay_state = next;
        if let Some(status) = next.stream_status() {
            if self.published != Some(status) {
                self.published = Some(status);
                self.state.set_stream_status(status).await;
            }
        }
        if next == RelayState::Offline {
            self.state.set_stream_fps(0).await;
        }
    }

    /// Run one iteration: make sure a capture is open, read a frame and
    /// encode it, or count the failure.
    pub async fn step(&mut self) -> StepOutcome {
        let needs_open = match self.capture.as_mut() {
            Some(capture) => !capture.is_open(),
            None => true,
        };

        if needs_open {
            if self.capture.take().is_some() {
                debug!("Capture handle closed, reopening");
            }
            self.transition(RelayState::Closed).await;
            self.transition(RelayState::Opening).await;
            if !self.opened_once {
                self.failures = 0;
                self.opened_once = true;
            }

            let endpoint = self.config.endpoint().await;
            match self.opener.open(&endpoint.rtsp_url).await {
                Ok(capture) => self.capture = Some(capture),
                Err(e) => {
                    warn!("❌ Could not open {}: {}", endpoint.rtsp_url, e);
                    return self.fail(self.settings.error_backoff).await;
                }
            }
        }

        let read = match self.capture.as_mut() {
            Some(capture) => capture.read_frame().await,
            None => return self.fail(self.settings.retry_delay).await,
        };

        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Frame read failed: {}", e);
                return self.fail(self.settings.retry_delay).await;
            }
        };

        self.failures = 0;
        if self.relay_state == RelayState::Reading {
            self.count_frame().await;
        } else {
            // A fresh run of frames starts a fresh measurement window
            self.transition(RelayState::Reading).await;
            self.fps_window_start = Instant::now();
            self.fps_frames = 0;
        }

        match self.encode(frame) {
            Ok(jpeg) => StepOutcome::Frame(mjpeg::frame_chunk(&jpeg)),
            Err(e) => {
                warn!("JPEG encode failed: {}", e);
                self.fail(self.settings.retry_delay).await
            }
        }
    }

    async fn fail(&mut self, delay: Duration) -> StepOutcome {
        self.failures = self.failures.saturating_add(1);

        if self.failures > self.settings.failure_threshold {
            if self.published != Some(StreamStatus::Offline) {
                warn!("📴 Stream offline after {} consecutive failures", self.failures);
            }
            self.capture = None;
            self.transition(RelayState::Offline).await;
            let placeholder = self.placeholder_chunk();
            tokio::time::sleep(delay).await;
            StepOutcome::Placeholder(placeholder)
        } else {
            self.transition(RelayState::Buffering).await;
            tokio::time::sleep(delay).await;
            StepOutcome::Skipped
        }
    }

    async fn count_frame(&mut self) {
        self.fps_frames += 1;
        let now = Instant::now();
        if now.duration_since(self.fps_window_start) >= FPS_WINDOW {
            self.state.set_stream_fps(self.fps_frames).await;
            self.fps_frames = 0;
            self.fps_window_start = now;
        }
    }

    fn encode(&self, frame: RgbImage) -> anyhow::Result<Bytes> {
        let (width, height) = (self.settings.width, self.settings.height);
        let frame = if frame.dimensions() == (width, height) {
            frame
        } else {
            imageops::resize(&frame, width, height, imageops::FilterType::Triangle)
        };
        mjpeg::encode_jpeg(&frame, self.settings.jpeg_quality)
    }

    fn placeholder_chunk(&mut self) -> Bytes {
        if let Some(chunk) = &self.placeholder {
            return chunk.clone();
        }

        let image = placeholder::offline_frame(self.settings.width, self.settings.height);
        let chunk = match mjpeg::encode_jpeg(&image, self.settings.jpeg_quality) {
            Ok(jpeg) => mjpeg::frame_chunk(&jpeg),
            Err(e) => {
                warn!("Placeholder encode failed: {}", e);
                return mjpeg::frame_chunk(&[]);
            }
        };
        self.placeholder = Some(chunk.clone());
        chunk
    }

    /// Loop until an iteration produces bytes for the viewer
    pub async fn next_chunk(&mut self) -> Bytes {
        loop {
            match self.step().await {
                StepOutcome::Frame(chunk) | StepOutcome::Placeholder(chunk) => return chunk,
                StepOutcome::Skipped => continue,
            }
        }
    }

    /// Endless multipart body, ending only when `cancel` fires or the
    /// viewer goes away
    pub fn into_stream(self, cancel: CancellationToken) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        info!("📺 Relay session started");
        futures::stream::unfold((self, cancel), |(mut session, cancel)| async move {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = session.next_chunk() => Some(chunk),
            };
            chunk.map(|chunk| (Ok(chunk), (session, cancel)))
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        debug!("📺 Relay session closed (state {:?})", self.relay_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Read {
        Frame,
        Fail,
    }

    /// Shared read script consumed by every source the opener hands out.
    /// An exhausted script fails every read.
    #[derive(Default)]
    struct Script {
        reads: Mutex<VecDeque<Read>>,
        opens: AtomicUsize,
        dropped: AtomicBool,
    }

    struct ScriptedSource {
        script: Arc<Script>,
        read_delay: Duration,
        open: bool,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn read_frame(&mut self) -> Result<RgbImage> {
            if !self.read_delay.is_zero() {
                tokio::time::sleep(self.read_delay).await;
            }
            let next = self.script.reads.lock().unwrap().pop_front().unwrap_or(Read::Fail);
            match next {
                Read::Frame => Ok(RgbImage::from_pixel(32, 18, image::Rgb([0, 120, 255]))),
                Read::Fail => Err(anyhow!("scripted read failure")),
            }
        }

        fn is_open(&mut self) -> bool {
            self.open
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.script.dropped.store(true, Ordering::SeqCst);
        }
    }

    struct ScriptedOpener {
        script: Arc<Script>,
        read_delay: Duration,
        refuse: bool,
    }

    #[async_trait]
    impl CaptureOpener for ScriptedOpener {
        async fn open(&self, _url: &str) -> Result<Box<dyn FrameSource>> {
            self.script.opens.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(anyhow!("connection refused"));
            }
            Ok(Box::new(ScriptedSource {
                script: self.script.clone(),
                read_delay: self.read_delay,
                open: true,
            }))
        }
    }

    fn session_with(reads: Vec<Read>, read_delay: Duration, refuse: bool) -> (StreamSession, Arc<Script>, CameraState) {
        let script = Arc::new(Script {
            reads: Mutex::new(reads.into()),
            ..Script::default()
        });
        let opener = Arc::new(ScriptedOpener {
            script: script.clone(),
            read_delay,
            refuse,
        });

        let mut config = AppConfig::default();
        config.video.width = 64;
        config.video.height = 36;
        let state = CameraState::new();
        let session = StreamSession::new(opener, Arc::new(ConfigStore::new(config, None)), state.clone());
        (session, script, state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_turn_into_placeholder_then_recover() {
        let mut reads = vec![Read::Fail; 20];
        reads.push(Read::Frame);
        let (mut session, script, state) = session_with(reads, Duration::ZERO, false);

        for attempt in 1..=20 {
            let outcome = session.step().await;
            if attempt <= 10 {
                assert_eq!(outcome, StepOutcome::Skipped, "attempt {}", attempt);
                assert_eq!(state.snapshot().await.stream_status, StreamStatus::Buffering);
            } else {
                assert!(matches!(outcome, StepOutcome::Placeholder(_)), "attempt {}", attempt);
                assert_eq!(state.snapshot().await.stream_status, StreamStatus::Offline);
                assert_eq!(session.relay_state(), RelayState::Offline);
            }
        }
        assert_eq!(session.failures(), 20);
        // One open for the buffering run, then a reopen per offline iteration
        assert_eq!(script.opens.load(Ordering::SeqCst), 10);

        match session.step().await {
            StepOutcome::Frame(chunk) => {
                assert!(chunk.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8"));
                assert!(chunk.ends_with(b"\xFF\xD9\r\n"));
            }
            other => panic!("expected a frame, got {:?}", other),
        }
        assert_eq!(session.failures(), 0);
        assert_eq!(session.relay_state(), RelayState::Reading);
        assert_eq!(state.snapshot().await.stream_status, StreamStatus::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_is_cached() {
        let (mut session, _script, _state) = session_with(vec![], Duration::ZERO, false);
        for _ in 0..10 {
            session.step().await;
        }

        let first = session.next_chunk().await;
        let second = session.next_chunk().await;
        assert_eq!(first, second);
        assert!(first.starts_with(b"--frame\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failures_back_off() {
        let (mut session, script, state) = session_with(vec![], Duration::ZERO, true);

        let started = Instant::now();
        assert_eq!(session.step().await, StepOutcome::Skipped);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));

        for _ in 0..10 {
            session.step().await;
        }
        assert_eq!(script.opens.load(Ordering::SeqCst), 11);
        assert_eq!(state.snapshot().await.stream_status, StreamStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fps_published_once_per_second() {
        let (mut session, _script, state) = session_with(vec![Read::Frame; 30], Duration::from_millis(40), false);

        // The first read opens the window, so nothing is published for a second
        for _ in 0..25 {
            assert!(matches!(session.step().await, StepOutcome::Frame(_)));
        }
        assert_eq!(state.snapshot().await.stream_fps, 0);

        session.step().await;
        assert_eq!(state.snapshot().await.stream_fps, 25);

        for _ in 0..4 {
            session.step().await;
        }
        assert_eq!(state.snapshot().await.stream_fps, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fps_restarts_after_outage() {
        let mut reads = vec![Read::Frame; 30];
        reads.extend(vec![Read::Fail; 20]);
        reads.extend(vec![Read::Frame; 26]);
        let (mut session, _script, state) = session_with(reads, Duration::from_millis(40), false);

        for _ in 0..30 {
            session.step().await;
        }
        assert_eq!(state.snapshot().await.stream_fps, 25);

        for _ in 0..20 {
            session.step().await;
        }
        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.stream_status, StreamStatus::Offline);
        assert_eq!(snapshot.stream_fps, 0);

        // Frames counted before the outage must not leak into the first window after it
        assert!(matches!(session.step().await, StepOutcome::Frame(_)));
        assert_eq!(state.snapshot().await.stream_fps, 0);
        for _ in 0..24 {
            session.step().await;
        }
        assert_eq!(state.snapshot().await.stream_fps, 0);

        session.step().await;
        assert_eq!(state.snapshot().await.stream_fps, 25);
        assert_eq!(state.snapshot().await.stream_status, StreamStatus::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_stream_and_drops_capture() {
        let (session, script, _state) = session_with(vec![Read::Frame; 3], Duration::from_millis(40), false);
        let cancel = CancellationToken::new();
        let mut stream = Box::pin(session.into_stream(cancel.clone()));

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"--frame\r\n"));
        assert!(!script.dropped.load(Ordering::SeqCst));

        cancel.cancel();
        assert!(stream.next().await.is_none());
        drop(stream);
        assert!(script.dropped.load(Ordering::SeqCst));
    }
}
