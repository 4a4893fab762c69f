use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, info, warn};

use crate::backend::RecognitionBackend;
use crate::models::{AttemptOutcome, MrzFields, RawFrame};
use crate::utils::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Capturing,
    Processing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub enum CaptureMode {
    /// Frames arrive on a tight loop; only every Nth goes through the
    /// expensive recognition stage.
    Continuous { process_every: u32 },
    /// Every offered frame is recognized, as with an explicit capture
    /// button or a single upload.
    SingleShot,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: CaptureMode,
    /// `None` runs until the source ends or the caller cancels; the user
    /// repositioning the document is the retry mechanism.
    pub max_attempts: Option<u32>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            mode: CaptureMode::Continuous { process_every: 10 },
            max_attempts: None,
        }
    }
}

impl ScanConfig {
    pub fn continuous() -> Self {
        ScanConfig::default()
    }

    pub fn single_shot(max_attempts: u32) -> Self {
        ScanConfig {
            mode: CaptureMode::SingleShot,
            max_attempts: Some(max_attempts),
        }
    }
}

/// Mutable state of one scan flow, owned by the controller and reset on
/// every `begin`.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub attempt: u32,
    pub max_attempts: Option<u32>,
    pub state: ScanState,
    pub last_error: Option<String>,
}

/// Where frames come from. Implementations wrap a live camera, a decoded
/// upload, or a prerecorded sequence; the controller only ever pulls.
pub trait FrameSource {
    /// The next frame, `None` once the source is exhausted. Hardware
    /// failures map to the camera error variants and end the session.
    fn next_frame(&mut self) -> Result<Option<RawFrame>, ScanError>;

    /// Release any acquired device handle. Called on every exit path.
    fn release(&mut self) {}
}

/// Receives per-attempt progress, e.g. for a status line in a scan
/// dialog. All methods default to no-ops.
pub trait ScanObserver {
    fn on_status(&mut self, state: ScanState, message: &str) {
        let _ = (state, message);
    }

    fn on_attempt(&mut self, attempt: u32, outcome: &AttemptOutcome) {
        let _ = (attempt, outcome);
    }
}

pub struct NullObserver;

impl ScanObserver for NullObserver {}

/// What happened to one offered frame.
#[derive(Debug)]
pub enum FrameDisposition {
    /// Skipped by the continuous-mode throttle.
    Throttled,
    /// Dropped because a recognition call was still outstanding. Frames
    /// are never queued behind it.
    Busy,
    /// Processed without a valid result; the session keeps capturing.
    Retrying,
    Succeeded(MrzFields),
    Failed(ScanError),
    /// The session is already terminal or was cancelled.
    Finished,
}

/// Drives capture, recognition and retries for one scan flow at a time.
///
/// The controller owns the session state and the recognition backend;
/// the frame source stays with the caller so camera setup and teardown
/// remain outside the pipeline.
pub struct ScanController {
    config: ScanConfig,
    backend: Box<dyn RecognitionBackend>,
    session: ScanSession,
    frame_counter: u64,
    in_flight: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl ScanController {
    pub fn new(config: ScanConfig, backend: Box<dyn RecognitionBackend>) -> Self {
        let max_attempts = config.max_attempts;
        ScanController {
            config,
            backend,
            session: ScanSession {
                attempt: 0,
                max_attempts,
                state: ScanState::Idle,
                last_error: None,
            },
            frame_counter: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Flag shared with the caller; setting it aborts the session at the
    /// next loop entry and returns the controller to `Idle`.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Reset the session and start capturing. `run` calls this; explicit
    /// use is for push-driven callers that feed `offer_frame` themselves.
    pub fn begin(&mut self, observer: &mut dyn ScanObserver) {
        self.session = ScanSession {
            attempt: 0,
            max_attempts: self.config.max_attempts,
            state: ScanState::Capturing,
            last_error: None,
        };
        self.frame_counter = 0;
        self.in_flight.store(false, Ordering::Relaxed);
        self.cancel.store(false, Ordering::Relaxed);
        info!("scan session started ({})", self.backend.name());
        observer.on_status(ScanState::Capturing, "position the document in the frame");
    }

    /// Pull frames from `source` until a valid zone is read, the retry
    /// budget runs out, the source ends, or the caller cancels. The
    /// terminal outcome is the return value and is produced exactly once
    /// per session; the source is released on every exit path.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        observer: &mut dyn ScanObserver,
    ) -> Result<MrzFields, ScanError> {
        self.begin(observer);
        let result = self.drive(source, observer);
        source.release();
        match &result {
            Ok(_) => {}
            Err(ScanError::Cancelled) => {
                self.session.state = ScanState::Idle;
                observer.on_status(ScanState::Idle, "scan cancelled");
            }
            Err(error) => {
                self.session.state = ScanState::Failed;
                self.session.last_error = Some(error.to_string());
            }
        }
        result
    }

    fn drive(
        &mut self,
        source: &mut dyn FrameSource,
        observer: &mut dyn ScanObserver,
    ) -> Result<MrzFields, ScanError> {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(ScanError::Cancelled);
            }
            let frame = match source.next_frame()? {
                Some(frame) => frame,
                None => {
                    debug!("frame source exhausted after {} attempts", self.session.attempt);
                    return Err(ScanError::RetriesExhausted {
                        attempts: self.session.attempt,
                    });
                }
            };
            match self.offer_frame(frame, observer) {
                FrameDisposition::Succeeded(fields) => return Ok(fields),
                FrameDisposition::Failed(error) => return Err(error),
                FrameDisposition::Finished => return Err(ScanError::Cancelled),
                FrameDisposition::Throttled
                | FrameDisposition::Busy
                | FrameDisposition::Retrying => {}
            }
        }
    }

    /// Feed one frame through the pipeline. Push-driven counterpart of
    /// `run` for callers that own the frame loop.
    pub fn offer_frame(
        &mut self,
        frame: RawFrame,
        observer: &mut dyn ScanObserver,
    ) -> FrameDisposition {
        match self.session.state {
            ScanState::Succeeded | ScanState::Failed => return FrameDisposition::Finished,
            ScanState::Idle => self.session.state = ScanState::Capturing,
            ScanState::Capturing | ScanState::Processing => {}
        }
        if self.cancel.load(Ordering::Relaxed) {
            self.session.state = ScanState::Idle;
            observer.on_status(ScanState::Idle, "scan cancelled");
            return FrameDisposition::Finished;
        }

        self.frame_counter += 1;
        if let CaptureMode::Continuous { process_every } = self.config.mode {
            if process_every > 1 && self.frame_counter % u64::from(process_every) != 0 {
                return FrameDisposition::Throttled;
            }
        }

        // At most one recognition may ever be outstanding. A frame that
        // arrives while one is running is dropped, not queued; queuing
        // would grow latency without bound on slow devices.
        if self.in_flight.swap(true, Ordering::Relaxed) {
            warn!("frame dropped: recognition already in flight");
            return FrameDisposition::Busy;
        }
        self.session.state = ScanState::Processing;
        self.session.attempt += 1;
        let outcome = self.backend.recognize_frame(&frame);
        self.in_flight.store(false, Ordering::Relaxed);

        match outcome {
            Ok(AttemptOutcome::Parsed(fields)) if fields.valid => {
                self.session.state = ScanState::Succeeded;
                info!("scan succeeded on attempt {}", self.session.attempt);
                observer.on_attempt(
                    self.session.attempt,
                    &AttemptOutcome::Parsed(fields.clone()),
                );
                observer.on_status(ScanState::Succeeded, "document read and validated");
                FrameDisposition::Succeeded(fields)
            }
            Ok(outcome) => {
                // A parse that failed validation lands here too; partial
                // fields are diagnostics, never a result.
                let message = match &outcome {
                    AttemptOutcome::NoMrz => "no document detected",
                    AttemptOutcome::InvalidChecksum(_) => {
                        "MRZ detected but check digits failed, retrying"
                    }
                    AttemptOutcome::Parsed(_) => "incomplete read, retrying",
                };
                debug!("attempt {}: {}", self.session.attempt, message);
                observer.on_attempt(self.session.attempt, &outcome);
                self.record_miss(message, observer)
            }
            Err(error) if error.is_attempt_local() => {
                warn!("attempt {} failed: {}", self.session.attempt, error);
                self.session.last_error = Some(error.to_string());
                self.record_miss("frame could not be processed, retrying", observer)
            }
            Err(error) => {
                self.session.state = ScanState::Failed;
                self.session.last_error = Some(error.to_string());
                observer.on_status(ScanState::Failed, "scan failed");
                FrameDisposition::Failed(error)
            }
        }
    }

    fn record_miss(
        &mut self,
        message: &str,
        observer: &mut dyn ScanObserver,
    ) -> FrameDisposition {
        if let Some(max) = self.session.max_attempts {
            if self.session.attempt >= max {
                self.session.state = ScanState::Failed;
                observer.on_status(ScanState::Failed, "no valid document found");
                return FrameDisposition::Failed(ScanError::RetriesExhausted {
                    attempts: self.session.attempt,
                });
            }
        }
        self.session.state = ScanState::Capturing;
        observer.on_status(ScanState::Capturing, message);
        FrameDisposition::Retrying
    }
}

/// Pre-decoded frames replayed in order. Used for tests and for callers
/// that batch frames ahead of time.
pub struct FrameSequence {
    frames: VecDeque<RawFrame>,
    released: bool,
}

impl FrameSequence {
    pub fn new(frames: Vec<RawFrame>) -> Self {
        FrameSequence {
            frames: frames.into(),
            released: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn released(&self) -> bool {
        self.released
    }
}

impl FrameSource for FrameSequence {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, ScanError> {
        Ok(self.frames.pop_front())
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// A single uploaded or captured still image.
pub struct StillImageSource {
    frame: Option<RawFrame>,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let image = image::open(path)
            .map_err(|e| ScanError::ImageDecode(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_image(&image))
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        StillImageSource {
            frame: Some(RawFrame::from_dynamic_image(image)),
        }
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, ScanError> {
        Ok(self.frame.take())
    }
}
