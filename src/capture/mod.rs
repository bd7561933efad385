/// Camera capture and barcode detection
///
/// This module handles:
/// - The camera / stream / recognizer seams (traits below)
/// - The Idle -> Streaming -> Detecting state machine (`CapturePipeline`)
/// - Probing which capabilities this machine has (`Capabilities`)
/// - Background frame work, run through `spawn_blocking`
///
/// The pipeline is driven by the application's update loop: it hands out
/// work tickets, the app runs them as tasks, and the results come back tagged
/// with the session they were issued for. Anything tagged with an old session
/// is dropped, so a stop always wins over late results.
use image::{DynamicImage, GrayImage};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, CameraConfig, CameraSource};
use crate::error::CaptureError;

pub mod camera;
pub mod ean;

#[cfg(feature = "webcam")]
pub mod webcam;

use ean::{BarcodeFormat, EanRecognizer};

/// Which way the preferred camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user
    #[default]
    Environment,
    User,
}

/// What the caller would like from the camera; devices pick the closest match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
}

impl StreamRequest {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
            facing: config.facing,
        }
    }
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

/// One decoded barcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBarcode {
    pub raw_value: String,
    pub format: BarcodeFormat,
}

impl DetectedBarcode {
    /// Code the product database files this barcode under
    ///
    /// UPC-A products are keyed by their 13-digit EAN form.
    pub fn catalog_code(&self) -> String {
        match self.format {
            BarcodeFormat::UpcA if self.raw_value.len() == 12 => format!("0{}", self.raw_value),
            _ => self.raw_value.clone(),
        }
    }
}

/// A source of video streams
pub trait CameraDevice: Send + Sync {
    fn name(&self) -> String;

    /// Blocking: open a stream as close to `request` as the device allows
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError>;
}

/// A live camera stream
pub trait VideoStream: Send {
    /// Blocking: the most recent frame
    fn current_frame(&mut self) -> Result<DynamicImage, CaptureError>;

    /// Number of tracks still delivering frames
    fn active_tracks(&self) -> usize;

    /// Stop every track. Must be idempotent.
    fn stop(&mut self);
}

/// Turns a frame into zero or more barcodes
pub trait BarcodeRecognizer: Send + Sync {
    fn detect(&self, frame: &GrayImage) -> Vec<DetectedBarcode>;
}

/// Shared handle to an open stream
///
/// Cloned into background tasks; stopping through any clone stops the stream.
#[derive(Clone)]
pub struct StreamHandle(Arc<Mutex<Box<dyn VideoStream>>>);

impl StreamHandle {
    pub fn new(stream: Box<dyn VideoStream>) -> Self {
        Self(Arc::new(Mutex::new(stream)))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn VideoStream>> {
        // A panic mid-frame leaves the stream usable; stopping must still work
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn grab(&self) -> Result<DynamicImage, CaptureError> {
        let mut stream = self.lock();
        if stream.active_tracks() == 0 {
            return Err(CaptureError::Stopped);
        }
        stream.current_frame()
    }

    pub fn active_tracks(&self) -> usize {
        self.lock().active_tracks()
    }

    pub fn stop(&self) {
        self.lock().stop();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    /// Camera requested or attached, no frame shown yet
    Streaming,
    /// Frames are on screen and the sampling timer runs
    Detecting,
}

/// Ticket for opening the camera
pub struct Acquisition {
    pub session: u64,
    pub camera: Arc<dyn CameraDevice>,
    pub request: StreamRequest,
}

/// Ticket for reading one frame
pub struct FrameJob {
    pub session: u64,
    pub stream: StreamHandle,
}

/// Ticket for running recognition on one frame
pub struct SampleJob {
    pub session: u64,
    pub stream: StreamHandle,
    pub recognizer: Arc<dyn BarcodeRecognizer>,
}

/// Live camera + barcode detection state machine
pub struct CapturePipeline {
    camera: Option<Arc<dyn CameraDevice>>,
    recognizer: Option<Arc<dyn BarcodeRecognizer>>,
    request: StreamRequest,
    state: CaptureState,
    stream: Option<StreamHandle>,
    session: u64,
    sampling: bool,
    previewing: bool,
}

impl CapturePipeline {
    pub fn new(capabilities: &Capabilities, request: StreamRequest) -> Self {
        Self {
            camera: capabilities.camera.clone(),
            recognizer: capabilities.recognizer.clone(),
            request,
            state: CaptureState::Idle,
            stream: None,
            session: 0,
            sampling: false,
            previewing: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != CaptureState::Idle
    }

    /// Whether the sampling timer should be running
    pub fn is_detecting(&self) -> bool {
        self.state == CaptureState::Detecting
    }

    /// Tracks currently held open by the pipeline
    #[cfg(test)]
    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, StreamHandle::active_tracks)
    }

    /// Idle -> Streaming: hand out a ticket to open the camera
    ///
    /// Nothing is acquired unless recognition is available.
    pub fn begin(&mut self) -> Result<Acquisition, CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::AlreadyRunning);
        }
        if self.recognizer.is_none() {
            return Err(CaptureError::RecognitionUnavailable);
        }
        let camera = self.camera.clone().ok_or(CaptureError::NoCamera)?;

        self.session += 1;
        self.state = CaptureState::Streaming;
        info!(session = self.session, camera = %camera.name(), "Starting scanner");

        Ok(Acquisition {
            session: self.session,
            camera,
            request: self.request,
        })
    }

    /// Result of an `Acquisition`
    ///
    /// A stream arriving for an old session is stopped on the spot. A failure
    /// for the current session returns the pipeline to Idle and is handed back.
    pub fn stream_acquired(
        &mut self,
        session: u64,
        result: Result<StreamHandle, CaptureError>,
    ) -> Result<(), CaptureError> {
        if session != self.session || self.state != CaptureState::Streaming {
            if let Ok(stream) = result {
                debug!(session, "Releasing stream acquired after cancel");
                stream.stop();
            }
            return Ok(());
        }

        match result {
            Ok(stream) => {
                if let Some(previous) = self.stream.replace(stream) {
                    previous.stop();
                }
                Ok(())
            }
            Err(e) => {
                warn!(session, error = %e, "Camera acquisition failed");
                self.stop();
                Err(e)
            }
        }
    }

    /// Ticket for the next preview frame, if one is due
    pub fn preview_job(&mut self) -> Option<FrameJob> {
        if self.previewing || !self.is_active() {
            return None;
        }
        let stream = self.stream.clone()?;
        self.previewing = true;
        Some(FrameJob {
            session: self.session,
            stream,
        })
    }

    /// A preview frame reached the screen: Streaming -> Detecting
    ///
    /// Returns whether the frame belongs to the current session.
    pub fn frame_attached(&mut self, session: u64) -> bool {
        if session != self.session {
            return false;
        }
        self.previewing = false;
        if self.state == CaptureState::Streaming && self.stream.is_some() {
            debug!(session, "Video attached, sampling starts");
            self.state = CaptureState::Detecting;
        }
        self.is_active()
    }

    /// A preview read failed; the next tick may retry
    pub fn frame_failed(&mut self, session: u64) {
        if session == self.session {
            self.previewing = false;
        }
    }

    /// Ticket for one recognition pass; at most one is in flight
    pub fn sample_job(&mut self) -> Option<SampleJob> {
        if self.state != CaptureState::Detecting || self.sampling {
            return None;
        }
        let stream = self.stream.clone()?;
        let recognizer = self.recognizer.clone()?;
        self.sampling = true;
        Some(SampleJob {
            session: self.session,
            stream,
            recognizer,
        })
    }

    /// Result of a `SampleJob`: the first candidate's raw value, if any
    ///
    /// Detection keeps running; stopping is up to the caller.
    pub fn sample_finished(
        &mut self,
        session: u64,
        result: Result<Vec<DetectedBarcode>, CaptureError>,
    ) -> Option<DetectedBarcode> {
        if session != self.session {
            return None;
        }
        self.sampling = false;

        match result {
            Ok(barcodes) => barcodes.into_iter().next(),
            Err(e) => {
                debug!(session, error = %e, "Sampling failed");
                None
            }
        }
    }

    /// Any state -> Idle. Cancels sampling and stops every track.
    pub fn stop(&mut self) {
        if self.state != CaptureState::Idle {
            info!(session = self.session, "Stopping scanner");
        }
        // Results already in flight now carry a stale session
        self.session += 1;
        self.state = CaptureState::Idle;
        self.sampling = false;
        self.previewing = false;
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquisition")
            .field("session", &self.session)
            .field("camera", &self.camera.name())
            .field("request", &self.request)
            .finish()
    }
}

impl fmt::Debug for CapturePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturePipeline")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("has_camera", &self.camera.is_some())
            .field("has_recognizer", &self.recognizer.is_some())
            .finish()
    }
}

/// What this machine can do
#[derive(Clone, Default)]
pub struct Capabilities {
    pub recognizer: Option<Arc<dyn BarcodeRecognizer>>,
    pub camera: Option<Arc<dyn CameraDevice>>,
}

impl Capabilities {
    /// Inspect config and hardware
    pub fn probe(config: &AppConfig) -> Self {
        let recognizer: Option<Arc<dyn BarcodeRecognizer>> = if config.scanner.formats.is_empty() {
            warn!("No barcode formats configured, recognition disabled");
            None
        } else {
            let formats: Vec<&str> = config.scanner.formats.iter().map(|f| f.as_str()).collect();
            info!(formats = ?formats, "Barcode recognition available");
            Some(Arc::new(EanRecognizer::new(
                config.scanner.formats.clone(),
                config.scanner.scan_lines,
            )))
        };

        let camera = probe_camera(&config.camera);
        match &camera {
            Some(camera) => info!(camera = %camera.name(), "Camera available"),
            None => info!("No camera available"),
        }

        Self { recognizer, camera }
    }

    pub fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            barcode_detection: self.recognizer.is_some(),
            media_devices: self.camera.is_some(),
        }
    }
}

fn probe_camera(config: &CameraConfig) -> Option<Arc<dyn CameraDevice>> {
    match config.source {
        CameraSource::None => None,
        CameraSource::Frames => frame_folder(config),
        CameraSource::Webcam => native_camera(config),
        CameraSource::Auto => native_camera(config).or_else(|| frame_folder(config)),
    }
}

fn frame_folder(config: &CameraConfig) -> Option<Arc<dyn CameraDevice>> {
    let dir = config.frames_dir.as_ref()?;
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Frame folder does not exist");
        return None;
    }
    Some(Arc::new(camera::FrameFolder::new(
        dir.clone(),
        std::time::Duration::from_millis(config.frame_hold_ms.max(1)),
    )))
}

#[cfg(feature = "webcam")]
fn native_camera(config: &CameraConfig) -> Option<Arc<dyn CameraDevice>> {
    webcam::Webcam::probe(config.device_index).map(|cam| Arc::new(cam) as Arc<dyn CameraDevice>)
}

#[cfg(not(feature = "webcam"))]
fn native_camera(_config: &CameraConfig) -> Option<Arc<dyn CameraDevice>> {
    None
}

/// Capability flags the UI branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub barcode_detection: bool,
    pub media_devices: bool,
}

/// Which top-level screen to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiVariant {
    Scanner,
    Fallback,
}

/// Static decision table from capabilities to screen
pub fn choose_variant(flags: CapabilityFlags) -> UiVariant {
    match (flags.barcode_detection, flags.media_devices) {
        (true, true) => UiVariant::Scanner,
        (true, false) | (false, true) | (false, false) => UiVariant::Fallback,
    }
}

/// RGBA frame ready for display
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Longest edge of preview frames
const PREVIEW_MAX_EDGE: u32 = 960;

/// Open the camera off the UI thread
pub async fn acquire(acquisition: Acquisition) -> Result<StreamHandle, CaptureError> {
    let Acquisition {
        camera, request, ..
    } = acquisition;

    task::spawn_blocking(move || camera.open(&request).map(StreamHandle::new))
        .await
        .map_err(|e| CaptureError::Task(e.to_string()))?
}

/// Read and downscale one frame for the preview
pub async fn preview(job: FrameJob) -> Result<PreviewFrame, CaptureError> {
    task::spawn_blocking(move || {
        let frame = job.stream.grab()?;
        let frame = if frame.width().max(frame.height()) > PREVIEW_MAX_EDGE {
            frame.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE)
        } else {
            frame
        };
        let rgba = frame.to_rgba8();
        Ok(PreviewFrame {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    })
    .await
    .map_err(|e| CaptureError::Task(e.to_string()))?
}

/// Grab the current frame and run recognition on it
pub async fn sample(job: SampleJob) -> Result<Vec<DetectedBarcode>, CaptureError> {
    task::spawn_blocking(move || {
        // The stream lock is released before the recognizer runs
        let frame = job.stream.grab()?;
        Ok(job.recognizer.detect(&frame.to_luma8()))
    })
    .await
    .map_err(|e| CaptureError::Task(e.to_string()))?
}
