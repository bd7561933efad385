/// Native webcam capture (feature `webcam`)
///
/// The nokhwa camera lives on its own thread for the lifetime of the stream
/// and publishes the latest decoded frame; the stream handle only holds the
/// shared slot and the stop flag.
use image::{DynamicImage, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
    RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::{CameraDevice, FacingMode, StreamRequest, VideoStream};
use crate::error::CaptureError;

const REAR_HINTS: [&str; 3] = ["back", "rear", "environment"];
const FRONT_HINTS: [&str; 3] = ["front", "user", "face"];

#[derive(Debug, Clone)]
pub struct Webcam {
    devices: Vec<(CameraIndex, String)>,
    forced_index: Option<u32>,
}

impl Webcam {
    /// `None` when no capture device is present
    pub fn probe(forced_index: Option<u32>) -> Option<Self> {
        let devices: Vec<CameraInfo> = match nokhwa::query(ApiBackend::Auto) {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Could not enumerate cameras");
                return None;
            }
        };
        if devices.is_empty() {
            return None;
        }

        Some(Self {
            devices: devices
                .iter()
                .map(|info| (info.index().clone(), info.human_name()))
                .collect(),
            forced_index,
        })
    }

    /// Forced index, else a device whose name matches the facing, else the first
    fn choose(&self, facing: FacingMode) -> CameraIndex {
        if let Some(index) = self.forced_index {
            return CameraIndex::Index(index);
        }

        let hints: &[&str] = match facing {
            FacingMode::Environment => &REAR_HINTS,
            FacingMode::User => &FRONT_HINTS,
        };
        self.devices
            .iter()
            .find(|(_, name)| {
                let name = name.to_lowercase();
                hints.iter().any(|hint| name.contains(hint))
            })
            .or_else(|| self.devices.first())
            .map(|(index, _)| index.clone())
            .unwrap_or(CameraIndex::Index(0))
    }
}

impl CameraDevice for Webcam {
    fn name(&self) -> String {
        self.devices
            .first()
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| "webcam".to_string())
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError> {
        let index = self.choose(request.facing);
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(request.ideal_width, request.ideal_height),
                FrameFormat::MJPEG,
                30,
            ),
        ));

        let latest: Arc<Mutex<Option<RgbImage>>> = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        let worker = {
            let latest = Arc::clone(&latest);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut camera = match Camera::new(index, format) {
                    Ok(camera) => camera,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = camera.open_stream() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::Acquire) {
                    match camera.frame().and_then(|buffer| buffer.decode_image::<RgbFormat>()) {
                        Ok(decoded) => {
                            let (width, height) = (decoded.width(), decoded.height());
                            if let Some(frame) = RgbImage::from_raw(width, height, decoded.into_raw()) {
                                if let Ok(mut slot) = latest.lock() {
                                    *slot = Some(frame);
                                }
                            }
                        }
                        Err(e) => debug!(error = %e, "Dropped camera frame"),
                    }
                }

                if let Err(e) = camera.stop_stream() {
                    warn!(error = %e, "Camera did not stop cleanly");
                }
            })
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(WebcamStream {
                latest,
                running,
                worker: Some(worker),
            })),
            Ok(Err(message)) => {
                let _ = worker.join();
                Err(CaptureError::Acquisition(message))
            }
            Err(_) => Err(CaptureError::Acquisition(
                "camera thread exited".to_string(),
            )),
        }
    }
}

struct WebcamStream {
    latest: Arc<Mutex<Option<RgbImage>>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl VideoStream for WebcamStream {
    fn current_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CaptureError::Stopped);
        }
        let slot = self
            .latest
            .lock()
            .map_err(|e| CaptureError::Frame(e.to_string()))?;
        slot.clone()
            .map(DynamicImage::ImageRgb8)
            .ok_or(CaptureError::NoFrame)
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.running.load(Ordering::Acquire))
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            // Waits for the in-progress frame so the device is released on return
            let _ = worker.join();
        }
    }
}

impl Drop for WebcamStream {
    fn drop(&mut self) {
        self.stop();
    }
}
