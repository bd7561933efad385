/// Frame folder camera
///
/// Replays the still images of a folder as a video stream, each image held on
/// screen for a fixed time before the next one. Lets the scanner run on
/// machines without a camera, and makes capture reproducible.
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;
use walkdir::WalkDir;

use super::{CameraDevice, StreamRequest, VideoStream};
use crate::error::CaptureError;

/// Image extensions picked up from the folder
const FRAME_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

#[derive(Debug, Clone)]
pub struct FrameFolder {
    dir: PathBuf,
    hold: Duration,
}

impl FrameFolder {
    pub fn new(dir: PathBuf, hold: Duration) -> Self {
        Self { dir, hold }
    }

    /// All image files under the folder, in path order
    fn frame_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| path.is_file() && is_frame(path))
            .collect();
        paths.sort();
        paths
    }
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.as_str()))
}

impl CameraDevice for FrameFolder {
    fn name(&self) -> String {
        format!("frames:{}", self.dir.display())
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, CaptureError> {
        let frames = self.frame_paths();
        if frames.is_empty() {
            return Err(CaptureError::Acquisition(format!(
                "no images in {}",
                self.dir.display()
            )));
        }

        debug!(
            dir = %self.dir.display(),
            frames = frames.len(),
            ideal_width = request.ideal_width,
            "Opened frame folder"
        );

        Ok(Box::new(FrameSequence {
            frames,
            hold: self.hold,
            started: Instant::now(),
            decoded: None,
            running: true,
            max_edge: request.ideal_width.max(request.ideal_height),
        }))
    }
}

/// Stream over a fixed list of image files
struct FrameSequence {
    frames: Vec<PathBuf>,
    hold: Duration,
    started: Instant,
    /// Last decoded frame and its index
    decoded: Option<(usize, DynamicImage)>,
    running: bool,
    /// Frames larger than the requested resolution are scaled down
    max_edge: u32,
}

impl FrameSequence {
    fn index_at(&self, elapsed: Duration) -> usize {
        let hold = self.hold.as_millis().max(1);
        ((elapsed.as_millis() / hold) % self.frames.len() as u128) as usize
    }
}

impl VideoStream for FrameSequence {
    fn current_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        if !self.running {
            return Err(CaptureError::Stopped);
        }

        let index = self.index_at(self.started.elapsed());
        if let Some((cached, frame)) = &self.decoded {
            if *cached == index {
                return Ok(frame.clone());
            }
        }

        let path = &self.frames[index];
        let mut frame = image::open(path)
            .map_err(|e| CaptureError::Frame(format!("{}: {}", path.display(), e)))?;
        if self.max_edge > 0 && frame.width().max(frame.height()) > self.max_edge {
            frame = frame.thumbnail(self.max_edge, self.max_edge);
        }

        self.decoded = Some((index, frame.clone()));
        Ok(frame)
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.running)
    }

    fn stop(&mut self) {
        self.running = false;
        self.decoded = None;
    }
}
