/// Error types for every fallible concern in the application
///
/// All errors carry owned string payloads so they are `Clone` and can travel
/// inside iced messages back to the update loop.
use std::path::PathBuf;

use thiserror::Error;

/// Remote product lookup errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    #[error("Invalid barcode: {0:?}")]
    InvalidBarcode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Response larger than {0} bytes")]
    TooLarge(usize),
}

/// Failures reading a size-capped HTTP body
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BodyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Response larger than {0} bytes")]
    TooLarge(usize),
}

impl From<BodyError> for LookupError {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::Network(message) => LookupError::Network(message),
            BodyError::TooLarge(limit) => LookupError::TooLarge(limit),
        }
    }
}

impl From<BodyError> for ThumbnailError {
    fn from(e: BodyError) -> Self {
        match e {
            BodyError::Network(message) => ThumbnailError::Network(message),
            BodyError::TooLarge(limit) => ThumbnailError::TooLarge(limit),
        }
    }
}

/// Camera and barcode capture errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    #[error("Barcode recognition is not available")]
    RecognitionUnavailable,

    #[error("No camera available")]
    NoCamera,

    #[error("Scanner is already running")]
    AlreadyRunning,

    #[error("Could not start camera: {0}")]
    Acquisition(String),

    #[error("Camera has not produced a frame yet")]
    NoFrame,

    #[error("Camera stream stopped")]
    Stopped,

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Thumbnail download and decoding errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ThumbnailError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Image larger than {0} bytes")]
    TooLarge(usize),
}

/// Key/value preference storage errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("Could not determine a config directory")]
    NoConfigDir,

    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Corrupt storage file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Configuration loading errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
