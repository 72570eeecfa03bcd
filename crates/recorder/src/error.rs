//! Recorder error types

use std::path::PathBuf;

use thiserror::Error;

/// Recorder-specific errors
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Filesystem error with the path it happened on
    #[error("io error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PNG/GIF encoding error
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Radar CSV error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Image buffer does not match its declared size
    #[error("malformed image: {width}x{height} with {len} bytes")]
    MalformedImage { width: u32, height: u32, len: usize },

    /// Writer creation error
    #[error("failed to create writer for sensor '{sensor_id}': {message}")]
    WriterCreation { sensor_id: String, message: String },
}

impl RecorderError {
    /// Attach a path to an io error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a writer creation error
    pub fn writer_creation(sensor_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriterCreation {
            sensor_id: sensor_id.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, RecorderError>;
