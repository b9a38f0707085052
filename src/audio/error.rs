use crate::volume::VolumeError;
use std::error::Error;
use std::io;

/// Error types specific to the audio pipe.
#[derive(Debug)]
pub enum PipeError {
    SpawnError(String),
    WriteFailed(String),
    VolumeError(VolumeError),
    IoError(io::Error),
    InvalidState(String),
}

impl std::fmt::Display for PipeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipeError::SpawnError(e) => write!(f, "Failed to start play command: {}", e),
            PipeError::WriteFailed(e) => write!(f, "Write to play command failed after restart: {}", e),
            PipeError::VolumeError(e) => write!(f, "Volume error: {}", e),
            PipeError::IoError(e) => write!(f, "I/O error: {}", e),
            PipeError::InvalidState(s) => write!(f, "Invalid state: {}", s),
        }
    }
}

impl Error for PipeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipeError::VolumeError(e) => Some(e),
            PipeError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

// --- From Implementations for PipeError ---

impl From<VolumeError> for PipeError {
    fn from(e: VolumeError) -> Self {
        PipeError::VolumeError(e)
    }
}

impl From<io::Error> for PipeError {
    fn from(e: io::Error) -> Self {
        PipeError::IoError(e)
    }
}
