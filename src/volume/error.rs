use std::error::Error;

/// Error types for hardware volume control.
#[derive(Debug)]
pub enum VolumeError {
    AlsaError(String),
    ControlNotFound(String),
    InvalidState(String),
}

impl std::fmt::Display for VolumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeError::AlsaError(e) => write!(f, "ALSA error: {}", e),
            VolumeError::ControlNotFound(name) => write!(f, "Mixer control not found: {}", name),
            VolumeError::InvalidState(s) => write!(f, "Invalid state: {}", s),
        }
    }
}

impl Error for VolumeError {}

impl From<alsa::Error> for VolumeError {
    fn from(e: alsa::Error) -> Self {
        VolumeError::AlsaError(e.to_string())
    }
}
