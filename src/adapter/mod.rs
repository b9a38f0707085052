//! Outbound commands to the local Bluetooth adapter

mod bluetoothctl;

pub use bluetoothctl::BluetoothCtl;

use async_trait::async_trait;
use std::error::Error;
use std::io;

/// Commands the daemon issues to the adapter.
#[async_trait]
pub trait AdapterControl: Send + Sync {
    /// Shows or hides the adapter to scanning devices.
    async fn set_discoverable(&self, discoverable: bool) -> Result<(), AdapterError>;

    /// Disconnects the device with the given hardware address
    /// (`AA:BB:CC:DD:EE:FF`) and waits for the command to finish.
    async fn disconnect_device(&self, address: &str) -> Result<(), AdapterError>;
}

/// Error types for adapter commands
#[derive(Debug)]
pub enum AdapterError {
    IoError(io::Error),
    CommandFailed(String),
    Timeout(String),
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::IoError(e) => write!(f, "I/O error: {}", e),
            AdapterError::CommandFailed(s) => write!(f, "Adapter command failed: {}", s),
            AdapterError::Timeout(s) => write!(f, "Adapter command timed out: {}", s),
        }
    }
}

impl Error for AdapterError {}

impl From<io::Error> for AdapterError {
    fn from(err: io::Error) -> Self {
        AdapterError::IoError(err)
    }
}
