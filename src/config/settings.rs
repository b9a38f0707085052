//! Daemon settings and configuration file handling

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// PIN handed out to pairing devices when none is configured.
pub const DEFAULT_PIN_CODE: &str = "0000";

/// Daemon settings, one section per concern
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Playback pipeline and lifecycle hooks
    #[serde(default)]
    pub bt_speaker: SpeakerSettings,
    /// Hardware volume integration
    #[serde(default)]
    pub alsa: AlsaSettings,
    /// Adapter and pairing behaviour
    #[serde(default)]
    pub bluez: BluezSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeakerSettings {
    /// Shell command whose stdin receives the decoded audio frames
    #[serde(default = "default_play_command")]
    pub play_command: String,
    #[serde(default)]
    pub startup_command: String,
    #[serde(default)]
    pub connect_command: String,
    #[serde(default)]
    pub disconnect_command: String,
    /// Receives the track metadata as environment variables
    #[serde(default)]
    pub track_command: String,
    /// Unix socket the transport bridge delivers its notifications on
    #[serde(default = "default_control_socket")]
    pub control_socket: PathBuf,
    /// Optional FIFO carrying raw decoded frames
    #[serde(default)]
    pub frame_fifo: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlsaSettings {
    /// Gates every volume operation
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Mixer card, e.g. `hw:0`
    #[serde(default = "default_alsa_card")]
    pub card: String,
    /// Simple mixer element driven for volume changes
    #[serde(default = "default_alsa_control")]
    pub control: String,
    /// Treat the output as the onboard path (logarithmic curve, capped at 0 dB)
    #[serde(default = "default_true")]
    pub onboard_output: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BluezSettings {
    /// Pairing PIN; an empty value means [`DEFAULT_PIN_CODE`]
    #[serde(default)]
    pub pin_code: String,
    /// Adapter object path
    #[serde(default = "default_device_path")]
    pub device_path: String,
    #[serde(default = "default_true")]
    pub discoverable: bool,
}

fn default_play_command() -> String {
    "aplay -f cd -".to_string()
}

fn default_control_socket() -> PathBuf {
    PathBuf::from("/run/bt_speaker/events.sock")
}

fn default_alsa_card() -> String {
    "hw:0".to_string()
}

fn default_alsa_control() -> String {
    "PCM".to_string()
}

fn default_device_path() -> String {
    "/org/bluez/hci0".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SpeakerSettings {
    fn default() -> Self {
        SpeakerSettings {
            play_command: default_play_command(),
            startup_command: String::new(),
            connect_command: String::new(),
            disconnect_command: String::new(),
            track_command: String::new(),
            control_socket: default_control_socket(),
            frame_fifo: None,
        }
    }
}

impl Default for AlsaSettings {
    fn default() -> Self {
        AlsaSettings {
            enabled: true,
            card: default_alsa_card(),
            control: default_alsa_control(),
            onboard_output: true,
        }
    }
}

impl Default for BluezSettings {
    fn default() -> Self {
        BluezSettings {
            pin_code: String::new(),
            device_path: default_device_path(),
            discoverable: true,
        }
    }
}

impl BluezSettings {
    /// PIN offered to pairing devices, falling back to [`DEFAULT_PIN_CODE`].
    pub fn effective_pin_code(&self) -> &str {
        if self.pin_code.trim().is_empty() {
            DEFAULT_PIN_CODE
        } else {
            &self.pin_code
        }
    }
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Settings {
    /// Load settings from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// System-wide config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/bt_speaker/config.json")
    }

    /// Locations searched when no path is given on the command line, most
    /// specific first: the per-user config dir, then the system-wide file.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("bt_speaker").join("config.json"));
        }
        paths.push(Self::default_path());
        paths
    }

    /// First existing candidate, or the system-wide path when none exists.
    pub fn discover_path() -> PathBuf {
        Self::candidate_paths()
            .into_iter()
            .find(|p| p.exists())
            .unwrap_or_else(Self::default_path)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bt_speaker.play_command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "play_command cannot be empty".to_string(),
            ));
        }

        if !self.bluez.device_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "device_path must be an object path, got '{}'",
                self.bluez.device_path
            )));
        }

        if self.alsa.enabled && self.alsa.control.is_empty() {
            return Err(ConfigError::ValidationError(
                "alsa.control cannot be empty while volume control is enabled".to_string(),
            ));
        }

        Ok(())
    }
}
