//! User-configured lifecycle hooks (startup/connect/disconnect/track)

use crate::arbiter::TrackSignature;
use crate::config::SpeakerSettings;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "bt_speaker::hooks";

/// Runs the configured shell hooks as fire-and-forget tasks.
///
/// Exit status is only logged; a failing hook never reaches the caller.
#[derive(Debug, Clone, Default)]
pub struct HookRunner {
    startup_command: String,
    connect_command: String,
    disconnect_command: String,
    track_command: String,
}

impl HookRunner {
    pub fn new(settings: &SpeakerSettings) -> Self {
        HookRunner {
            startup_command: settings.startup_command.clone(),
            connect_command: settings.connect_command.clone(),
            disconnect_command: settings.disconnect_command.clone(),
            track_command: settings.track_command.clone(),
        }
    }

    pub fn startup(&self) -> Option<JoinHandle<()>> {
        spawn_hook("startup", &self.startup_command, None)
    }

    pub fn connect(&self) -> Option<JoinHandle<()>> {
        spawn_hook("connect", &self.connect_command, None)
    }

    pub fn disconnect(&self) -> Option<JoinHandle<()>> {
        spawn_hook("disconnect", &self.disconnect_command, None)
    }

    /// Runs the track hook with only the track fields in its environment.
    pub fn track(&self, track: &TrackSignature) -> Option<JoinHandle<()>> {
        let env = track
            .fields()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        spawn_hook("track", &self.track_command, Some(env))
    }
}

fn spawn_hook(
    name: &'static str,
    command: &str,
    env: Option<Vec<(String, String)>>,
) -> Option<JoinHandle<()>> {
    if command.trim().is_empty() {
        return None;
    }

    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(command);
    if let Some(vars) = env {
        cmd.env_clear().envs(vars);
    }

    let command = command.to_string();
    debug!(target: LOG_TARGET, hook = name, "Spawning hook: {}", command);
    Some(tokio::spawn(async move {
        match cmd.status().await {
            Ok(status) if status.success() => {
                info!(target: LOG_TARGET, hook = name, "Hook finished.");
            }
            Ok(status) => {
                warn!(target: LOG_TARGET, hook = name, "Hook '{}' exited with {}", command, status);
            }
            Err(e) => {
                warn!(target: LOG_TARGET, hook = name, "Failed to run hook '{}': {}", command, e);
            }
        }
    }))
}
