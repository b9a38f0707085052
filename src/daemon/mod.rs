//! Daemon wiring: event dispatch, lifecycle driving and local ingress

mod dispatcher;
mod events;
pub mod ingress;
mod lifecycle;

pub use dispatcher::EventDispatcher;
pub use events::BusEvent;
pub use lifecycle::LifecycleDriver;

use crate::adapter::{AdapterControl, BluetoothCtl};
use crate::arbiter::{ConnectionArbiter, ADAPTER_COMMAND_TIMEOUT};
use crate::audio::{AudioPipe, PipeError};
use crate::config::Settings;
use crate::hooks::HookRunner;
use crate::volume::{AlsaMixerControl, ConfiguredOutput, VolumeMapper};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "bt_speaker::daemon";

/// Capacity of the bus inbox.
const BUS_CAPACITY: usize = 64;

/// Error types for daemon startup and shutdown
#[derive(Debug)]
pub enum DaemonError {
    PipeError(PipeError),
    TaskError(String),
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonError::PipeError(e) => write!(f, "Audio pipe error: {}", e),
            DaemonError::TaskError(s) => write!(f, "Task error: {}", s),
        }
    }
}

impl Error for DaemonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DaemonError::PipeError(e) => Some(e),
            DaemonError::TaskError(_) => None,
        }
    }
}

impl From<PipeError> for DaemonError {
    fn from(err: PipeError) -> Self {
        DaemonError::PipeError(err)
    }
}

/// Entry points for starting the daemon.
pub struct Daemon;

impl Daemon {
    /// Starts the daemon against the real adapter and mixer.
    pub async fn start(settings: &Settings) -> Result<DaemonHandle, DaemonError> {
        let volume = if settings.alsa.enabled {
            let control = AlsaMixerControl::new(&settings.alsa.card, &settings.alsa.control);
            let detector = ConfiguredOutput {
                onboard: settings.alsa.onboard_output,
            };
            Some(Arc::new(VolumeMapper::new(Box::new(control), Box::new(detector))))
        } else {
            info!(target: LOG_TARGET, "ALSA volume integration disabled.");
            None
        };
        let adapter = Arc::new(BluetoothCtl::new(&settings.bluez.device_path));
        Self::start_with(settings, adapter, volume, None).await
    }

    /// Starts the daemon with injected collaborators. `adapter_timeout`
    /// overrides the default bounds on adapter commands (evicting
    /// disconnects and discoverability changes).
    pub async fn start_with(
        settings: &Settings,
        adapter: Arc<dyn AdapterControl>,
        volume: Option<Arc<VolumeMapper>>,
        adapter_timeout: Option<Duration>,
    ) -> Result<DaemonHandle, DaemonError> {
        let play_command = settings.bt_speaker.play_command.clone();
        let audio = tokio::task::spawn_blocking(move || AudioPipe::new(&play_command, volume))
            .await
            .map_err(|e| DaemonError::TaskError(format!("audio pipe setup panicked: {}", e)))??;
        let audio = Arc::new(audio);

        let (bus_tx, bus_rx) = mpsc::channel(BUS_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (eviction_tx, eviction_rx) = mpsc::unbounded_channel();

        let discoverable = settings.bluez.discoverable;
        let mut arbiter = ConnectionArbiter::new(Arc::clone(&adapter), discoverable, events_tx, eviction_tx);
        if let Some(timeout) = adapter_timeout {
            arbiter = arbiter
                .with_eviction_timeout(timeout)
                .with_command_timeout(timeout);
        }

        if discoverable {
            arbiter.update_discoverable().await;
        } else {
            let limit = adapter_timeout.unwrap_or(ADAPTER_COMMAND_TIMEOUT);
            match tokio::time::timeout(limit, adapter.set_discoverable(false)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(target: LOG_TARGET, "Failed to hide adapter: {}", e),
                Err(_) => warn!(target: LOG_TARGET, "Hiding adapter timed out, continuing."),
            }
        }

        let hooks = HookRunner::new(&settings.bt_speaker);
        let driver = LifecycleDriver::new(events_rx, Arc::clone(&audio), hooks.clone());
        let dispatcher = EventDispatcher::new(
            arbiter,
            bus_rx,
            eviction_rx,
            Arc::clone(&audio),
            settings.bluez.effective_pin_code().to_string(),
        );

        let driver_task = tokio::spawn(driver.run());
        let dispatcher_task = tokio::spawn(dispatcher.run());
        hooks.startup();

        info!(target: LOG_TARGET, "Daemon started.");
        Ok(DaemonHandle {
            bus: bus_tx,
            audio,
            dispatcher: dispatcher_task,
            driver: driver_task,
        })
    }
}

/// Running daemon: the bus to feed events into and the shared audio pipe.
pub struct DaemonHandle {
    bus: mpsc::Sender<BusEvent>,
    audio: Arc<AudioPipe>,
    dispatcher: JoinHandle<()>,
    driver: JoinHandle<()>,
}

impl DaemonHandle {
    pub fn bus(&self) -> mpsc::Sender<BusEvent> {
        self.bus.clone()
    }

    pub fn audio(&self) -> Arc<AudioPipe> {
        Arc::clone(&self.audio)
    }

    /// Stops the dispatcher, lets the lifecycle driver drain and closes the
    /// audio pipe.
    pub async fn shutdown(self) -> Result<(), DaemonError> {
        debug!(target: LOG_TARGET, "Stopping daemon.");
        if self.bus.send(BusEvent::Shutdown).await.is_err() {
            debug!(target: LOG_TARGET, "Dispatcher already gone.");
        }
        self.dispatcher
            .await
            .map_err(|e| DaemonError::TaskError(format!("dispatcher: {}", e)))?;
        self.driver
            .await
            .map_err(|e| DaemonError::TaskError(format!("lifecycle driver: {}", e)))?;

        let audio = self.audio;
        tokio::task::spawn_blocking(move || audio.close())
            .await
            .map_err(|e| DaemonError::TaskError(format!("pipe close: {}", e)))??;
        info!(target: LOG_TARGET, "Daemon stopped.");
        Ok(())
    }
}
