use crate::arbiter::LifecycleEvent;
use crate::audio::AudioPipe;
use crate::hooks::HookRunner;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, trace};

const LOG_TARGET: &str = "bt_speaker::daemon::lifecycle";

/// Turns arbiter lifecycle events into hook runs and pipe teardown.
pub struct LifecycleDriver {
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
    audio: Arc<AudioPipe>,
    hooks: HookRunner,
}

impl LifecycleDriver {
    pub fn new(
        events: mpsc::UnboundedReceiver<LifecycleEvent>,
        audio: Arc<AudioPipe>,
        hooks: HookRunner,
    ) -> Self {
        LifecycleDriver { events, audio, hooks }
    }

    /// Runs until the arbiter side of the channel is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            trace!(target: LOG_TARGET, "Lifecycle event: {:?}", event);
            match event {
                LifecycleEvent::Connected(device) => {
                    info!(target: LOG_TARGET, device = %device, "Session started.");
                    self.hooks.connect();
                }
                LifecycleEvent::Disconnected(device) => {
                    info!(target: LOG_TARGET, device = %device, "Session ended, closing audio pipe.");
                    let audio = Arc::clone(&self.audio);
                    match tokio::task::spawn_blocking(move || audio.close()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!(target: LOG_TARGET, "Failed to close audio pipe: {}", e),
                        Err(e) => error!(target: LOG_TARGET, "Pipe close task panicked: {}", e),
                    }
                    self.hooks.disconnect();
                }
                LifecycleEvent::Track(track) => {
                    self.hooks.track(&track);
                }
            }
        }
        info!(target: LOG_TARGET, "Lifecycle driver stopped.");
    }
}
