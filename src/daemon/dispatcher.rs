use super::events::BusEvent;
use crate::arbiter::{ConnectionArbiter, DeviceId, EvictionReport, Registration};
use crate::audio::AudioPipe;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

const LOG_TARGET: &str = "bt_speaker::daemon::dispatcher";

/// Serializes every bus event through the arbiter.
///
/// Only this task touches the arbiter, so no two events are ever handled
/// concurrently.
pub struct EventDispatcher {
    arbiter: ConnectionArbiter,
    inbox: mpsc::Receiver<BusEvent>,
    evictions: mpsc::UnboundedReceiver<EvictionReport>,
    audio: Arc<AudioPipe>,
    pin_code: String,
    pending_replies: HashMap<DeviceId, Vec<oneshot::Sender<bool>>>,
}

impl EventDispatcher {
    pub fn new(
        arbiter: ConnectionArbiter,
        inbox: mpsc::Receiver<BusEvent>,
        evictions: mpsc::UnboundedReceiver<EvictionReport>,
        audio: Arc<AudioPipe>,
        pin_code: String,
    ) -> Self {
        EventDispatcher {
            arbiter,
            inbox,
            evictions,
            audio,
            pin_code,
            pending_replies: HashMap::new(),
        }
    }

    /// Runs until `Shutdown` arrives or every bus sender is dropped.
    pub async fn run(mut self) {
        info!(target: LOG_TARGET, "Dispatcher started.");

        loop {
            tokio::select! {
                biased;

                Some(report) = self.evictions.recv() => {
                    self.handle_eviction_report(report).await;
                }

                event = self.inbox.recv() => {
                    match event {
                        Some(BusEvent::Shutdown) => {
                            info!(target: LOG_TARGET, "Shutdown received. Exiting dispatcher.");
                            break;
                        }
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!(target: LOG_TARGET, "Bus closed. Exiting dispatcher.");
                            break;
                        }
                    }
                }
            }
        }

        if !self.pending_replies.is_empty() {
            warn!(
                target: LOG_TARGET,
                "Dropping {} pending authorization(s) on exit.",
                self.pending_replies.len()
            );
        }
    }

    async fn handle_event(&mut self, event: BusEvent) {
        trace!(target: LOG_TARGET, "Handling bus event: {:?}", event);
        match event {
            BusEvent::Authorize { device, uuid, reply } => {
                match self.arbiter.register_device(device.clone(), &uuid) {
                    Registration::Deferred => {
                        debug!(target: LOG_TARGET, device = %device, "Authorization held until eviction completes.");
                        self.pending_replies.entry(device).or_default().push(reply);
                    }
                    registration => {
                        let _ = reply.send(registration.is_accepted());
                    }
                }
            }
            BusEvent::RequestPinCode { device, reply } => {
                info!(target: LOG_TARGET, device = %device, "Pairing request, offering configured PIN.");
                let _ = reply.send(self.pin_code.clone());
            }
            BusEvent::ConnectionChanged { device, connected } => {
                self.arbiter
                    .on_connection_property_changed(&device, connected)
                    .await;
            }
            BusEvent::TrackChanged { device, metadata } => {
                self.arbiter.on_track_changed(&device, &metadata);
            }
            BusEvent::VolumeChanged { level } => self.apply_volume(level).await,
            BusEvent::Shutdown => {}
        }
    }

    async fn handle_eviction_report(&mut self, report: EvictionReport) {
        let admitted = self.arbiter.finish_eviction(report).await;
        for device in admitted {
            if let Some(replies) = self.pending_replies.remove(&device) {
                debug!(target: LOG_TARGET, device = %device, "Answering {} deferred authorization(s).", replies.len());
                for reply in replies {
                    let _ = reply.send(true);
                }
            }
        }
    }

    // Mixer calls block; awaited in place so volume changes apply in order.
    async fn apply_volume(&self, level: u8) {
        let audio = Arc::clone(&self.audio);
        match tokio::task::spawn_blocking(move || audio.set_volume(level)).await {
            Ok(Ok(Some(applied))) => debug!(target: LOG_TARGET, "Mixer set to {:.1}%", applied),
            Ok(Ok(None)) => trace!(target: LOG_TARGET, "Volume integration disabled, ignoring level {}", level),
            Ok(Err(e)) => error!(target: LOG_TARGET, "Failed to apply volume: {}", e),
            Err(e) => error!(target: LOG_TARGET, "Volume task panicked: {}", e),
        }
    }
}
