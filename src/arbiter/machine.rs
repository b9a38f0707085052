use super::device::{AllowedServiceSet, DeviceId};
use super::track::TrackSignature;
use crate::adapter::{AdapterControl, AdapterError};
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "bt_speaker::arbiter";

/// Upper bound on the disconnect command issued while evicting a device.
pub const DEFAULT_EVICTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on discoverability changes awaited by the dispatcher.
pub const ADAPTER_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Session lifecycle changes announced by the arbiter.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Connected(DeviceId),
    Disconnected(DeviceId),
    Track(TrackSignature),
}

/// Answer to a device asking to register for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Service not allowed; nothing changed.
    Rejected,
    /// Admitted. `newly_tracked` is set the first time a device is seen.
    Accepted { newly_tracked: bool },
    /// Admitted once the running eviction finishes.
    Deferred,
}

impl Registration {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Registration::Rejected)
    }
}

/// Result of the disconnect issued for an evicted device.
#[derive(Debug)]
pub struct EvictionReport {
    pub victim: DeviceId,
    pub outcome: Result<(), AdapterError>,
}

/// Observable state of the session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterPhase<'a> {
    Unowned,
    Owned(&'a DeviceId),
    Evicting(&'a DeviceId),
}

/// An eviction in flight plus everything held back until it completes.
#[derive(Debug)]
struct Eviction {
    victim: DeviceId,
    waiting: Vec<DeviceId>,
    deferred: VecDeque<(DeviceId, bool)>,
}

/// Single-slot admission control for the audio session.
///
/// At most one device owns the session. A device registering while another
/// owns it evicts the owner: the disconnect runs on a worker task and,
/// until its [`EvictionReport`] is handed back through
/// [`ConnectionArbiter::finish_eviction`], no new ownership transition is
/// accepted. Connection changes arriving meanwhile are replayed afterwards.
pub struct ConnectionArbiter {
    allowed: AllowedServiceSet,
    owner: Option<DeviceId>,
    tracked: HashSet<DeviceId>,
    last_track: Option<TrackSignature>,
    eviction: Option<Eviction>,
    discoverable_policy: bool,
    eviction_timeout: Duration,
    command_timeout: Duration,
    adapter: Arc<dyn AdapterControl>,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    eviction_tx: mpsc::UnboundedSender<EvictionReport>,
}

impl ConnectionArbiter {
    /// `discoverable_policy` mirrors `bluez.discoverable`: when false the
    /// arbiter never touches discoverability.
    pub fn new(
        adapter: Arc<dyn AdapterControl>,
        discoverable_policy: bool,
        events_tx: mpsc::UnboundedSender<LifecycleEvent>,
        eviction_tx: mpsc::UnboundedSender<EvictionReport>,
    ) -> Self {
        ConnectionArbiter {
            allowed: AllowedServiceSet::audio_sink(),
            owner: None,
            tracked: HashSet::new(),
            last_track: None,
            eviction: None,
            discoverable_policy,
            eviction_timeout: DEFAULT_EVICTION_TIMEOUT,
            command_timeout: ADAPTER_COMMAND_TIMEOUT,
            adapter,
            events_tx,
            eviction_tx,
        }
    }

    pub fn with_eviction_timeout(mut self, timeout: Duration) -> Self {
        self.eviction_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn owner(&self) -> Option<&DeviceId> {
        self.owner.as_ref()
    }

    pub fn phase(&self) -> ArbiterPhase<'_> {
        match (&self.eviction, &self.owner) {
            (Some(eviction), _) => ArbiterPhase::Evicting(&eviction.victim),
            (None, Some(owner)) => ArbiterPhase::Owned(owner),
            (None, None) => ArbiterPhase::Unowned,
        }
    }

    pub fn is_evicting(&self) -> bool {
        self.eviction.is_some()
    }

    pub fn is_tracked(&self, device: &DeviceId) -> bool {
        self.tracked.contains(device)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    fn emit(&self, event: LifecycleEvent) {
        trace!(target: LOG_TARGET, "Emitting lifecycle event: {:?}", event);
        if self.events_tx.send(event).is_err() {
            debug!(target: LOG_TARGET, "No listener for lifecycle events.");
        }
    }

    fn track_device(&mut self, device: DeviceId) -> bool {
        let newly_tracked = self.tracked.insert(device.clone());
        if newly_tracked {
            debug!(target: LOG_TARGET, device = %device, "Tracking connection state of new device.");
        }
        newly_tracked
    }

    /// Handles a device authorizing for `service`.
    #[instrument(skip(self, device), fields(device = %device))]
    pub fn register_device(&mut self, device: DeviceId, service: &str) -> Registration {
        if !self.allowed.allows(service) {
            debug!(target: LOG_TARGET, "Rejecting service {}", service);
            return Registration::Rejected;
        }

        if let Some(eviction) = self.eviction.as_mut() {
            info!(target: LOG_TARGET, victim = %eviction.victim, "Eviction in progress, deferring registration.");
            if !eviction.waiting.contains(&device) {
                eviction.waiting.push(device);
            }
            return Registration::Deferred;
        }

        match self.owner.clone() {
            Some(current) if current != device => {
                info!(
                    target: LOG_TARGET,
                    "Device disconnected because a new one is connecting: old device={}, new device={}, uuid={}",
                    current, device, service
                );
                self.start_eviction(current, device);
                Registration::Deferred
            }
            _ => Registration::Accepted {
                newly_tracked: self.track_device(device),
            },
        }
    }

    fn start_eviction(&mut self, victim: DeviceId, admitted: DeviceId) {
        let address = victim.hardware_address();
        let adapter = Arc::clone(&self.adapter);
        let reports = self.eviction_tx.clone();
        let limit = self.eviction_timeout;
        let task_victim = victim.clone();

        tokio::spawn(async move {
            let outcome = match address {
                Some(address) => {
                    match tokio::time::timeout(limit, adapter.disconnect_device(&address)).await {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::Timeout(format!(
                            "disconnect {} after {:?}",
                            address, limit
                        ))),
                    }
                }
                None => Err(AdapterError::CommandFailed(format!(
                    "no hardware address in {}",
                    task_victim
                ))),
            };
            if reports
                .send(EvictionReport {
                    victim: task_victim,
                    outcome,
                })
                .is_err()
            {
                warn!(target: LOG_TARGET, "Eviction finished but nobody is listening for the report.");
            }
        });

        self.eviction = Some(Eviction {
            victim,
            waiting: vec![admitted],
            deferred: VecDeque::new(),
        });
    }

    /// Completes an eviction started by [`Self::register_device`].
    ///
    /// The victim is released whether or not its disconnect succeeded.
    /// Returns the devices whose registrations were held back and are now
    /// admitted, in arrival order.
    #[instrument(skip(self, report), fields(victim = %report.victim))]
    pub async fn finish_eviction(&mut self, report: EvictionReport) -> Vec<DeviceId> {
        let eviction = match self.eviction.take() {
            Some(eviction) if eviction.victim == report.victim => eviction,
            other => {
                warn!(target: LOG_TARGET, "Ignoring eviction report that matches no running eviction.");
                self.eviction = other;
                return Vec::new();
            }
        };

        match &report.outcome {
            Ok(()) => info!(target: LOG_TARGET, "Evicted device disconnected."),
            Err(e) => error!(target: LOG_TARGET, "Disconnect of evicted device failed, releasing it anyway: {}", e),
        }

        if self.owner.as_ref() == Some(&eviction.victim) {
            self.owner = None;
        }
        self.update_discoverable().await;
        self.emit(LifecycleEvent::Disconnected(eviction.victim));

        let mut admitted = Vec::with_capacity(eviction.waiting.len());
        for device in eviction.waiting {
            self.track_device(device.clone());
            admitted.push(device);
        }

        for (device, connected) in eviction.deferred {
            self.apply_connection_change(&device, connected).await;
        }

        admitted
    }

    /// Handles a change of a device's `Connected` property.
    pub async fn on_connection_property_changed(&mut self, device: &DeviceId, connected: bool) {
        if let Some(eviction) = self.eviction.as_mut() {
            if self.tracked.contains(device) || eviction.waiting.contains(device) {
                debug!(target: LOG_TARGET, device = %device, connected, "Eviction in progress, deferring connection change.");
                eviction.deferred.push_back((device.clone(), connected));
            }
            return;
        }
        if !self.tracked.contains(device) {
            trace!(target: LOG_TARGET, device = %device, "Ignoring connection change of untracked device.");
            return;
        }
        self.apply_connection_change(device, connected).await;
    }

    async fn apply_connection_change(&mut self, device: &DeviceId, connected: bool) {
        let is_owner = self.owner.as_ref() == Some(device);

        if self.owner.is_none() && connected {
            info!(target: LOG_TARGET, "Device connected. device={}", device);
            self.owner = Some(device.clone());
            self.update_discoverable().await;
            self.emit(LifecycleEvent::Connected(device.clone()));
        } else if is_owner && !connected {
            info!(target: LOG_TARGET, "Device disconnected. device={}", device);
            self.owner = None;
            self.update_discoverable().await;
            self.emit(LifecycleEvent::Disconnected(device.clone()));
        } else {
            trace!(target: LOG_TARGET, device = %device, connected, "Connection change does not affect ownership.");
        }
    }

    /// Handles new track metadata. Returns whether a track event was fired.
    pub fn on_track_changed(&mut self, device: &DeviceId, metadata: &Map<String, Value>) -> bool {
        if self.eviction.is_some() || self.owner.as_ref() != Some(device) {
            trace!(target: LOG_TARGET, device = %device, "Ignoring track change from non-owner.");
            return false;
        }

        let signature = TrackSignature::from_metadata(metadata);
        if self.last_track.as_ref() == Some(&signature) {
            debug!(target: LOG_TARGET, "Duplicate track notification suppressed.");
            return false;
        }

        self.last_track = Some(signature.clone());
        self.emit(LifecycleEvent::Track(signature));
        true
    }

    /// Applies the discoverability policy: while enabled the adapter stays
    /// visible, connected or not.
    pub async fn update_discoverable(&self) {
        if !self.discoverable_policy {
            return;
        }

        if self.owner.is_some() {
            // Keep it discoverable so another device can take over.
            return;
        }

        info!(target: LOG_TARGET, "Showing adapter to all devices.");
        match tokio::time::timeout(self.command_timeout, self.adapter.set_discoverable(true)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(target: LOG_TARGET, "Failed to make adapter discoverable: {}", e),
            Err(_) => warn!(
                target: LOG_TARGET,
                "Making adapter discoverable timed out after {:?}, continuing.",
                self.command_timeout
            ),
        }
    }
}
