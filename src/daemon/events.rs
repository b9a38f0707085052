use crate::arbiter::DeviceId;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

/// Notifications and requests delivered by the transport, processed one at
/// a time by the dispatcher.
#[derive(Debug)]
pub enum BusEvent {
    /// A device asks to use a service; answered with whether it is admitted.
    Authorize {
        device: DeviceId,
        uuid: String,
        reply: oneshot::Sender<bool>,
    },
    /// Pairing agent asks for the PIN to offer.
    RequestPinCode {
        device: DeviceId,
        reply: oneshot::Sender<String>,
    },
    ConnectionChanged {
        device: DeviceId,
        connected: bool,
    },
    TrackChanged {
        device: DeviceId,
        metadata: Map<String, Value>,
    },
    /// Remote volume level, `0..=127`.
    VolumeChanged {
        level: u8,
    },
    Shutdown,
}
