use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a remote device: its bus object path,
/// e.g. `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(path: impl Into<String>) -> Self {
        DeviceId(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hardware address encoded in the object path (`dev_AA_BB_..` ->
    /// `AA:BB:..`), or `None` if the path has no device segment.
    pub fn hardware_address(&self) -> Option<String> {
        let (_, rest) = self.0.split_once("/dev_")?;
        let segment = rest.split('/').next().unwrap_or_default();
        if segment.is_empty() {
            return None;
        }
        Some(segment.replace('_', ":"))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(path: &str) -> Self {
        DeviceId::new(path)
    }
}

/// Bluetooth base UUID `00000000-0000-1000-8000-00805F9B34FB`.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// A 128-bit service class identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceUuid(Uuid);

impl ServiceUuid {
    /// Expands a 16- or 32-bit assigned number onto the base UUID.
    pub const fn from_short(short: u32) -> Self {
        ServiceUuid(Uuid::from_u128(((short as u128) << 96) | BASE_UUID))
    }

    /// Parses the full textual form or a hex short form (`110d`, `0000110d`).
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let hex = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);
        if !hex.is_empty() && hex.len() <= 8 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return u32::from_str_radix(hex, 16).ok().map(Self::from_short);
        }
        Uuid::parse_str(input).ok().map(ServiceUuid)
    }
}

impl fmt::Display for ServiceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Advanced Audio Distribution Profile.
pub const ADVANCED_AUDIO_DISTRIBUTION: ServiceUuid = ServiceUuid::from_short(0x110d);
/// Audio/Video Remote Control Profile.
pub const AV_REMOTE_CONTROL: ServiceUuid = ServiceUuid::from_short(0x110e);

/// The services a device may authorize for.
#[derive(Debug, Clone)]
pub struct AllowedServiceSet {
    services: [ServiceUuid; 2],
}

impl AllowedServiceSet {
    pub fn audio_sink() -> Self {
        AllowedServiceSet {
            services: [ADVANCED_AUDIO_DISTRIBUTION, AV_REMOTE_CONTROL],
        }
    }

    pub fn contains(&self, service: &ServiceUuid) -> bool {
        self.services.contains(service)
    }

    /// Parses `service` and checks membership; unparseable input is never allowed.
    pub fn allows(&self, service: &str) -> bool {
        ServiceUuid::parse(service).map_or(false, |s| self.contains(&s))
    }
}

impl Default for AllowedServiceSet {
    fn default() -> Self {
        Self::audio_sink()
    }
}
