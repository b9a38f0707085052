use crate::volume::control::MixerControl;
use crate::volume::error::VolumeError;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, instrument, warn};

const LOG_TARGET: &str = "bt_speaker::volume::mapper";

/// Range reported by the onboard headphone output:
/// `; type=INTEGER,access=rw---R--,values=1,min=-10239,max=400,step=0` (millibels).
pub const FALLBACK_MIN_UNITS: i64 = -10239;
pub const FALLBACK_MAX_UNITS: i64 = 400;

/// Hardware range of the volume control, discovered once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeRange {
    pub min_units: i64,
    pub max_units: i64,
    /// `false` when the hardware did not answer and the fallback is in use.
    pub discovered: bool,
}

impl VolumeRange {
    pub fn fallback() -> Self {
        VolumeRange {
            min_units: FALLBACK_MIN_UNITS,
            max_units: FALLBACK_MAX_UNITS,
            discovered: false,
        }
    }
}

/// Gain curve applied between loudness percent and hardware units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCurve {
    /// Units are millibels; capped at 0 dB to avoid clipping.
    Logarithmic,
    /// Units scale proportionally up to the hardware maximum.
    Linear,
}

/// Decides whether the onboard output path is in use.
pub trait OutputDetector: Send + Sync {
    fn is_onboard(&self) -> bool;
}

impl<F> OutputDetector for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_onboard(&self) -> bool {
        self()
    }
}

/// Detector answering from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredOutput {
    pub onboard: bool,
}

impl OutputDetector for ConfiguredOutput {
    fn is_onboard(&self) -> bool {
        self.onboard
    }
}

/// Highest unit value the curve may produce.
pub fn limited_max(range: &VolumeRange, curve: VolumeCurve) -> i64 {
    match curve {
        VolumeCurve::Logarithmic => 0,
        VolumeCurve::Linear => range.max_units,
    }
}

/// Converts raw hardware units to a loudness percentage in `[0, 100]`.
pub fn units_to_percent(units: i64, range: &VolumeRange, curve: VolumeCurve) -> f64 {
    let max = limited_max(range, curve);
    let units = units.max(range.min_units).min(max);
    if units <= range.min_units {
        return 0.0;
    }

    let pct = match curve {
        VolumeCurve::Logarithmic => {
            // Every -10 dB halves the perceived loudness.
            let db = units as f64 / 100.0;
            100.0 * 2f64.powf(db / 10.0)
        }
        VolumeCurve::Linear => {
            if max <= 0 {
                return 0.0;
            }
            100.0 * units as f64 / max as f64
        }
    };
    pct.clamp(0.0, 100.0)
}

/// Converts a loudness percentage to raw hardware units, rounded and
/// clamped to `[min, limited_max]`.
pub fn percent_to_units(pct: f64, range: &VolumeRange, curve: VolumeCurve) -> i64 {
    let pct = clamp_percent(pct);
    let max = limited_max(range, curve);

    let units = match curve {
        VolumeCurve::Logarithmic => {
            if pct <= 0.0 {
                range.min_units as f64
            } else {
                1000.0 * (pct / 100.0).log2()
            }
        }
        VolumeCurve::Linear => pct * max as f64 / 100.0,
    };

    let units = units.round() as i64;
    units.max(range.min_units).min(max.max(range.min_units))
}

fn clamp_percent(pct: f64) -> f64 {
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

/// Maps perceptual loudness percentages onto a hardware volume control.
///
/// The hardware range is queried on first use and cached for the lifetime
/// of the mapper. All reads and writes go through one lock, so
/// read-modify-write sequences such as [`VolumeMapper::increment_percent`]
/// never interleave with other volume changes.
pub struct VolumeMapper {
    control: Mutex<Box<dyn MixerControl>>,
    range: OnceLock<VolumeRange>,
    detector: Box<dyn OutputDetector>,
}

impl VolumeMapper {
    pub fn new(control: Box<dyn MixerControl>, detector: Box<dyn OutputDetector>) -> Self {
        VolumeMapper {
            control: Mutex::new(control),
            range: OnceLock::new(),
            detector,
        }
    }

    fn lock_control(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn MixerControl>>, VolumeError> {
        self.control
            .lock()
            .map_err(|e| VolumeError::InvalidState(format!("Mixer control mutex poisoned: {}", e)))
    }

    fn ensure_range(&self, control: &dyn MixerControl) -> VolumeRange {
        *self.range.get_or_init(|| match control.query_range() {
            Ok(Some((min, max))) => {
                info!(target: LOG_TARGET, "Discovered hardware volume range [{}, {}]", min, max);
                VolumeRange {
                    min_units: min,
                    max_units: max,
                    discovered: true,
                }
            }
            Ok(None) => {
                warn!(
                    target: LOG_TARGET,
                    "No volume range reported, using defaults [{}, {}]",
                    FALLBACK_MIN_UNITS, FALLBACK_MAX_UNITS
                );
                VolumeRange::fallback()
            }
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    "Volume range query failed ({}), using defaults [{}, {}]",
                    e, FALLBACK_MIN_UNITS, FALLBACK_MAX_UNITS
                );
                VolumeRange::fallback()
            }
        })
    }

    /// Cached hardware range, discovering it on first call.
    pub fn range(&self) -> Result<VolumeRange, VolumeError> {
        let control = self.lock_control()?;
        Ok(self.ensure_range(control.as_ref()))
    }

    /// Curve selected by the output detector.
    pub fn curve(&self) -> VolumeCurve {
        if self.detector.is_onboard() {
            VolumeCurve::Logarithmic
        } else {
            VolumeCurve::Linear
        }
    }

    fn read_percent(&self, control: &dyn MixerControl, curve: VolumeCurve) -> Result<f64, VolumeError> {
        let range = self.ensure_range(control);
        let units = control.read_value()?;
        Ok(units_to_percent(units, &range, curve))
    }

    fn write_percent(&self, control: &dyn MixerControl, pct: f64, curve: VolumeCurve) -> Result<f64, VolumeError> {
        let range = self.ensure_range(control);
        let pct = clamp_percent(pct);
        let units = percent_to_units(pct, &range, curve);
        debug!(target: LOG_TARGET, "Setting volume {:.2}% -> {} units ({:?})", pct, units, curve);
        control.write_value(units)?;
        Ok(pct)
    }

    /// Current loudness in `[0, 100]`.
    pub fn get_percent(&self) -> Result<f64, VolumeError> {
        let control = self.lock_control()?;
        self.read_percent(control.as_ref(), self.curve())
    }

    /// Sets the loudness, clamping the input to `[0, 100]`. Returns the
    /// percentage actually applied.
    #[instrument(skip(self))]
    pub fn set_percent(&self, pct: f64) -> Result<f64, VolumeError> {
        let control = self.lock_control()?;
        self.write_percent(control.as_ref(), pct, self.curve())
    }

    /// Adds `delta` to the current loudness and returns the new value.
    #[instrument(skip(self))]
    pub fn increment_percent(&self, delta: f64) -> Result<f64, VolumeError> {
        let control = self.lock_control()?;
        let curve = self.curve();
        let current = self.read_percent(control.as_ref(), curve)?;
        let target = clamp_percent(current + delta);
        self.write_percent(control.as_ref(), target, curve)
    }
}
