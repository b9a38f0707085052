use crate::volume::error::VolumeError;
use alsa::mixer::{Mixer, SelemChannelId, SelemId};
use tracing::{debug, instrument, trace};

const LOG_TARGET: &str = "bt_speaker::volume::control";

/// Blocking access to a single hardware volume control.
///
/// Values are raw hardware units; on the onboard output these are millibels.
pub trait MixerControl: Send {
    /// Reported `(min, max)` of the control, or `None` when the hardware
    /// does not expose a range.
    fn query_range(&self) -> Result<Option<(i64, i64)>, VolumeError>;

    /// Current raw value of the control.
    fn read_value(&self) -> Result<i64, VolumeError>;

    /// Writes a raw value to every channel of the control.
    fn write_value(&self, value: i64) -> Result<(), VolumeError>;
}

/// `MixerControl` backed by an ALSA simple mixer element.
///
/// The mixer is opened per call, so the handle never outlives a single
/// operation and the control stays `Send` without sharing ALSA state.
#[derive(Debug, Clone)]
pub struct AlsaMixerControl {
    card: String,
    control: String,
    index: u32,
}

impl AlsaMixerControl {
    pub fn new(card: &str, control: &str) -> Self {
        AlsaMixerControl {
            card: card.to_string(),
            control: control.to_string(),
            index: 0,
        }
    }

    /// Opens the mixer and runs `f` against the configured element.
    fn with_selem<T>(
        &self,
        f: impl FnOnce(&alsa::mixer::Selem<'_>) -> Result<T, VolumeError>,
    ) -> Result<T, VolumeError> {
        let mixer = Mixer::new(&self.card, false)?;
        let sid = SelemId::new(&self.control, self.index);
        let selem = mixer.find_selem(&sid).ok_or_else(|| {
            VolumeError::ControlNotFound(format!("{} on {}", self.control, self.card))
        })?;
        f(&selem)
    }
}

impl MixerControl for AlsaMixerControl {
    #[instrument(skip(self), fields(card = %self.card, control = %self.control))]
    fn query_range(&self) -> Result<Option<(i64, i64)>, VolumeError> {
        self.with_selem(|selem| {
            if !selem.has_playback_volume() {
                debug!(target: LOG_TARGET, "Control has no playback volume, no range reported.");
                return Ok(None);
            }
            let (min, max) = selem.get_playback_volume_range();
            debug!(target: LOG_TARGET, "Hardware reports volume range min={}, max={}", min, max);
            if min >= max {
                return Ok(None);
            }
            Ok(Some((min, max)))
        })
    }

    fn read_value(&self) -> Result<i64, VolumeError> {
        self.with_selem(|selem| {
            let value = selem.get_playback_volume(SelemChannelId::FrontLeft)?;
            trace!(target: LOG_TARGET, "Read raw volume {}", value);
            Ok(value)
        })
    }

    fn write_value(&self, value: i64) -> Result<(), VolumeError> {
        self.with_selem(|selem| {
            trace!(target: LOG_TARGET, "Writing raw volume {}", value);
            selem.set_playback_volume_all(value)?;
            Ok(())
        })
    }
}
