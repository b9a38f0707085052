//! Integration tests for remote volume handling
//!
//! Remote levels enter through the audio pipe and must land on the mixer
//! through the loudness curve chosen for the output path.

use crate::test_utils::MemoryMixer;
use bt_speaker::audio::{AudioPipe, MAX_REMOTE_VOLUME};
use bt_speaker::volume::{VolumeCurve, VolumeMapper};
use std::error::Error;
use std::sync::Arc;

#[cfg(test)]
mod volume_integration_tests {
    use super::*;

    #[test]
    fn test_remote_levels_on_onboard_output() -> Result<(), Box<dyn Error>> {
        let (mixer, value) = MemoryMixer::new(Some((-10239, 400)), -2000);
        let mapper = Arc::new(VolumeMapper::new(Box::new(mixer), Box::new(|| true)));
        let pipe = AudioPipe::new("cat > /dev/null", Some(mapper.clone()))?;

        assert_eq!(mapper.curve(), VolumeCurve::Logarithmic);

        // Full remote volume is capped at unity gain.
        let applied = pipe.set_volume(MAX_REMOTE_VOLUME)?;
        assert_eq!(applied, Some(100.0));
        assert_eq!(*value.lock().unwrap(), 0);

        // Half the remote scale is roughly -10 dB.
        pipe.set_volume(64)?;
        let units = *value.lock().unwrap();
        assert!((-1000..=-980).contains(&units), "units = {}", units);

        pipe.set_volume(0)?;
        assert_eq!(*value.lock().unwrap(), -10239);
        assert_eq!(mapper.get_percent()?, 0.0);

        pipe.close()?;
        Ok(())
    }

    #[test]
    fn test_remote_levels_on_external_output() -> Result<(), Box<dyn Error>> {
        let (mixer, value) = MemoryMixer::new(Some((0, 255)), 0);
        let mapper = Arc::new(VolumeMapper::new(Box::new(mixer), Box::new(|| false)));
        let pipe = AudioPipe::new("cat > /dev/null", Some(mapper.clone()))?;

        assert_eq!(mapper.curve(), VolumeCurve::Linear);

        pipe.set_volume(MAX_REMOTE_VOLUME)?;
        assert_eq!(*value.lock().unwrap(), 255);

        // Out-of-range levels are treated as the maximum.
        pipe.set_volume(200)?;
        assert_eq!(*value.lock().unwrap(), 255);

        let after = mapper.increment_percent(-50.0)?;
        assert!((after - 50.0).abs() < 0.5);
        assert_eq!(*value.lock().unwrap(), 128);

        pipe.close()?;
        Ok(())
    }

    #[test]
    fn test_mixer_without_range_uses_fallback() -> Result<(), Box<dyn Error>> {
        let (mixer, _value) = MemoryMixer::new(None, 0);
        let mapper = VolumeMapper::new(Box::new(mixer), Box::new(|| true));

        let range = mapper.range()?;
        assert_eq!((range.min_units, range.max_units), (-10239, 400));
        assert!(!range.discovered);
        Ok(())
    }
}
