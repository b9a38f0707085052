//! Integration tests for configuration management
//!
//! These tests verify that configuration files written by hand are picked up
//! by the daemon's settings and feed the components that consume them.

use bt_speaker::config::Settings;
use bt_speaker::hooks::HookRunner;
use std::error::Error;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Hand-written config with only some keys set
    #[test]
    fn test_hand_written_config() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{
                "bt_speaker": { "play_command": "aplay -D plughw:1 -f cd -", "track_command": "logger track" },
                "alsa": { "card": "hw:1", "onboard_output": false },
                "bluez": { "pin_code": "4321", "discoverable": false }
            }"#,
        )?;

        let settings = Settings::load(&config_path)?;
        settings.validate()?;

        assert_eq!(settings.bt_speaker.play_command, "aplay -D plughw:1 -f cd -");
        assert_eq!(settings.bt_speaker.track_command, "logger track");
        assert!(settings.bt_speaker.connect_command.is_empty());
        assert_eq!(settings.alsa.card, "hw:1");
        assert_eq!(settings.alsa.control, "PCM");
        assert!(!settings.alsa.onboard_output);
        assert!(settings.alsa.enabled);
        assert_eq!(settings.bluez.effective_pin_code(), "4321");
        assert!(!settings.bluez.discoverable);
        assert_eq!(settings.bluez.device_path, "/org/bluez/hci0");

        // Hooks built from the loaded section
        let hooks = HookRunner::new(&settings.bt_speaker);
        assert!(format!("{:?}", hooks).contains("logger track"));

        Ok(())
    }

    /// Saved settings load back unchanged
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.bt_speaker.disconnect_command = "systemctl --user stop visualizer".to_string();
        settings.bluez.pin_code = "1111".to_string();
        settings.validate()?;
        settings.save(&config_path)?;

        let mut loaded = Settings::load(&config_path)?;
        assert_eq!(loaded.bt_speaker.disconnect_command, "systemctl --user stop visualizer");
        assert_eq!(loaded.bluez.effective_pin_code(), "1111");

        loaded.bluez.pin_code.clear();
        loaded.save(&config_path)?;
        let reloaded = Settings::load(&config_path)?;
        assert_eq!(reloaded.bluez.effective_pin_code(), "0000");

        Ok(())
    }

    /// Invalid configuration is rejected before the daemon starts
    #[test]
    fn test_invalid_config_validation() {
        let mut settings = Settings::default();
        settings.bt_speaker.play_command = "   ".to_string();
        let result = settings.validate();
        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("play_command cannot be empty"));
        }

        let mut settings = Settings::default();
        settings.bluez.device_path = "hci0".to_string();
        assert!(settings.validate().is_err());
    }
}
