//! Tests for the command-line interface

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::Settings;
    use clap::{CommandFactory, Parser};
    use std::path::PathBuf;

    #[test]
    fn test_args_parsing() {
        let app = Args::command();
        app.debug_assert();
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "bt-speaker",
            "--config",
            "/tmp/speaker.json",
            "--control-socket",
            "/tmp/events.sock",
            "--frame-fifo",
            "/tmp/frames",
            "--log-json",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("/tmp/speaker.json")));
        assert!(args.log_json);

        let mut settings = Settings::default();
        args.apply_overrides(&mut settings);
        assert_eq!(settings.bt_speaker.control_socket, PathBuf::from("/tmp/events.sock"));
        assert_eq!(settings.bt_speaker.frame_fifo, Some(PathBuf::from("/tmp/frames")));
    }

    #[test]
    fn test_no_overrides_keeps_settings() {
        let args = Args {
            config: None,
            control_socket: None,
            frame_fifo: None,
            log_json: false,
        };

        let mut settings = Settings::default();
        let before = settings.bt_speaker.control_socket.clone();
        args.apply_overrides(&mut settings);
        assert_eq!(settings.bt_speaker.control_socket, before);
        assert!(settings.bt_speaker.frame_fifo.is_none());
    }
}
