//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for bt-speaker
#[derive(Parser, Debug)]
#[command(author, version, about = "Bluetooth A2DP speaker daemon", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, env = "BT_SPEAKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Control socket path, overriding the config file
    #[arg(short = 's', long, env = "BT_SPEAKER_CONTROL_SOCKET")]
    pub control_socket: Option<PathBuf>,

    /// Raw frame FIFO path, overriding the config file
    #[arg(short = 'f', long, env = "BT_SPEAKER_FRAME_FIFO")]
    pub frame_fifo: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "BT_SPEAKER_LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Applies path overrides given on the command line.
    pub fn apply_overrides(&self, settings: &mut crate::config::Settings) {
        if let Some(socket) = &self.control_socket {
            settings.bt_speaker.control_socket = socket.clone();
        }
        if let Some(fifo) = &self.frame_fifo {
            settings.bt_speaker.frame_fifo = Some(fifo.clone());
        }
    }
}
