//! End-to-end tests driving the daemon through its control socket
//!
//! Two phones compete for the speaker; the second one takes over only after
//! the first has been disconnected.

use crate::test_utils::{marker_settings, wait_for_file, RecordingAdapter};
use bt_speaker::daemon::{ingress, Daemon};
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

const A2DP: &str = "0000110d-0000-1000-8000-00805f9b34fb";
const PHONE_A: &str = "/org/bluez/hci0/dev_11_22_33_44_55_66";
const PHONE_B: &str = "/org/bluez/hci0/dev_66_55_44_33_22_11";

struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ControlClient {
    async fn connect(path: &std::path::Path) -> Result<Self, Box<dyn Error>> {
        let stream = UnixStream::connect(path).await?;
        let (read_half, writer) = stream.into_split();
        Ok(ControlClient {
            lines: BufReader::new(read_half).lines(),
            writer,
        })
    }

    async fn send(&mut self, message: Value) -> Result<(), Box<dyn Error>> {
        self.writer.write_all(format!("{}\n", message).as_bytes()).await?;
        Ok(())
    }

    async fn request(&mut self, message: Value) -> Result<Value, Box<dyn Error>> {
        self.send(message).await?;
        let line = tokio::time::timeout(Duration::from_secs(3), self.lines.next_line())
            .await??
            .ok_or("control socket closed")?;
        Ok(serde_json::from_str(&line)?)
    }
}

#[cfg(test)]
mod daemon_flow_integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_takeover_through_control_socket() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let mut settings = marker_settings(dir.path());
        let track_log = dir.path().join("tracks.log");
        settings.bt_speaker.track_command = format!("echo \"$TITLE\" >> {}", track_log.display());

        let adapter = Arc::new(RecordingAdapter::default());
        let daemon = Daemon::start_with(&settings, adapter.clone(), None, Some(Duration::from_secs(1))).await?;
        let server = ingress::serve_control_socket(&settings.bt_speaker.control_socket, daemon.bus())?;
        let mut client = ControlClient::connect(&settings.bt_speaker.control_socket).await?;

        // Phone A pairs and connects.
        let pin = client.request(json!({"type": "request_pin", "device": PHONE_A})).await?;
        assert_eq!(pin, json!({"pin": "0000"}));
        let reply = client.request(json!({"type": "authorize", "device": PHONE_A, "uuid": A2DP})).await?;
        assert_eq!(reply, json!({"accepted": true}));
        client.send(json!({"type": "connection", "device": PHONE_A, "connected": true})).await?;
        assert!(wait_for_file(&dir.path().join("connected")).await);

        // The same track reported twice runs the hook once.
        let track = json!({"type": "track", "device": PHONE_A, "metadata": {"Title": "Intro", "Position": 10}});
        client.send(track.clone()).await?;
        client.send(track).await?;
        assert!(wait_for_file(&track_log).await);

        // Unsupported profiles are refused.
        let reply = client.request(json!({"type": "authorize", "device": PHONE_B, "uuid": "1108"})).await?;
        assert_eq!(reply, json!({"accepted": false}));

        // Phone B takes over; its reply only comes after A was disconnected.
        let reply = client.request(json!({"type": "authorize", "device": PHONE_B, "uuid": "110e"})).await?;
        assert_eq!(reply, json!({"accepted": true}));
        assert!(adapter.calls().contains(&"disconnect 11:22:33:44:55:66".to_string()));
        assert!(wait_for_file(&dir.path().join("disconnected")).await);

        std::fs::remove_file(dir.path().join("connected"))?;
        client.send(json!({"type": "connection", "device": PHONE_B, "connected": true})).await?;
        assert!(wait_for_file(&dir.path().join("connected")).await);

        let tracks = std::fs::read_to_string(&track_log)?;
        assert_eq!(tracks.lines().collect::<Vec<_>>(), vec!["Intro"]);

        server.abort();
        daemon.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_frames_from_file_reach_play_command() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let sink = dir.path().join("played.raw");
        let source = dir.path().join("frames.raw");
        std::fs::write(&source, vec![1u8; 10_000])?;

        let mut settings = marker_settings(dir.path());
        settings.bt_speaker.play_command = format!("cat >> {}", sink.display());
        let adapter = Arc::new(RecordingAdapter::default());
        let daemon = Daemon::start_with(&settings, adapter, None, None).await?;

        let reader = ingress::spawn_frame_reader(source, daemon.audio())?;
        tokio::task::spawn_blocking(move || reader.join())
            .await?
            .map_err(|_| "frame reader panicked")?;

        let mut written = 0;
        for _ in 0..100 {
            written = std::fs::metadata(&sink).map(|m| m.len()).unwrap_or(0);
            if written == 10_000 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(written, 10_000);

        daemon.shutdown().await?;
        Ok(())
    }
}
