//! Local ingress: JSON-lines control socket and raw frame FIFO

use super::events::BusEvent;
use crate::arbiter::DeviceId;
use crate::audio::AudioPipe;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "bt_speaker::daemon::ingress";

/// Bytes read from the frame FIFO per write to the play command.
pub const FRAME_CHUNK_SIZE: usize = 4096;

/// One line on the control socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngressMessage {
    Authorize { device: DeviceId, uuid: String },
    RequestPin { device: DeviceId },
    Connection { device: DeviceId, connected: bool },
    Track {
        device: DeviceId,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Volume { level: u8 },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum IngressReply {
    Authorization { accepted: bool },
    Pin { pin: String },
    Error { error: String },
}

impl IngressReply {
    fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"error":"unserializable reply"}"#.to_string())
    }
}

/// Parses one control line, forwards it to the bus and returns the reply
/// line, if the message type expects one.
pub async fn handle_line(line: &str, bus: &mpsc::Sender<BusEvent>) -> Option<String> {
    let message: IngressMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(target: LOG_TARGET, "Malformed control message: {}", e);
            return Some(IngressReply::Error { error: e.to_string() }.to_line());
        }
    };
    trace!(target: LOG_TARGET, "Control message: {:?}", message);

    let closed = || Some(IngressReply::Error { error: "daemon is shutting down".to_string() }.to_line());

    match message {
        IngressMessage::Authorize { device, uuid } => {
            let (reply, answer) = oneshot::channel();
            if bus.send(BusEvent::Authorize { device, uuid, reply }).await.is_err() {
                return closed();
            }
            let accepted = answer.await.unwrap_or(false);
            Some(IngressReply::Authorization { accepted }.to_line())
        }
        IngressMessage::RequestPin { device } => {
            let (reply, answer) = oneshot::channel();
            if bus.send(BusEvent::RequestPinCode { device, reply }).await.is_err() {
                return closed();
            }
            match answer.await {
                Ok(pin) => Some(IngressReply::Pin { pin }.to_line()),
                Err(_) => closed(),
            }
        }
        IngressMessage::Connection { device, connected } => {
            bus.send(BusEvent::ConnectionChanged { device, connected })
                .await
                .err()
                .and_then(|_| closed())
        }
        IngressMessage::Track { device, metadata } => {
            bus.send(BusEvent::TrackChanged { device, metadata })
                .await
                .err()
                .and_then(|_| closed())
        }
        IngressMessage::Volume { level } => {
            bus.send(BusEvent::VolumeChanged { level })
                .await
                .err()
                .and_then(|_| closed())
        }
    }
}

/// Binds the control socket, replacing a stale socket file, and serves
/// connections until the returned task is aborted.
#[instrument(skip(bus))]
pub fn serve_control_socket(path: &Path, bus: mpsc::Sender<BusEvent>) -> io::Result<JoinHandle<()>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        debug!(target: LOG_TARGET, "Removing stale control socket.");
        std::fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path)?;
    info!(target: LOG_TARGET, "Listening for bus events on {}", path.display());

    Ok(tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(serve_connection(stream, bus.clone()));
                }
                Err(e) => {
                    error!(target: LOG_TARGET, "Failed to accept control connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }))
}

async fn serve_connection(stream: UnixStream, bus: mpsc::Sender<BusEvent>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(target: LOG_TARGET, "Control connection read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Some(mut reply) = handle_line(&line, &bus).await {
            reply.push('\n');
            if let Err(e) = write_half.write_all(reply.as_bytes()).await {
                warn!(target: LOG_TARGET, "Control connection write failed: {}", e);
                break;
            }
        }
    }
    trace!(target: LOG_TARGET, "Control connection closed.");
}

/// Copies `reader` into the pipe in [`FRAME_CHUNK_SIZE`] chunks until EOF.
///
/// A chunk whose write fails is dropped. Returns the number of chunks
/// delivered.
pub fn pump_frames<R: Read>(reader: &mut R, audio: &AudioPipe) -> io::Result<usize> {
    let mut buf = [0u8; FRAME_CHUNK_SIZE];
    let mut delivered = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(delivered),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        match audio.write(&buf[..n]) {
            Ok(()) => delivered += 1,
            Err(e) => error!(target: LOG_TARGET, "Dropping audio frame: {}", e),
        }
    }
}

/// Reads raw frames from `path` on a dedicated thread.
///
/// A FIFO is reopened each time its writer goes away; a regular file is
/// read once.
pub fn spawn_frame_reader(path: PathBuf, audio: Arc<AudioPipe>) -> io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("frame-reader".to_string())
        .spawn(move || loop {
            let mut source = match File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    error!(target: LOG_TARGET, "Cannot open frame source {}: {}", path.display(), e);
                    return;
                }
            };
            let is_fifo = source
                .metadata()
                .map(|m| m.file_type().is_fifo())
                .unwrap_or(false);

            match pump_frames(&mut source, &audio) {
                Ok(chunks) => debug!(target: LOG_TARGET, chunks, "Frame source reached EOF."),
                Err(e) => error!(target: LOG_TARGET, "Reading frame source failed: {}", e),
            }

            if !is_fifo {
                return;
            }
        })
}
