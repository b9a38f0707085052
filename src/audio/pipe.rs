use crate::audio::error::PipeError;
use crate::volume::VolumeMapper;
use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "bt_speaker::audio::pipe";

/// Highest volume level a remote device reports.
pub const MAX_REMOTE_VOLUME: u8 = 127;

/// Playback process and its input stream. Replaced as a whole on restart.
#[derive(Default)]
struct AudioPipeState {
    process: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl AudioPipeState {
    fn stream_open(&self) -> bool {
        self.stdin.is_some()
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "play command input is closed")
        })?;
        stdin.write_all(frame)?;
        stdin.flush()
    }

    /// Closes the input, then kills and reaps the process.
    fn close(&mut self) {
        // Dropping stdin first lets a well-behaved player see EOF.
        self.stdin.take();
        if let Some(mut child) = self.process.take() {
            let pid = child.id();
            if let Err(e) = child.kill() {
                trace!(target: LOG_TARGET, pid, "Kill failed (process likely gone already): {}", e);
            }
            match child.wait() {
                Ok(status) => debug!(target: LOG_TARGET, pid, "Play command exited: {}", status),
                Err(e) => warn!(target: LOG_TARGET, pid, "Failed to reap play command: {}", e),
            }
        }
    }
}

/// Pipes decoded audio frames into the configured play command and applies
/// remote volume changes to the hardware mixer.
///
/// The process handle sits behind a mutex: a frame write, the
/// close-and-respawn that follows a failed write, and `close()` never
/// overlap.
pub struct AudioPipe {
    play_command: String,
    state: Mutex<AudioPipeState>,
    volume: Option<Arc<VolumeMapper>>,
    spawns: AtomicUsize,
    restarts: AtomicUsize,
}

impl AudioPipe {
    /// Creates the pipe and starts the play command.
    ///
    /// `volume` is `None` when hardware volume integration is disabled.
    pub fn new(play_command: &str, volume: Option<Arc<VolumeMapper>>) -> Result<Self, PipeError> {
        info!(target: LOG_TARGET, "Creating audio pipe for command: {}", play_command);
        let pipe = AudioPipe {
            play_command: play_command.to_string(),
            state: Mutex::new(AudioPipeState::default()),
            volume,
            spawns: AtomicUsize::new(0),
            restarts: AtomicUsize::new(0),
        };
        pipe.open()?;
        Ok(pipe)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, AudioPipeState>, PipeError> {
        self.state
            .lock()
            .map_err(|e| PipeError::InvalidState(format!("Audio pipe mutex poisoned: {}", e)))
    }

    fn spawn_into(&self, state: &mut AudioPipeState) -> Result<(), PipeError> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.play_command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| PipeError::SpawnError(format!("{}: {}", self.play_command, e)))?;

        state.stdin = child.stdin.take();
        debug!(target: LOG_TARGET, pid = child.id(), "Play command started.");
        state.process = Some(child);
        self.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Starts the play command unless it is already running.
    pub fn open(&self) -> Result<(), PipeError> {
        let mut state = self.lock_state()?;
        if state.stream_open() {
            return Ok(());
        }
        self.spawn_into(&mut state)
    }

    /// Writes one frame to the play command.
    ///
    /// A failed write closes and respawns the process once and retries the
    /// same frame. If the retry fails too the error is returned and no
    /// further restart is attempted for this frame.
    pub fn write(&self, frame: &[u8]) -> Result<(), PipeError> {
        let mut state = self.lock_state()?;
        if !state.stream_open() {
            debug!(target: LOG_TARGET, "Pipe closed, starting play command before write.");
            self.spawn_into(&mut state)?;
        }

        let first_error = match state.write_frame(frame) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        warn!(target: LOG_TARGET, "Write to play command failed ({}), restarting it.", first_error);
        state.close();
        self.spawn_into(&mut state)?;
        self.restarts.fetch_add(1, Ordering::SeqCst);

        state.write_frame(frame).map_err(|e| {
            error!(target: LOG_TARGET, "Write failed again after restart: {}", e);
            state.close();
            PipeError::WriteFailed(e.to_string())
        })
    }

    /// Applies a remote volume level in `0..=127`. Returns the applied
    /// percentage, or `None` when volume integration is disabled.
    #[instrument(skip(self))]
    pub fn set_volume(&self, level: u8) -> Result<Option<f64>, PipeError> {
        let mapper = match &self.volume {
            Some(mapper) => mapper,
            None => return Ok(None),
        };

        let level = level.min(MAX_REMOTE_VOLUME);
        let pct = f64::from(level) / f64::from(MAX_REMOTE_VOLUME) * 100.0;
        info!(target: LOG_TARGET, "Volume changed to {}%", pct as i64);
        let applied = mapper.set_percent(pct)?;
        Ok(Some(applied))
    }

    /// Stops the play command. Safe to call when already closed.
    pub fn close(&self) -> Result<(), PipeError> {
        let mut state = self.lock_state()?;
        if state.process.is_some() {
            info!(target: LOG_TARGET, "Closing audio pipe.");
        }
        state.close();
        Ok(())
    }

    /// Whether a play command is currently attached.
    pub fn is_open(&self) -> bool {
        self.state.lock().map(|s| s.stream_open()).unwrap_or(false)
    }

    /// Number of restarts triggered by failed writes.
    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Number of times the play command has been started.
    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn volume_mapper(&self) -> Option<&Arc<VolumeMapper>> {
        self.volume.as_ref()
    }
}

impl Drop for AudioPipe {
    fn drop(&mut self) {
        debug!(target: LOG_TARGET, "Dropping AudioPipe.");
        if let Ok(mut state) = self.state.lock() {
            state.close();
        }
    }
}
