//! Tests for the audio pipe

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::volume::{ConfiguredOutput, MixerControl, VolumeError, VolumeMapper};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Larger than a pipe buffer, so writing to an exited reader always
    /// surfaces the broken pipe instead of disappearing into the buffer.
    const LARGE_FRAME: usize = 1 << 20;

    struct RecordingControl {
        value: Arc<Mutex<i64>>,
    }

    impl MixerControl for RecordingControl {
        fn query_range(&self) -> Result<Option<(i64, i64)>, VolumeError> {
            Ok(None)
        }

        fn read_value(&self) -> Result<i64, VolumeError> {
            Ok(*self.value.lock().unwrap())
        }

        fn write_value(&self, value: i64) -> Result<(), VolumeError> {
            *self.value.lock().unwrap() = value;
            Ok(())
        }
    }

    #[test]
    fn test_write_to_running_process() {
        let pipe = AudioPipe::new("cat > /dev/null", None).unwrap();
        assert!(pipe.is_open());
        pipe.write(&[0u8; 4096]).unwrap();
        pipe.write(&vec![1u8; LARGE_FRAME]).unwrap();
        assert_eq!(pipe.restart_count(), 0);
        assert_eq!(pipe.spawn_count(), 1);
    }

    #[test]
    fn test_write_after_process_exit_restarts_once() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("started-once");
        // First instance exits without reading; the respawned one drains stdin.
        let command = format!(
            "if [ -e '{m}' ]; then cat > /dev/null; else touch '{m}'; fi",
            m = marker.display()
        );
        let pipe = AudioPipe::new(&command, None).unwrap();

        pipe.write(&vec![0u8; LARGE_FRAME]).unwrap();
        assert_eq!(pipe.restart_count(), 1);
        assert_eq!(pipe.spawn_count(), 2);
        assert!(pipe.is_open());
    }

    #[test]
    fn test_second_failure_is_reported_without_further_restarts() {
        let pipe = AudioPipe::new("true", None).unwrap();

        match pipe.write(&vec![0u8; LARGE_FRAME]) {
            Err(PipeError::WriteFailed(_)) => {}
            other => panic!("expected WriteFailed, got {:?}", other),
        }
        assert_eq!(pipe.restart_count(), 1);
        assert_eq!(pipe.spawn_count(), 2);
    }

    #[test]
    fn test_close_is_idempotent_and_write_reopens() {
        let pipe = AudioPipe::new("cat > /dev/null", None).unwrap();
        pipe.close().unwrap();
        pipe.close().unwrap();
        assert!(!pipe.is_open());

        pipe.write(b"frame").unwrap();
        assert!(pipe.is_open());
        assert_eq!(pipe.restart_count(), 0);
        assert_eq!(pipe.spawn_count(), 2);
    }

    #[test]
    fn test_set_volume_without_mapper_is_noop() {
        let pipe = AudioPipe::new("cat > /dev/null", None).unwrap();
        assert_eq!(pipe.set_volume(64).unwrap(), None);
        assert!(pipe.volume_mapper().is_none());
    }

    #[test]
    fn test_set_volume_normalizes_remote_level() {
        let value = Arc::new(Mutex::new(0));
        let mapper = VolumeMapper::new(
            Box::new(RecordingControl { value: Arc::clone(&value) }),
            Box::new(ConfiguredOutput { onboard: true }),
        );
        let pipe = AudioPipe::new("cat > /dev/null", Some(Arc::new(mapper))).unwrap();

        assert_eq!(pipe.set_volume(127).unwrap(), Some(100.0));
        assert_eq!(*value.lock().unwrap(), 0);

        assert_eq!(pipe.set_volume(0).unwrap(), Some(0.0));
        assert_eq!(*value.lock().unwrap(), -10239);

        // Out-of-range levels are treated as full volume.
        assert_eq!(pipe.set_volume(200).unwrap(), Some(100.0));
    }

    #[test]
    fn test_pipe_error_display() {
        let err = PipeError::WriteFailed("Broken pipe".to_string());
        assert_eq!(
            format!("{}", err),
            "Write to play command failed after restart: Broken pipe"
        );
    }
}
