use super::{AdapterControl, AdapterError};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

const LOG_TARGET: &str = "bt_speaker::adapter::bluetoothctl";

/// `AdapterControl` driving the adapter through the `bluetoothctl` tool.
#[derive(Debug, Clone)]
pub struct BluetoothCtl {
    program: String,
    adapter_path: String,
}

impl BluetoothCtl {
    pub fn new(adapter_path: &str) -> Self {
        BluetoothCtl {
            program: "bluetoothctl".to_string(),
            adapter_path: adapter_path.to_string(),
        }
    }

    /// Uses a different executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, AdapterError> {
        debug!(target: LOG_TARGET, adapter = %self.adapter_path, "Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AdapterError::CommandFailed(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                if stderr.is_empty() { &stdout } else { &stderr }
            )));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl AdapterControl for BluetoothCtl {
    #[instrument(skip(self))]
    async fn set_discoverable(&self, discoverable: bool) -> Result<(), AdapterError> {
        let state = if discoverable { "on" } else { "off" };
        self.run(&["discoverable", state]).await?;
        info!(target: LOG_TARGET, "Adapter {} discoverable: {}", self.adapter_path, discoverable);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect_device(&self, address: &str) -> Result<(), AdapterError> {
        let output = self.run(&["disconnect", address]).await?;
        info!(target: LOG_TARGET, "Ran disconnect for {}. Output: {}", address, output);
        Ok(())
    }
}
