//! bt-speaker library core functionality

pub mod adapter;
pub mod arbiter;
pub mod audio;
pub mod config;
pub mod daemon;
pub mod hooks;
pub mod ui;
pub mod volume;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// default `bt_speaker=info` filter.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bt_speaker=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

/// Creates the directory holding the control socket.
pub fn init_runtime_dirs(settings: &config::Settings) -> std::io::Result<()> {
    if let Some(dir) = settings.bt_speaker.control_socket.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
