use bt_speaker::config::Settings;
use bt_speaker::daemon::{ingress, Daemon};
use bt_speaker::ui::Args;
use bt_speaker::{init_runtime_dirs, init_tracing};
use clap::Parser;
use std::error::Error;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config_path = args.config.clone().unwrap_or_else(Settings::discover_path);
    info!("Loading configuration from {}", config_path.display());
    let mut settings = Settings::load(&config_path)?;
    args.apply_overrides(&mut settings);
    settings.validate()?;

    init_runtime_dirs(&settings)?;

    let daemon = Daemon::start(&settings).await?;
    let control = ingress::serve_control_socket(&settings.bt_speaker.control_socket, daemon.bus())?;

    if let Some(fifo) = &settings.bt_speaker.frame_fifo {
        info!("Reading audio frames from {}", fifo.display());
        ingress::spawn_frame_reader(fifo.clone(), daemon.audio())?;
    }

    shutdown_signal().await;

    control.abort();
    if let Err(e) = daemon.shutdown().await {
        error!("Daemon did not stop cleanly: {}", e);
    }
    if let Err(e) = std::fs::remove_file(&settings.bt_speaker.control_socket) {
        warn!("Could not remove control socket: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
