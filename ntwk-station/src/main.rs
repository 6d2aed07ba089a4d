//! ntwk-station — entry point.
//!
//! ```text
//! ntwk-station publish [--port N]        Stream the test pattern
//! ntwk-station subscribe [--host H]      Monitor a publisher
//! ntwk-station --config <path>           Load a custom config TOML
//! ntwk-station --gen-config              Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ntwk_station::config::StationConfig;
use ntwk_station::service::StationService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ntwk-station", about = "Camera-feed publisher and subscriber")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "ntwk-station.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Stream the synthetic camera feed.
    Publish {
        #[arg(short, long)]
        port: Option<u16>,
        /// none, zlib, zstd or jpeg.
        #[arg(long)]
        compression: Option<String>,
        #[arg(long)]
        fps: Option<u32>,
    },
    /// Connect to a publisher and report what arrives.
    Subscribe {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short, long)]
        queue_size: Option<usize>,
    },
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&StationConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = StationConfig::load(&cli.config);
    let publish = match cli.mode {
        None => true,
        Some(Mode::Publish {
            port,
            compression,
            fps,
        }) => {
            if let Some(port) = port {
                config.network.port = port;
            }
            if let Some(compression) = compression {
                config.camera.compression = compression;
            }
            if let Some(fps) = fps {
                config.camera.fps = fps;
            }
            true
        }
        Some(Mode::Subscribe {
            host,
            port,
            queue_size,
        }) => {
            if let Some(host) = host {
                config.network.host = host;
            }
            if let Some(port) = port {
                config.network.port = port;
            }
            if let Some(queue_size) = queue_size {
                config.network.queue_size = queue_size;
            }
            false
        }
    };

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ntwk-station v{}", env!("CARGO_PKG_VERSION"));
    info!("port: {}", config.network.port);
    info!("compression: {}", config.camera.compression);

    let service = StationService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    // The node owns its own runtime thread and blocks while pumping.
    tokio::task::spawn_blocking(move || {
        if publish {
            service.run_publisher()
        } else {
            service.run_subscriber()
        }
    })
    .await??;

    Ok(())
}
