//! Runner binary: loads configuration, wires the render surface and geodata
//! client to the flow engine, and keeps everything alive until Ctrl+C.

use clap::Parser;
use log::{error, info};
use roadflow_config::{load_config, Config, SinkType};
use roadflow_engine::{EngineCommands, FlowEngine, OverpassClient};
use roadflow_geo::BoundingBox;
use roadflow_transport::{FileSurface, NullSurface, RenderSurface, WebSocketSurface};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the visualization configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = Args::parse();
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {err}");
            process::exit(1);
        }
    };
    info!("using configuration from {}", args.config.display());

    let client = match OverpassClient::new(
        &config.acquisition.endpoint,
        config.acquisition.request_timeout_ms.map(Duration::from_millis),
    ) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Failed to create geodata client: {err}");
            process::exit(1);
        }
    };

    let (surface, viewport_rx) = match build_surface(&config).await {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!("Failed to set up render surface: {err}");
            process::exit(1);
        }
    };

    let handle = FlowEngine::start(config, Arc::new(client), surface);
    let commands = handle.commands();
    commands.enable().await;

    spawn_status_logger(&handle);
    if let Some(viewport_rx) = viewport_rx {
        spawn_viewport_feed(viewport_rx, commands.clone());
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down");
    handle.stop().await;
}

/// Build the configured sink and, for websocket surfaces, the viewport event
/// stream coming back from connected map clients.
async fn build_surface(
    config: &Config,
) -> Result<(Arc<dyn RenderSurface>, Option<mpsc::Receiver<BoundingBox>>), Box<dyn std::error::Error>>
{
    match config.surface.sink_type {
        SinkType::WebSocket => {
            let options = config.surface.get_websocket_options();
            let (surface, viewport_rx) = WebSocketSurface::bind(&options.host, options.port).await?;
            info!(
                "open the map frontend against ws://{}:{} to visualize the flow",
                options.host, options.port
            );
            let surface: Arc<dyn RenderSurface> = Arc::new(surface);
            Ok((surface, Some(viewport_rx)))
        }
        SinkType::File => {
            let options = config.surface.get_file_options();
            let surface: Arc<dyn RenderSurface> = Arc::new(FileSurface::create(&options.path)?);
            Ok((surface, None))
        }
        SinkType::Null => {
            let surface: Arc<dyn RenderSurface> = Arc::new(NullSurface);
            Ok((surface, None))
        }
    }
}

/// Log engine status transitions: the loading notice during acquisition and
/// the active particle count once data lands.
fn spawn_status_logger(handle: &roadflow_engine::EngineHandle) {
    let mut status = handle.status();
    tokio::spawn(async move {
        let mut was_loading = false;
        while status.changed().await.is_ok() {
            let current = status.borrow().clone();
            if current.loading && !was_loading {
                info!("loading road network...");
            } else if !current.loading && was_loading && current.enabled {
                info!(
                    "{} particles active on {} segments",
                    current.particle_count, current.segment_count
                );
            }
            was_loading = current.loading;
        }
    });
}

/// Forward viewport settles from map clients into the engine.
fn spawn_viewport_feed(mut viewport_rx: mpsc::Receiver<BoundingBox>, commands: EngineCommands) {
    tokio::spawn(async move {
        while let Some(bounds) = viewport_rx.recv().await {
            commands.viewport(bounds).await;
        }
    });
}
