//! commentator-rs: game bundle host plus DashScope TTS/commentary relay.

mod commentary;
mod config;
mod events;
mod server;
mod tts;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "commentator-rs",
    about = "Game server: static bundle hosting, CosyVoice TTS, Qwen commentary"
)]
struct Args {
    /// Bind host (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // In deployments the .env file sits next to the binary; absent is fine.
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let debug_enabled = args.verbose
        || std::env::var("DEBUG")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("commentator-rs starting");

    let mut config = config::Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let static_dir = config.server.static_dir.clone();
    if static_dir.exists() {
        info!("Static bundle dir: {}", static_dir.display());
    } else {
        warn!(
            "Static bundle dir {} does not exist; run the frontend build first",
            static_dir.display()
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = server::AppState::from_config(config);
    let app = server::router(state);

    info!("Listening on http://{addr}");
    info!("Health check:  http://{addr}/health");
    info!("TTS:           http://{addr}/api/tts");
    info!("Commentary:    http://{addr}/api/commentary");
    info!("Debug mode: {}", if debug_enabled { "on" } else { "off" });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
