//! Wharf relay server: a self-hostable WebSocket signalling relay for
//! browser-to-browser and terminal-to-browser file transfer.

mod config;
mod rate_limit;
mod room;
mod store;
mod websocket;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use config::RelayConfig;
use rate_limit::RateLimiter;
use room::RoomRegistry;
use store::InMemoryConfigStore;
use websocket::AppState;

#[derive(Parser)]
#[command(name = "wharf-relay")]
#[command(about = "Wharf relay server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Server bind address, overrides the config file's `bind_addr`
        #[arg(short, long)]
        addr: Option<String>,

        /// Path to a JSON configuration file
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<RelayConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        }
        None => RelayConfig::default(),
    };
    config.validate();
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { addr, config } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(addr) = addr {
                config.bind_addr = addr;
            }

            let store = Arc::new(InMemoryConfigStore::new());
            let registry = Arc::new(RoomRegistry::new(store));
            let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_burst, config.rate_limit_per_sec));
            let router = websocket::router(AppState::new(registry, rate_limiter));

            let bind_addr: SocketAddr = config.bind_addr.parse()?;
            let listener = tokio::net::TcpListener::bind(bind_addr).await?;
            info!(%bind_addr, "wharf relay listening");

            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
            Ok(())
        }
    }
}
