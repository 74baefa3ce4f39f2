//! Relaybot - Multi-channel message gateway with durable interaction memory
//!
//! Command-line entry point: wires the memory store, agent and channel
//! registries, and the gateway together, then serves the HTTP surface until
//! interrupted.

use anyhow::Result;
use clap::{Parser, Subcommand};
use relaybot::{
    agents::{AgentManager, EchoAgent},
    api::{build_app, AppState},
    channels::{ChannelManager, MockChannel},
    config::RelaybotConfig,
    gateway::Gateway,
    memory::MemoryStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Multi-channel message gateway with durable interaction memory")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RELAYBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relaybot gateway
    Gateway {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("relaybot={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        RelaybotConfig::load(config_path)?
    } else {
        RelaybotConfig::default()
    };

    match cli.command {
        Commands::Gateway { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            run_gateway(config).await?;
        }
        Commands::Config { default } => {
            let config = if default {
                RelaybotConfig::default()
            } else {
                config
            };
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run_gateway(config: RelaybotConfig) -> Result<()> {
    tracing::info!("Starting relaybot gateway");

    let memory = Arc::new(MemoryStore::connect(&config.memory.db_path).await?);

    let agents = Arc::new(
        AgentManager::with_default(Arc::new(EchoAgent::new(
            config.agents.default_agent.clone(),
            config.agents.model.clone(),
        )))
        .await,
    );

    let channels = Arc::new(ChannelManager::new());
    for channel_id in &config.channels.enabled {
        channels
            .register(Arc::new(MockChannel::new(channel_id.clone())))
            .await;
    }

    let gateway = Arc::new(Gateway::new(config.clone()));
    gateway
        .initialize(agents.clone(), channels.clone(), Some(memory.clone()))
        .await?;
    gateway.start().await?;

    let app = build_app(AppState {
        gateway: gateway.clone(),
        agents,
        channels,
        memory,
    });

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Relaybot gateway listening on {}. Press Ctrl+C to stop.", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down...");
        }
    }

    gateway.stop().await?;
    tracing::info!("Relaybot gateway stopped");

    Ok(())
}
