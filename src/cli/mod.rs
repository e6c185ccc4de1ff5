//! Command-line interface parsing and process bootstrap
//!
//! Resolves configuration, sets up logging on stderr, builds the session and
//! serves MCP on stdio until input closes or a termination signal arrives.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::config::{Config, ConfigOverrides, Mode};
use crate::core::session::{MinecraftSession, SessionState};
use crate::game::bridge::BridgeConnector;
use crate::mcp::{McpServer, ToolRegistry};

const DEFAULT_LOG_FILTER: &str = "info,minecraft_mcp=info";

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_DESCRIBE"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

#[derive(Parser, Debug)]
#[command(name = "minecraft-mcp")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Model Context Protocol server that drives a Minecraft bot")]
#[command(
    long_about = "minecraft-mcp speaks MCP over stdin/stdout and controls one Minecraft bot \
through a protocol bridge. Creative mode exposes command tools (setblock, fill, clone, ...); \
survival mode exposes automation tools (go_to, dig_block, craft_item, ...).\n\n\
Environment Variables:\n\
  MC_MODE           creative or survival (default creative)\n\
  MC_HOST           Server host (default 127.0.0.1)\n\
  MC_PORT           Server port, 1-65535 (default 25565)\n\
  MC_USERNAME       Bot username (default mcp-bot)\n\
  MC_VERSION        Protocol version (default: auto-detect)\n\
  MC_AUTO_CONNECT   Connect at startup (default true)\n\
  MC_BRIDGE_ADDR    Protocol bridge address (default 127.0.0.1:25580)\n\
  RUST_LOG          Log filter; logs go to stderr"
)]
pub struct Args {
    /// Path to a TOML config file (default: platform config directory)
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Gameplay mode, overriding file and environment
    #[arg(long, value_name = "MODE", value_parser = parse_mode_arg)]
    pub mode: Option<Mode>,

    /// Do not connect to the server at startup
    #[arg(long)]
    pub no_auto_connect: bool,

    /// Default log filter when RUST_LOG is unset (e.g. "debug")
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

fn parse_mode_arg(value: &str) -> Result<Mode, String> {
    Mode::parse(value).ok_or_else(|| format!("expected 'creative' or 'survival', got '{value}'"))
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mode: self.mode,
            no_auto_connect: self.no_auto_connect,
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_logging(log_level: Option<&str>) {
    let default_filter = log_level.unwrap_or(DEFAULT_LOG_FILTER).to_string();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref(), &args.overrides())?;

    if args.print_config {
        print!("{}", config.to_display_toml()?);
        return Ok(());
    }

    init_logging(args.log_level.as_deref());
    info!(
        mode = %config.mode,
        endpoint = %config.connection.endpoint(),
        username = %config.connection.username,
        auto_connect = config.auto_connect,
        bridge = %config.bridge.address,
        "Starting minecraft-mcp"
    );

    let connector = Arc::new(BridgeConnector::new(config.bridge.address.clone()));
    let session = Arc::new(MinecraftSession::new(
        config.mode,
        config.connection.clone(),
        connector,
    ));
    let registry = Arc::new(ToolRegistry::for_mode(config.mode)?);

    if config.auto_connect {
        match session.connect().await {
            Ok(()) => info!(endpoint = %config.connection.endpoint(), "Bot connected"),
            Err(err) => warn!(error = %err, "Auto-connect failed; use reconnect_bot to retry"),
        }
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let server = McpServer::new(session.clone(), registry);
    let served = server
        .serve(tokio::io::stdin(), tokio::io::stdout(), shutdown)
        .await;

    if session.state().await != SessionState::Disconnected {
        info!("Disconnecting bot");
    }
    session.shutdown().await;
    served?;
    Ok(())
}

#[cfg(unix)]
async fn watch_signals(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "Unable to watch SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
    shutdown.cancel();
}

#[cfg(not(unix))]
async fn watch_signals(shutdown: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received ctrl-c");
    }
    shutdown.cancel();
}
