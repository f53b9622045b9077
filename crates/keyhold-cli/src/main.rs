//! Keyhold - authentication provider configuration server
//!
//! Serves the admin API that selects and previews each tenant's
//! authentication provider.

use anyhow::Context;
use clap::{Parser, Subcommand};
use keyhold_api::KeyholdServer;
use keyhold_core::config::{token_digest, KeyholdConfig, LoggingConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "keyhold")]
#[command(author = "Keyhold Team")]
#[command(version = keyhold_core::VERSION)]
#[command(about = "Authentication provider configuration server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KEYHOLD_CONFIG")]
    config: Option<String>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Port number
    #[arg(short, long)]
    port: Option<u16>,

    /// Database URL, or `memory` for a non-persistent store
    #[arg(long)]
    database_url: Option<String>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the admin API server
    Server,

    /// Show version information
    Version,

    /// Print the SHA-256 digest to configure for a bearer token
    HashToken {
        /// Raw token
        token: String,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Version) => {
            println!("keyhold {}", keyhold_core::VERSION);
            return Ok(());
        }
        Some(Commands::HashToken { token }) => {
            println!("{}", token_digest(token));
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli)?;

    if let Some(Commands::CheckConfig) = cli.command {
        config.validate().context("invalid configuration")?;
        println!("Configuration OK ({} tenants)", config.tenants.len());
        return Ok(());
    }

    init_logging(&config.logging)?;
    run_server(config).await
}

/// File or environment, then command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<KeyholdConfig> {
    let mut config = match &cli.config {
        Some(path) => KeyholdConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => KeyholdConfig::from_env(),
    };

    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    Ok(config)
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid log level: {}", logging.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format.as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer().with_target(true)).init(),
    }

    Ok(())
}

async fn run_server(config: KeyholdConfig) -> anyhow::Result<()> {
    info!("Starting Keyhold {}", keyhold_core::VERSION);
    info!("Database: {}", config.database.url);
    info!("Tenants: {}", config.tenants.join(", "));

    KeyholdServer::new(config)
        .run()
        .await
        .context("server failed")?;

    Ok(())
}
