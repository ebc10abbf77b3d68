//! Calculation service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cicd_demo::api::AppState;
use cicd_demo::config::Config;
use cicd_demo::error::AppError;
use cicd_demo::flags::FlagEvaluator;
use cicd_demo::metrics;
use cicd_demo::server::{serve, spawn_flag_initialization};
use cicd_demo::utils::{log_filter, shutdown_signal, DEFAULT_LOG_FILTER};

/// Demo calculation service with feature-flag gating.
#[derive(Parser, Debug)]
#[command(name = "cicd-demo")]
#[command(about = "Calculation HTTP service gated by remote feature flags")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Configuration is loaded before logging so LOG_JSON can take effect
    let config = Config::load();
    let (directives, json) = config
        .as_ref()
        .map(|c| (c.rust_log.as_str(), c.log_json))
        .unwrap_or((DEFAULT_LOG_FILTER, false));
    init_logging(log_filter(directives, args.verbose), json);

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        AppError::from(e)
    })?;

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(config),
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
        None => cmd_serve(config, args.port).await,
    }
}

fn init_logging(filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Check configuration validity.
fn cmd_check_config(config: Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CICD DEMO - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Port: {}", config.port);
    println!("  Mode: {}", config.app_env);
    println!("  Version: {}", config.version());
    println!("  Flag Service: {}", config.flag_service_url);
    println!("  Flag Environment: {}", config.flag_environment);
    println!(
        "  Flag SDK Key: {}",
        if config.sdk_key().is_some() {
            "present"
        } else {
            "absent (flags use defaults)"
        }
    );
    println!("  Flag Timeout: {}ms", config.flag_timeout_ms);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the HTTP server until a shutdown signal, then release the flag
/// evaluator.
async fn cmd_serve(mut config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(AppError::InvalidConfig(e).into());
    }

    info!("Mode: {}", config.app_env);
    info!("Version: {}", config.version());

    let handle = metrics::install_recorder()?;
    let flags = Arc::new(FlagEvaluator::from_config(&config)?);
    spawn_flag_initialization(&flags, config.app_env);

    let state = AppState::new(flags, handle, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        AppError::from(e)
    })?;
    info!("Server running on port {}", config.port);

    serve(listener, state, shutdown_signal()).await?;

    Ok(())
}
