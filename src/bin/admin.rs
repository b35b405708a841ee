//! CLI administration tool for tracker-gateway.
//!
//! Inspects the effective configuration and checks that the gateway's dependencies
//! are reachable, without starting the HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Show the effective configuration (passwords masked)
//! cargo run --bin admin -- config
//!
//! # Check PostgreSQL and Redis connectivity
//! cargo run --bin admin -- check
//! ```
//!
//! # Environment Variables
//!
//! Same as the server; see `tracker_gateway::config`.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracker_gateway::config::{self, Config, mask_connection_string};
use tracker_gateway::domain::dependency::{Connector, DependencyError};
use tracker_gateway::infrastructure::cache::RedisConnector;
use tracker_gateway::infrastructure::store::PgConnector;

/// CLI tool for inspecting tracker-gateway.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,

    /// Check store and cache connectivity
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match config::load_from_env() {
        Ok(config) => match cli.command {
            Commands::Config => show_config(&config),
            Commands::Check => check_dependencies(&config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn show_config(config: &Config) -> Result<bool> {
    println!("{}", "Gateway configuration".bright_blue().bold());
    println!();
    println!("  Listen:      {}", config.listen_addr()?.to_string().cyan());
    println!(
        "  Database:    {}",
        mask_connection_string(&config.database_url).cyan()
    );
    println!(
        "  Redis:       {}",
        mask_connection_string(&config.redis_url).cyan()
    );

    println!(
        "  Rate limit:  {}",
        format!(
            "{} requests / {}ms",
            config.rate_max_requests, config.rate_window_ms
        )
        .cyan()
    );
    println!("  Proxy:       {}", config.behind_proxy.to_string().cyan());

    let origins = if config.cors_origins.is_empty() {
        "*".to_string()
    } else {
        config.cors_origins.join(", ")
    };
    println!("  CORS:        {}", origins.cyan());
    println!(
        "  Body limit:  {}",
        format!("{} bytes", config.body_limit_bytes).cyan()
    );
    println!(
        "  Grace:       {}",
        format!("{}s", config.shutdown_grace_secs).cyan()
    );
    println!();

    Ok(true)
}

/// Connects to each dependency in startup order and pings it.
async fn check_dependencies(config: &Config) -> Result<bool> {
    println!("{}", "Checking dependencies...".bright_blue());
    println!();

    let store = PgConnector::from_config(config);
    let cache = RedisConnector::new(config.redis_url.clone());

    let mut all_ok = true;
    for connector in [&store as &dyn Connector, &cache] {
        let kind = connector.kind();
        match probe(connector).await {
            Ok(()) => println!("  {} {}", "✓".green().bold(), kind.to_string().bright_white()),
            Err(e) => {
                all_ok = false;
                println!(
                    "  {} {}: {}",
                    "✗".red().bold(),
                    kind.to_string().bright_white(),
                    e.to_string().red()
                );
            }
        }
    }

    println!();
    if all_ok {
        println!("{}", "All dependencies reachable".green().bold());
    } else {
        println!("{}", "Gateway would fail to start".red().bold());
    }

    Ok(all_ok)
}

async fn probe(connector: &dyn Connector) -> Result<(), DependencyError> {
    let handle = connector.connect().await?;
    let result = handle.ping().await;
    handle.close().await;
    result
}
