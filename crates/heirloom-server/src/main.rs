//! Heirloom Server — headless scheduler daemon for the inheritance engine.
//!
//! Drives the periodic release checks: polls the engine's pending ring,
//! moves eligible wills into the release timelock, and finalizes wills
//! whose timelock has expired.
//!
//! # Usage
//!
//! ```bash
//! heirloom-server --config /etc/heirloom/server.toml
//! heirloom-server --once     # Run one tick and exit
//! heirloom-server --validate # Validate config and exit
//! ```

mod config;
mod daemon;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Parse CLI args (minimal — no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/etc/heirloom/server.toml");
    let mut one_shot = false;
    let mut validate_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--once" => {
                one_shot = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("heirloom-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    // Load config, apply env overrides, validate
    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    server_config.apply_env_overrides();
    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    if validate_only {
        println!("Configuration is valid.");
        println!("  Data dir:      {}", server_config.server.data_dir.display());
        println!(
            "  Tick interval: {} secs",
            server_config.scheduler.tick_interval_secs
        );
        println!("  Batch size:    {}", server_config.scheduler.batch_size);
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    if one_shot {
        log::info!("Running single scheduler tick…");
        let stack = daemon::build_stack();
        let report = daemon::run_tick(
            &stack.engine,
            &daemon::scheduler_auth(),
            server_config.scheduler.batch_size,
        );
        log::info!(
            "Done: {} polled, {} requested, {} finalized.",
            report.polled,
            report.requested,
            report.finalized
        );
    } else {
        let shutdown = rt.block_on(async {
            tokio::select! {
                result = daemon::run(server_config) => result,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received shutdown signal. Exiting…");
                    Ok(())
                }
            }
        });

        if let Err(e) = shutdown {
            log::error!("Server error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"Heirloom Server — scheduler daemon for the inheritance engine

USAGE:
    heirloom-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /etc/heirloom/server.toml)
    --once                Run a single scheduler tick and exit
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    HEIRLOOM_DATA_DIR         Data directory path
    HEIRLOOM_LOG_LEVEL        Log level (error/warn/info/debug/trace)
    HEIRLOOM_TICK_INTERVAL    Seconds between scheduler ticks
    HEIRLOOM_BATCH_SIZE       Will ids scanned per poll

EXAMPLES:
    # Run as daemon with config file
    heirloom-server --config /path/to/server.toml

    # Single tick (useful for cron jobs)
    heirloom-server --config server.toml --once

    # Validate configuration
    heirloom-server --config server.toml --validate
"#
    );
}
