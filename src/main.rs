mod cli;
mod commands;
mod terminal;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use coursedrill_core::{AppConfig, AuthSession, PracticeApi};
use coursedrill_remote::{HttpPracticeApi, OfflinePracticeApi};

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    // One user, one session: the clock tick, queue evolution and stdin share a single thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;

    // Environment overrides, then command-line flags
    if let Ok(v) = std::env::var("COURSEDRILL_SERVER_URL") {
        if !v.trim().is_empty() {
            config.server.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("COURSEDRILL_TOKEN") {
        config.server.token = v;
    }
    if let Ok(v) = std::env::var("COURSEDRILL_SEED") {
        match v.parse::<u64>() {
            Ok(seed) => config.practice.seed = Some(seed),
            Err(_) => warn!(value = %v, "ignoring unparseable COURSEDRILL_SEED"),
        }
    }
    if let Ok(v) = std::env::var("COURSEDRILL_OFFLINE") {
        config.offline.enabled = v != "0" && v.to_lowercase() != "false";
    }
    if cli.offline {
        config.offline.enabled = true;
    }
    if cli.seed.is_some() {
        config.practice.seed = cli.seed;
    }

    match cli.command {
        Commands::Practice { offset } => {
            let api = build_api(&config)?;
            commands::practice::run(api, &config, offset).await?;
        }
        Commands::Queue { elapsed_ms, steps } => {
            commands::queue::run(elapsed_ms, steps, config.practice.seed);
        }
        Commands::Captcha { count } => {
            commands::captcha::run(count, config.practice.seed);
        }
    }

    Ok(())
}

fn build_api(config: &AppConfig) -> Result<Arc<dyn PracticeApi>> {
    if config.offline.enabled {
        info!(courses = config.offline.courses.len(), "using offline backend");
        return Ok(Arc::new(OfflinePracticeApi::from_config(
            &config.offline,
            config.practice.seed,
        )));
    }

    info!(server = %config.server.base_url, "using practice server");
    let auth = AuthSession::with_token(config.server.token.clone());
    let api = HttpPracticeApi::new(
        &config.server.base_url,
        auth,
        config.server.connect_timeout_seconds,
        config.server.request_timeout_seconds,
    )?;
    Ok(Arc::new(api))
}
