use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use insight::cli::{self, Args, Commands};
use insight::config::ConfigManager;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let default_filter = if args.verbose { "insight=debug" } else { "insight=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!("Insight v{}", env!("CARGO_PKG_VERSION"));

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let config = manager.load_config().await.context("failed to load configuration")?;

    match args.command {
        Commands::Chat { options } => cli::commands::chat::handle_chat(config, options).await?,
        Commands::Ask { question, options } => cli::commands::ask::handle_ask(config, question, options).await?,
        Commands::Server { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            insight::start_api_server(&config, &host, port)
                .await
                .with_context(|| format!("API server on {}:{} stopped", host, port))?
        }
        Commands::Tools => cli::commands::tools::handle_tools(&config).await?,
        Commands::Keys => cli::commands::keys::handle_keys(&config).await?,
        Commands::Config { action } => cli::commands::config::handle_config(&manager, &config, action).await?,
    }

    Ok(())
}
