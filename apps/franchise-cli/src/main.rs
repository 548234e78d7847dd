//! Franchise CLI - Command line client for the franchise compliance case tracker

use clap::Parser;
use franchise_cli::logging::init_logging;
use franchise_cli::{execute, health_check, Cli, Commands};
use franchise_core::{
    ConfigLoader, FileSessionStore, FranchiseError, HttpApiClient, SessionContext,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e.downcast_ref::<FranchiseError>() {
            Some(err) if err.is_remote() => eprintln!("Error: {}", err.user_notice()),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_overrides(cli.overrides());
    if let Some(path) = &cli.config {
        anyhow::ensure!(path.exists(), "Config file not found: {}", path.display());
        loader = loader.add_config_path(path);
    }
    let config = loader.load()?;
    let _guard = init_logging(&config.logging)?;

    let session = SessionContext::open(FileSessionStore::new(&config.session_path))?;
    let api = Arc::new(HttpApiClient::new(&config)?);
    match &cli.command {
        Commands::Login { token, .. } => api.set_token(Some(token.clone())),
        _ => api.set_token(session.snapshot().map(|s| s.token)),
    }

    let mut stdout = std::io::stdout();
    match cli.command {
        Commands::Health => health_check(&api, &mut stdout).await,
        command => execute(command, api, &session, &config, cli.json, &mut stdout).await,
    }
}
