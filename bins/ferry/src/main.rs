mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // .env до разбора CLI: clap читает env-переменные при parse
    match config::load_env_file(std::path::Path::new(".env")) {
        Ok(true) => tracing::debug!("loaded .env"),
        Ok(false) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Migrate(args) => cmd::migrate::run(args).await,
        Commands::Seed(args) => cmd::seed::run(args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
