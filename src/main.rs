use std::time::Duration;

use clap::Parser;
use pasteboardd::cli::{Cli, Command};
use pasteboardd::store::PasteboardConfig;
use pasteboardd::{broker, client};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            device_id,
            provider_timeout_ms,
        } => {
            let config = PasteboardConfig {
                device_id,
                provider_timeout: (provider_timeout_ms > 0)
                    .then(|| Duration::from_millis(provider_timeout_ms)),
            };
            if let Err(e) = broker::run(config).await {
                tracing::error!(error = %e, "broker failed");
                eprintln!("pasteboardd serve: {e}");
                std::process::exit(1);
            }
        }
        Command::Client { app_id, action } => match client::run(&app_id, action).await {
            Ok(code) => std::process::exit(code),
            Err(e) => {
                tracing::error!(error = %e, "client failed");
                eprintln!("pasteboardd client: {e}");
                std::process::exit(1);
            }
        },
    }
}
