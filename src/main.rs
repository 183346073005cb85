//! emu-boot
//!
//! Entry point: reads the step inputs, starts the emulator and exits
//! non-zero when it did not come up.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use emu_boot::cli::Cli;
use emu_boot::commands::StartCommand;
use emu_boot::core::{APP_NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    info!("{} v{}", APP_NAME, VERSION);

    let config = match cli.load_config().await {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = StartCommand::new(config).execute().await {
        error!("{}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}
