//! RoadSafe CLI entry point.

use anyhow::Result;
use clap::Parser;
use roadsafe::cli::commands::{self, AskRequest};
use roadsafe::cli::{Cli, Commands};
use roadsafe::config::{Credentials, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;
    let credentials = Credentials::from_env(&settings.provider);

    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("roadsafe={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Index { input } => {
            commands::run_index(&input, &settings, &credentials).await?;
        }

        Commands::Ask {
            query,
            sensor,
            sensor_file,
            readings,
            export,
            format,
        } => {
            let request = AskRequest {
                query,
                sensor,
                sensor_file,
                readings,
                export,
                format,
            };
            commands::run_ask(request, &settings, &credentials).await?;
        }

        Commands::Chat => {
            commands::run_chat(&settings, &credentials).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(&host, port, &settings, &credentials).await?;
        }

        Commands::Info => {
            commands::run_info(&settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, &credentials, &config_path)?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, &settings, &config_path)?;
        }
    }

    Ok(())
}
