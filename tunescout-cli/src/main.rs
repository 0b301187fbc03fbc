mod app;
mod browse;
mod callback;
mod commands;
mod error;
mod render;

use crate::app::App;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tunescout_audio_jamendo::JAMENDO_CONFIG_TEMPLATE;
use tunescout_core::{CoreError, TunescoutConfig};
use tunescout_spotify_api::SPOTIFY_CONFIG_TEMPLATE;

#[derive(Debug, Parser)]
#[command(name = "tunescout", version, about = "Browse the Spotify catalog and preview tracks")]
struct Cli {
    /// Market (ISO 3166-1 alpha-2) overriding `catalog.market`
    #[arg(long, global = true)]
    market: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List new album releases
    Releases,
    /// List the tracks of an album
    Tracks { album_id: String },
    /// List albums saved in your library (requires `login`)
    Library,
    /// Search albums, artists and tracks
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Sign in to Spotify through the browser
    Login,
    /// Remove the stored Spotify session
    Logout,
    /// Play a track's preview, falling back to Jamendo when there is none
    Preview { album_id: String, track_number: u32 },
    /// Interactive search-as-you-type
    Browse,
}

fn main() {
    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    let cli = Cli::parse();

    // Load config or create template on first run
    // Pass provider templates to include in the generated config file
    let provider_templates: &[&str] = &[SPOTIFY_CONFIG_TEMPLATE, JAMENDO_CONFIG_TEMPLATE];
    let mut config = match TunescoutConfig::load_or_create(Some(provider_templates)) {
        Ok(config) => config,
        Err(e @ CoreError::ConfigNotFound { .. }) => {
            // Config was just created
            println!("{e}");
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    if let Some(market) = cli.market {
        config.catalog.market = market;
    }

    // Create tokio runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Set up Ctrl+C handler to trigger graceful shutdown
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    let result = runtime.block_on(async move {
        let app = App::new(config, cancel_token)?;
        run(&app, cli.command).await
    });

    match result {
        Ok(()) | Err(AppError::Cancelled) => {}
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

async fn run(app: &App, command: Command) -> error::Result<()> {
    match command {
        Command::Releases => commands::releases(app).await,
        Command::Tracks { album_id } => commands::tracks(app, &album_id).await,
        Command::Library => commands::library(app).await,
        Command::Search { query } => commands::search(app, &query.join(" ")).await,
        Command::Login => commands::login(app).await,
        Command::Logout => commands::logout(app).await,
        Command::Preview {
            album_id,
            track_number,
        } => commands::preview(app, &album_id, track_number).await,
        Command::Browse => browse::run(app).await,
    }
}

/// Check if file logging is enabled by reading only the `[logging]` table.
fn check_file_logging_enabled() -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(TunescoutConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with stderr output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));

    // Stdout carries command output
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = tunescout_core::paths::log_file_path();

        // Create cache directory if needed
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
