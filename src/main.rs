//! ring-dl - download Ring doorbell and camera recordings.

use std::process::ExitCode;

use clap::Parser;
use ring_recordings_dl::cli::{self, Cli};
use ring_recordings_dl::error::EXIT_SUCCESS;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before flags read their env fallbacks)
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse_from(cli::normalize_legacy_args(std::env::args())) {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout, usage errors to stderr
            e.print().ok();
            return ExitCode::from(cli::parse_error_exit_code(&e));
        }
    };

    let default_filter = if cli.verbose {
        "ring_recordings_dl=debug"
    } else {
        "ring_recordings_dl=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    println!();
    println!(
        "Ring Recordings Download Tool v{}",
        env!("CARGO_PKG_VERSION")
    );
    println!();

    match cli::run(cli).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!(error_code = e.error_code(), "{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
