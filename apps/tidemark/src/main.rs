//! # Tidemark - Underway Sensor Reduction
//!
//! The main binary for the Tidemark QC and reduction engine.
//!
//! ## Usage
//!
//! ```bash
//! tidemark init
//! tidemark ingest -f readings.csv -s 1
//! tidemark reduce -o values.tdmx
//! tidemark flags -s 1 --json-mode
//! ```

use clap::Parser;
use tidemark::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // TIDEMARK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TIDEMARK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "tidemark=debug,tidemark_core=debug"
    } else {
        "tidemark=info,tidemark_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so stdout stays parseable in --json-mode.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Tidemark startup banner.
fn print_banner() {
    eprintln!(
        r#"
  ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
   T I D E M A R K   v{}
   Underway sensor QC and reduction
  ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
"#,
        env!("CARGO_PKG_VERSION")
    );
}
