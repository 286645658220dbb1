//! qbrack command line interface
//!
//! Administers a qbrack site: title and parameters, page blocks, comments
//! and uploaded media.

use qbrack::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "qbrack=info".into()))
        .init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
