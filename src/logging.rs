//! Diagnostic logging setup
//!
//! User-facing progress goes through [`crate::traits::Output`]; this module
//! only configures `tracing` for diagnostics on stderr.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Map `-v` occurrences to a default filter directive
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "tfimport=info",
        2 => "tfimport=debug",
        _ => "tfimport=trace",
    }
}

/// Initialize tracing; `RUST_LOG` takes precedence over `-v`
pub fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));

    // A subscriber may already be installed (e.g. by a test harness)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .try_init();

    debug!("tfimport started with verbosity level: {}", verbose);
}
