use std::io::{self, IsTerminal};

use tracing_subscriber::EnvFilter;

use crate::defaults::{log_filter_value, DEFAULT_LOG_FILTER};

/// Installs the stderr `fmt` subscriber. The filter comes from `RUST_LOG`, falling back to
/// `codefix=warn` when it is unset or unparsable. Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_new(log_filter_value())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
