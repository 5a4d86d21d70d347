use std::{env, time::Duration};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/api/diagnose";
pub const DEFAULT_FILENAME: &str = "last-run.out";
pub const DEFAULT_LANGUAGE: &str = "bash";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub const BACKEND_URL_ENV: &str = "CODEFIX_BACKEND_URL";
pub(crate) const RUST_LOG_ENV: &str = "RUST_LOG";
pub(crate) const DEFAULT_LOG_FILTER: &str = "codefix=warn";

pub(crate) const MODE_QUICK: &str = "quick";
pub(crate) const PERSONA_EXPERT: &str = "expert";

pub(crate) const CAPTURE_PREFIX: &str = "codefix-stderr-";
pub(crate) const CAPTURE_SUFFIX: &str = ".out";

/// Longest slice of a non-JSON error body carried into an error message.
pub(crate) const ERROR_BODY_LIMIT: usize = 512;

/// `CODEFIX_BACKEND_URL` when set and non-blank, otherwise the loopback default.
pub fn default_backend_url() -> String {
    env::var(BACKEND_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

pub(crate) fn log_filter_value() -> String {
    env::var(RUST_LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}
