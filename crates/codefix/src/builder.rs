use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use url::Url;

use crate::{
    client::DiagnoseClient,
    defaults::{default_backend_url, DEFAULT_FILENAME, DEFAULT_HTTP_TIMEOUT, DEFAULT_LANGUAGE},
    process::{CaptureOptions, StdoutMode},
    DiagnoseError,
};

#[derive(Debug, Clone)]
pub struct DiagnoseClientBuilder {
    pub(crate) backend_url: Option<String>,
    pub(crate) filename: String,
    pub(crate) language: String,
    pub(crate) http_timeout: Duration,
    pub(crate) command_timeout: Option<Duration>,
    pub(crate) working_dir: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) stdout: StdoutMode,
    pub(crate) echo_stderr: bool,
}

impl Default for DiagnoseClientBuilder {
    fn default() -> Self {
        Self {
            backend_url: None,
            filename: DEFAULT_FILENAME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            command_timeout: None,
            working_dir: None,
            env: BTreeMap::new(),
            stdout: StdoutMode::Inherit,
            echo_stderr: false,
        }
    }
}

impl DiagnoseClientBuilder {
    /// Endpoint to POST to. Falls back to `CODEFIX_BACKEND_URL`, then the loopback default.
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Kill the command if it runs longer than `timeout`. The diagnosis still goes out with
    /// whatever stderr was captured. Off by default.
    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stdout(mut self, mode: StdoutMode) -> Self {
        self.stdout = mode;
        self
    }

    pub fn echo_stderr(mut self, enabled: bool) -> Self {
        self.echo_stderr = enabled;
        self
    }

    pub fn build(self) -> Result<DiagnoseClient, DiagnoseError> {
        let raw_url = self.backend_url.unwrap_or_else(default_backend_url);
        let backend_url = parse_backend_url(&raw_url)?;

        let http = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("codefix/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| DiagnoseError::HttpClient { source })?;

        Ok(DiagnoseClient {
            http,
            backend_url,
            filename: self.filename,
            language: self.language,
            capture: CaptureOptions {
                working_dir: self.working_dir,
                env: self.env,
                stdout: self.stdout,
                timeout: self.command_timeout,
            },
            echo_stderr: self.echo_stderr,
        })
    }
}

pub(crate) fn parse_backend_url(raw: &str) -> Result<Url, DiagnoseError> {
    let invalid = |reason: String| DiagnoseError::InvalidBackendUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "scheme must be http or https, got `{}`",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
