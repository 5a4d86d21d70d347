use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Flat classification of everything that can stop a diagnosis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command or its interpreter could not be launched or awaited.
    Execution,
    /// The stderr capture file could not be created or read.
    CaptureRead,
    /// The request never produced a response (DNS, refused, timeout).
    Network,
    /// The backend answered with a failure status or an unusable body.
    Backend,
    /// The invocation itself was unusable (empty command, bad URL).
    Usage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Execution => "execution",
            ErrorKind::CaptureRead => "capture",
            ErrorKind::Network => "network",
            ErrorKind::Backend => "backend",
            ErrorKind::Usage => "usage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that may occur while running a command and asking the backend about it.
#[derive(Debug, Error)]
pub enum DiagnoseError {
    #[error("command must not be empty")]
    EmptyCommand,
    #[error("backend URL `{url}` is invalid: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {source}")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },
    #[error("`{program}` could not be spawned: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create stderr capture file: {source}")]
    CaptureFile {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read stderr capture file `{path}`: {source}")]
    CaptureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to `{url}` failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status}: {detail}")]
    BackendStatus {
        status: reqwest::StatusCode,
        detail: String,
    },
    #[error("backend response is malformed: {reason}")]
    MalformedResponse { reason: String, body: String },
}

impl DiagnoseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiagnoseError::Spawn { .. } | DiagnoseError::Wait { .. } => ErrorKind::Execution,
            DiagnoseError::CaptureFile { .. } | DiagnoseError::CaptureRead { .. } => {
                ErrorKind::CaptureRead
            }
            DiagnoseError::Network { .. } => ErrorKind::Network,
            DiagnoseError::BackendStatus { .. } | DiagnoseError::MalformedResponse { .. } => {
                ErrorKind::Backend
            }
            DiagnoseError::EmptyCommand
            | DiagnoseError::InvalidBackendUrl { .. }
            | DiagnoseError::HttpClient { .. } => ErrorKind::Usage,
        }
    }
}
