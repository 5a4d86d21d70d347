#![forbid(unsafe_code)]
//! Run a command, capture its stderr, and ask a diagnosis backend what went wrong.
//!
//! The command's standard error is redirected into a uniquely named temporary file, read
//! back after the command exits (whatever its exit code), and POSTed as JSON to the
//! diagnosis endpoint. The capture file is removed on every path.
//!
//! ```rust,no_run
//! use codefix::{CommandSpec, DiagnoseClient};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DiagnoseClient::builder()
//!     .backend_url("http://localhost:8000/api/diagnose")
//!     .language("rust")
//!     .build()?;
//! let outcome = client.run(&CommandSpec::argv("cargo", ["build"])).await;
//! println!("{}", outcome.render());
//! # Ok(()) }
//! ```
//!
//! Commands are spawned from an explicit argument array unless [`CommandSpec::Shell`] is
//! chosen, which hands the line to `sh -c` (or `cmd /C` on Windows).

mod builder;
pub mod cli;
mod client;
mod command;
mod defaults;
mod error;
mod logging;
mod outcome;
mod process;
mod request;
mod response;

pub use builder::DiagnoseClientBuilder;
pub use client::{diagnose, DiagnoseClient};
pub use command::CommandSpec;
pub use defaults::{
    default_backend_url, BACKEND_URL_ENV, DEFAULT_BACKEND_URL, DEFAULT_FILENAME,
    DEFAULT_HTTP_TIMEOUT, DEFAULT_LANGUAGE,
};
pub use error::{DiagnoseError, ErrorKind};
pub use logging::init_logging;
pub use outcome::{DiagnosisOutcome, DiagnosisReport};
pub use process::{capture_stderr, CaptureOptions, CapturedRun, StdoutMode};
pub use request::DiagnosisRequest;
pub use response::{Diagnosis, StructuredDiagnosis};
