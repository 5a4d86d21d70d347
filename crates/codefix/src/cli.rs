use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use tracing::info;

use crate::{
    defaults::{
        BACKEND_URL_ENV, DEFAULT_BACKEND_URL, DEFAULT_FILENAME, DEFAULT_HTTP_TIMEOUT,
        DEFAULT_LANGUAGE,
    },
    CommandSpec, DiagnoseClient, DiagnoseError, DiagnosisOutcome, StdoutMode,
};

/// Run a command, capture its stderr, and print what the diagnosis backend makes of it.
#[derive(Debug, Parser)]
#[command(name = "codefix", version)]
pub struct Cli {
    /// Run COMMAND through the platform shell (`sh -c` / `cmd /C`) so pipes, globs and
    /// redirections work. Without it the first word is executed directly.
    #[arg(long, default_value_t = false)]
    pub shell: bool,

    /// Diagnosis endpoint.
    #[arg(long, value_name = "URL", env = BACKEND_URL_ENV, default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Label for the artifact being diagnosed.
    #[arg(long, default_value = DEFAULT_FILENAME)]
    pub filename: String,

    /// Source language of the failing code.
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,

    /// Seconds to wait for the backend.
    #[arg(
        long = "timeout",
        value_name = "SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Kill COMMAND after this many seconds and diagnose what it printed so far.
    #[arg(
        long = "command-timeout",
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub command_timeout_secs: Option<u64>,

    /// Working directory for COMMAND.
    #[arg(long = "cwd", short = 'C', value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Discard COMMAND's stdout instead of passing it through.
    #[arg(long, short = 'q', default_value_t = false)]
    pub quiet: bool,

    /// Print the captured stderr before the diagnosis.
    #[arg(long, default_value_t = false)]
    pub echo_stderr: bool,

    /// Print the diagnosis as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Command to run.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    pub fn command_spec(&self) -> Result<CommandSpec, DiagnoseError> {
        CommandSpec::from_words(&self.command, self.shell)
    }

    pub fn client(&self) -> Result<DiagnoseClient, DiagnoseError> {
        let mut builder = DiagnoseClient::builder()
            .backend_url(self.backend_url.clone())
            .filename(self.filename.clone())
            .language(self.language.clone())
            .http_timeout(Duration::from_secs(self.timeout_secs))
            .command_timeout(self.command_timeout_secs.map(Duration::from_secs))
            .stdout(if self.quiet {
                StdoutMode::Discard
            } else {
                StdoutMode::Inherit
            })
            .echo_stderr(self.echo_stderr);
        if let Some(dir) = self.cwd.as_ref() {
            builder = builder.working_dir(dir);
        }
        builder.build()
    }

    pub async fn execute(&self) -> DiagnosisOutcome {
        let prepared = self
            .command_spec()
            .and_then(|spec| Ok((spec, self.client()?)));
        match prepared {
            Ok((spec, client)) => {
                info!(command = %spec, backend = %client.backend_url(), "diagnosing command");
                client.run(&spec).await
            }
            Err(err) => DiagnosisOutcome::Failed(err),
        }
    }

    /// Text for the console and whether it belongs on stdout.
    pub fn format_outcome(&self, outcome: &DiagnosisOutcome) -> (bool, String) {
        match outcome.diagnosis() {
            Some(diagnosis) if self.json => {
                let text = serde_json::to_string_pretty(&serde_json::json!({
                    "diagnosis": diagnosis.to_json()
                }))
                .unwrap_or_else(|_| diagnosis.to_string());
                (true, text)
            }
            Some(_) => (true, outcome.render()),
            None => (false, outcome.render()),
        }
    }

    pub fn report(&self, outcome: &DiagnosisOutcome) -> ExitCode {
        let (to_stdout, text) = self.format_outcome(outcome);
        if to_stdout {
            println!("{text}");
            ExitCode::SUCCESS
        } else {
            eprintln!("{text}");
            ExitCode::FAILURE
        }
    }
}
