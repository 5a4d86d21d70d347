use std::io::{self, Write};

use tracing::{debug, warn};
use url::Url;

use crate::{
    builder::DiagnoseClientBuilder,
    process::{self, CaptureOptions, CapturedRun},
    response::{error_detail, Diagnosis},
    CommandSpec, DiagnoseError, DiagnosisOutcome, DiagnosisReport, DiagnosisRequest,
};

#[derive(Debug, Clone)]
pub struct DiagnoseClient {
    pub(crate) http: reqwest::Client,
    pub(crate) backend_url: Url,
    pub(crate) filename: String,
    pub(crate) language: String,
    pub(crate) capture: CaptureOptions,
    pub(crate) echo_stderr: bool,
}

impl DiagnoseClient {
    pub fn builder() -> DiagnoseClientBuilder {
        DiagnoseClientBuilder::default()
    }

    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Runs the command and returns its captured stderr.
    pub async fn capture(&self, spec: &CommandSpec) -> Result<CapturedRun, DiagnoseError> {
        let run = process::capture_stderr(spec, &self.capture).await?;
        if self.echo_stderr && !run.stderr.is_empty() {
            let mut out = io::stderr().lock();
            if let Err(err) = out.write_all(run.stderr.as_bytes()).and_then(|_| out.flush()) {
                warn!(error = %err, "failed to echo captured stderr");
            }
        }
        Ok(run)
    }

    pub fn request_for(&self, run: &CapturedRun) -> DiagnosisRequest {
        DiagnosisRequest::new(run.stderr.clone())
            .filename(self.filename.clone())
            .language(self.language.clone())
    }

    /// Sends one request to the backend and extracts its `diagnosis`.
    pub async fn submit(&self, request: &DiagnosisRequest) -> Result<Diagnosis, DiagnoseError> {
        let network = |source| DiagnoseError::Network {
            url: self.backend_url.to_string(),
            source,
        };

        debug!(
            url = %self.backend_url,
            stderr_bytes = request.stderr().len(),
            "posting diagnosis request"
        );
        let response = self
            .http
            .post(self.backend_url.clone())
            .json(request)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let body = response.bytes().await;

        if !status.is_success() {
            let detail = match &body {
                Ok(bytes) => error_detail(&String::from_utf8_lossy(bytes)),
                Err(err) => format!("<unreadable body: {err}>"),
            };
            return Err(DiagnoseError::BackendStatus { status, detail });
        }

        let body = body.map_err(network)?;
        debug!(%status, body_bytes = body.len(), "backend responded");

        Diagnosis::from_response_body(&body)
    }

    /// Runs `spec`, then asks the backend about what it wrote to stderr.
    pub async fn diagnose(&self, spec: &CommandSpec) -> Result<DiagnosisReport, DiagnoseError> {
        let run = self.capture(spec).await?;
        if !run.success() {
            debug!(command = %spec, exit_code = ?run.exit_code(), "command failed");
        }
        let request = self.request_for(&run);
        let diagnosis = self.submit(&request).await?;
        Ok(DiagnosisReport { run, diagnosis })
    }

    /// Like [`DiagnoseClient::diagnose`], but every failure is folded into the outcome.
    pub async fn run(&self, spec: &CommandSpec) -> DiagnosisOutcome {
        match self.diagnose(spec).await {
            Ok(report) => DiagnosisOutcome::Diagnosed(report),
            Err(err) => {
                debug!(kind = %err.kind(), error = %err, "diagnosis failed");
                DiagnosisOutcome::Failed(err)
            }
        }
    }
}

/// One-shot diagnosis with the given endpoint and labels and otherwise default settings.
pub async fn diagnose(
    spec: &CommandSpec,
    backend_url: &str,
    filename: &str,
    language: &str,
) -> Result<DiagnosisReport, DiagnoseError> {
    DiagnoseClient::builder()
        .backend_url(backend_url)
        .filename(filename)
        .language(language)
        .build()?
        .diagnose(spec)
        .await
}
