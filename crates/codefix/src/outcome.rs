use crate::{CapturedRun, DiagnoseError, Diagnosis};

#[derive(Debug, Clone)]
pub struct DiagnosisReport {
    pub run: CapturedRun,
    pub diagnosis: Diagnosis,
}

/// Final result of a run: either a diagnosis or the single error that stopped it.
#[derive(Debug)]
pub enum DiagnosisOutcome {
    Diagnosed(DiagnosisReport),
    Failed(DiagnoseError),
}

impl DiagnosisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DiagnosisOutcome::Diagnosed(_))
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            DiagnosisOutcome::Diagnosed(report) => Some(&report.diagnosis),
            DiagnosisOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DiagnoseError> {
        match self {
            DiagnosisOutcome::Diagnosed(_) => None,
            DiagnosisOutcome::Failed(err) => Some(err),
        }
    }

    /// Labeled console message for this outcome.
    pub fn render(&self) -> String {
        match self {
            DiagnosisOutcome::Diagnosed(report) => format!("Diagnosis:\n{}", report.diagnosis),
            DiagnosisOutcome::Failed(err) => format!("Error ({}): {}", err.kind(), render_chain(err)),
        }
    }
}

fn render_chain(err: &DiagnoseError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
