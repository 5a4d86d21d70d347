use serde::Serialize;

use crate::defaults::{DEFAULT_FILENAME, DEFAULT_LANGUAGE, MODE_QUICK, PERSONA_EXPERT};

/// Body POSTed to the diagnosis endpoint.
///
/// The backend expects exactly these six string keys. `code` is always empty and `mode` /
/// `persona` are fixed, so only the labels and the captured stderr vary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisRequest {
    filename: String,
    language: String,
    code: String,
    stderr: String,
    mode: &'static str,
    persona: &'static str,
}

impl DiagnosisRequest {
    pub fn new(stderr: impl Into<String>) -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            code: String::new(),
            stderr: stderr.into(),
            mode: MODE_QUICK,
            persona: PERSONA_EXPERT,
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}
