use std::fmt;

use serde_json::{Map, Value};

use crate::{defaults::ERROR_BODY_LIMIT, DiagnoseError};

const KNOWN_KEYS: [&str; 4] = ["summary", "root_cause", "fix", "patch"];

/// The `diagnosis` field of a backend response.
///
/// Backends answer either with plain text or with an object carrying `summary`,
/// `root_cause`, `fix` and `patch`.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    Text(String),
    Structured(StructuredDiagnosis),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredDiagnosis {
    pub summary: String,
    pub root_cause: String,
    pub fix: String,
    pub patch: String,
    /// Keys the client does not know about, kept as sent.
    pub extra: Map<String, Value>,
    raw: Map<String, Value>,
}

impl StructuredDiagnosis {
    fn from_map(raw: Map<String, Value>) -> Self {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let extra = raw
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            summary: text("summary"),
            root_cause: text("root_cause"),
            fix: text("fix"),
            patch: text("patch"),
            extra,
            raw,
        }
    }

    fn sections(&self) -> Vec<(&'static str, &str)> {
        [
            ("Summary", self.summary.as_str()),
            ("Root cause", self.root_cause.as_str()),
            ("Fix", self.fix.as_str()),
            ("Patch", self.patch.as_str()),
        ]
        .into_iter()
        .filter(|(_, body)| !body.trim().is_empty())
        .collect()
    }
}

impl Diagnosis {
    /// Extracts `diagnosis` from a successful response body.
    pub(crate) fn from_response_body(body: &[u8]) -> Result<Self, DiagnoseError> {
        let malformed = |reason: String| DiagnoseError::MalformedResponse {
            reason,
            body: truncate(&String::from_utf8_lossy(body)),
        };

        let value: Value = serde_json::from_slice(body)
            .map_err(|err| malformed(format!("body is not JSON: {err}")))?;
        let Value::Object(mut object) = value else {
            return Err(malformed("body is not a JSON object".to_string()));
        };

        match object.remove("diagnosis") {
            Some(Value::String(text)) => Ok(Diagnosis::Text(text)),
            Some(Value::Object(map)) => Ok(Diagnosis::Structured(StructuredDiagnosis::from_map(
                map,
            ))),
            Some(other) => Err(malformed(format!(
                "`diagnosis` must be a string or an object, got {}",
                json_type(&other)
            ))),
            None => Err(malformed("missing `diagnosis` field".to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Diagnosis::Text(text) => Value::String(text.clone()),
            Diagnosis::Structured(s) => Value::Object(s.raw.clone()),
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Text(text) => f.write_str(text),
            Diagnosis::Structured(s) => {
                let sections = s.sections();
                if sections.is_empty() {
                    let raw = serde_json::to_string_pretty(&s.raw).map_err(|_| fmt::Error)?;
                    return f.write_str(&raw);
                }
                for (idx, (label, body)) in sections.into_iter().enumerate() {
                    if idx > 0 {
                        f.write_str("\n\n")?;
                    }
                    write!(f, "{label}:\n{}", body.trim_end())?;
                }
                Ok(())
            }
        }
    }
}

/// Human-readable reason from a non-success response body. FastAPI reports failures as
/// `{"detail": ...}`; anything else is passed through, truncated.
pub(crate) fn error_detail(body: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        match object.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "<empty body>".to_string()
    } else {
        truncate(trimmed)
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= ERROR_BODY_LIMIT {
        return text.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
