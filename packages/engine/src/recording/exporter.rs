// packages/engine/src/recording/exporter.rs
//! Export call logs
//!
//! Supports:
//! - JSON (for tooling, snapshot assertions)
//! - Text (one line per call, for failure messages)

use crate::recording::call_log::RecordedCall;
use crate::utils::errors::{EngineError, Result};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::debug;

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON format
    Json,

    /// Human-readable text, one call per line
    Text,
}

/// Exporter for call logs
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    /// Create a new exporter
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// Export calls of `method` to a string
    pub fn export(&self, method: &str, calls: &[RecordedCall]) -> Result<String> {
        debug!("Exporting {} calls of '{}' to {:?} format", calls.len(), method, self.format);

        match self.format {
            ExportFormat::Json => self.export_json(method, calls),
            ExportFormat::Text => Ok(self.export_text(method, calls)),
        }
    }

    fn export_json(&self, method: &str, calls: &[RecordedCall]) -> Result<String> {
        let document = CallLogDocument {
            method,
            calls: calls.iter().map(ExportedCall::from).collect(),
        };

        serde_json::to_string_pretty(&document).map_err(|e| {
            EngineError::ExportFailed(format!("JSON serialization error: {}", e))
        })
    }

    fn export_text(&self, method: &str, calls: &[RecordedCall]) -> String {
        let mut out = String::new();
        for call in calls {
            let result = call
                .result()
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "#{} {}.{}({}) -> {} at {}",
                call.sequence(),
                call.receiver(),
                method,
                call.args(),
                result,
                call.call_site()
            );
        }
        out
    }
}

#[derive(Serialize)]
struct CallLogDocument<'a> {
    method: &'a str,
    calls: Vec<ExportedCall>,
}

#[derive(Serialize)]
struct ExportedCall {
    sequence: u64,
    receiver: serde_json::Value,
    args: Vec<serde_json::Value>,
    keywords: serde_json::Map<String, serde_json::Value>,
    has_callback: bool,
    result: Option<serde_json::Value>,
    call_site: String,
    recorded_at: String,
}

impl From<&RecordedCall> for ExportedCall {
    fn from(call: &RecordedCall) -> Self {
        Self {
            sequence: call.sequence(),
            receiver: call.receiver().to_json(),
            args: call.args().positional.iter().map(|v| v.to_json()).collect(),
            keywords: call
                .args()
                .keywords
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
            has_callback: call.callback().is_some(),
            result: call.result().map(|v| v.to_json()),
            call_site: call.call_site().to_string(),
            recorded_at: call.recorded_at().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::runtime::method::CallSite;
    use crate::runtime::value::Value;

    fn sample_calls() -> Vec<RecordedCall> {
        vec![
            RecordedCall::new(
                1,
                Value::from("pen"),
                CallSite::unknown(),
                args!["x"].with_keyword("ink", "blue"),
                None,
                Some(Value::from("hello")),
            ),
            RecordedCall::new(2, Value::from("pen"), CallSite::unknown(), args![], None, None),
        ]
    }

    #[test]
    fn test_export_json() {
        let exporter = Exporter::new(ExportFormat::Json);
        let json = exporter.export("write", &sample_calls()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["method"], "write");
        assert_eq!(parsed["calls"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["calls"][0]["args"][0], "x");
        assert_eq!(parsed["calls"][0]["keywords"]["ink"], "blue");
        assert_eq!(parsed["calls"][0]["result"], "hello");
        assert!(parsed["calls"][1]["result"].is_null());
    }

    #[test]
    fn test_export_text() {
        let exporter = Exporter::new(ExportFormat::Text);
        let text = exporter.export("write", &sample_calls()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#1 \"pen\".write(\"x\", ink: \"blue\") -> \"hello\""));
        assert!(lines[1].contains("-> -"));
    }
}
