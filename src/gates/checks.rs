//! Artifact-check primitives shared by the phase validators.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Structured-document parsing capability injected into the gates.
///
/// When `available()` is false the YAML content checks degrade to size
/// thresholds instead of failing outright; a missing parser must reduce
/// precision, never block a phase.
pub trait DocParser {
    fn available(&self) -> bool;

    /// Parses YAML text into a JSON value tree. The error string ends up
    /// verbatim inside a defect message.
    fn parse_yaml(&self, text: &str) -> Result<serde_json::Value, String>;
}

/// The full-precision parser.
#[derive(Debug, Default)]
pub struct SerdeDocParser;

impl DocParser for SerdeDocParser {
    fn available(&self) -> bool {
        true
    }

    fn parse_yaml(&self, text: &str) -> Result<serde_json::Value, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }
}

/// Parser stub selected when YAML checks are turned off in config.
#[derive(Debug, Default)]
pub struct DisabledParser;

impl DocParser for DisabledParser {
    fn available(&self) -> bool {
        false
    }

    fn parse_yaml(&self, _text: &str) -> Result<serde_json::Value, String> {
        Err("YAML parsing is disabled".to_string())
    }
}

/// True when the file exists and its size is below `min_bytes`. Stat
/// failures on an existing path bubble up as faults.
pub fn file_smaller_than(path: &Path, min_bytes: u64) -> Result<bool> {
    let meta = fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(meta.len() < min_bytes)
}

/// Reads and parses a JSON artifact. Read failures are faults (outer
/// error); decode failures are returned inner so the caller can emit its
/// artifact-specific defect.
pub fn read_json(
    path: &Path,
) -> Result<std::result::Result<serde_json::Value, serde_json::Error>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&raw))
}

/// True when the glob pattern, joined under `base`, matches at least one
/// readable path.
pub fn glob_matches(base: &Path, pattern: &str) -> Result<bool> {
    let full = base.join(pattern);
    let pattern = full.to_string_lossy();
    let mut paths = glob::glob(&pattern)
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?
        .filter_map(|p| p.ok());
    Ok(paths.next().is_some())
}

/// JSON value truthiness as the artifact conventions assume: null, false,
/// zero, and empty string/array/object all count as absent content.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// Renders a JSON value for a defect message: strings bare, everything
/// else as compact JSON.
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
