//! Shared output layer for text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: plain text for people and pipes, or stable JSON for tools.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format` / hidden `--json` flag
//! 2. `LIFTOFF_FORMAT` env var → `"text"` | `"json"`
//! 3. Default: [`OutputMode::Text`].
//!
//! Errors go to stderr, as `error: …` lines or as `{"error": {…}}`.

use clap::ValueEnum;
use liftoff_core::LiftoffError;
use serde::Serialize;
use std::io::{self, Write};

/// Render a left-aligned key/value line in text output.
pub fn text_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

/// The output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Plain text, one fact per line.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    match format_env.map(str::to_lowercase).as_deref() {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Text,
    }
}

/// Resolve the output mode from CLI flags and the environment.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    let env_val = std::env::var("LIFTOFF_FORMAT").ok();
    resolve_output_mode_inner(format_flag, json_flag, env_val.as_deref())
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2002", "manifest_invalid").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create an error with a suggestion and error code.
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }
}

impl From<&LiftoffError> for CliError {
    fn from(err: &LiftoffError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: err.hint().map(str::to_string),
            error_code: Some(err.code().code().to_string()),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode, the value is serialized with `serde_json`. In text mode,
/// `text_fn` writes the output.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => {
            text_fn(value, &mut out)?;
        }
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(mode, error, &mut out)?;
    Ok(())
}

fn write_error(mode: OutputMode, error: &CliError, out: &mut dyn Write) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut *out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Render a [`LiftoffError`] to stderr and hand it back as an `anyhow`
/// error so the command exits non-zero.
pub fn fail(mode: OutputMode, err: LiftoffError) -> anyhow::Error {
    if let Err(render_err) = render_error(mode, &CliError::from(&err)) {
        return render_err;
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_wins_over_json_and_env() {
        let mode = resolve_output_mode_inner(Some(OutputMode::Text), true, Some("json"));
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn json_flag_wins_over_env() {
        let mode = resolve_output_mode_inner(None, true, Some("text"));
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn format_env_is_case_insensitive() {
        let mode = resolve_output_mode_inner(None, false, Some("JSON"));
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn unknown_env_value_falls_back_to_text() {
        let mode = resolve_output_mode_inner(None, false, Some("fancy"));
        assert_eq!(mode, OutputMode::Text);
        assert_eq!(resolve_output_mode_inner(None, false, None), OutputMode::Text);
    }

    #[test]
    fn liftoff_errors_carry_code_and_hint() {
        let err = LiftoffError::UnknownModule("ghost".into());
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2001"));
        assert_eq!(cli.message, "unknown module 'ghost'");
        assert!(cli.suggestion.is_some());
    }

    #[test]
    fn json_errors_are_wrapped() {
        let err = CliError::with_details("boom", "try again", "manifest_invalid");
        let mut out = Vec::new();
        write_error(OutputMode::Json, &err, &mut out).expect("write");
        let json: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(json["error"]["message"], "boom");
        assert_eq!(json["error"]["error_code"], "manifest_invalid");
    }

    #[test]
    fn text_errors_include_suggestion() {
        let err = CliError::with_details("boom", "try again", "x");
        let mut out = Vec::new();
        write_error(OutputMode::Text, &err, &mut out).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("error: boom"));
        assert!(text.contains("suggestion: try again"));
    }
}
