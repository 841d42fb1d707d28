use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

/// Grid is smaller than 1x1 or does not fit in `u32`.
pub const E_GRID_DIMENSIONS: &str = "E_GRID_DIMENSIONS";
/// Scene YAML is malformed or has unknown keys.
pub const E_SCENE_PARSE: &str = "E_SCENE_PARSE";
pub const E_SCENE_READ: &str = "E_SCENE_READ";
/// Output extension or image size is not supported.
pub const E_EXPORT_FORMAT: &str = "E_EXPORT_FORMAT";
/// Fallback code for errors raised without one.
pub const E_INTERNAL: &str = "E_INTERNAL";

/// Decides the process exit status; `Usage` maps to 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    Config,
    Io,
    Usage,
}

/// A failure with a stable code. Lives inside an `anyhow::Error` chain and
/// is recovered with [`find_coded_error`] after any amount of `.context()`.
#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    fn with_kind(kind: CodedErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind,
        }
    }

    pub fn config(code: &'static str, message: impl Into<String>) -> Self {
        Self::with_kind(CodedErrorKind::Config, code, message)
    }

    pub fn io(code: &'static str, message: impl Into<String>) -> Self {
        Self::with_kind(CodedErrorKind::Io, code, message)
    }

    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self::with_kind(CodedErrorKind::Usage, code, message)
    }

    /// Attaches machine-readable context, e.g. a YAML line and column.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::failure(self.code, self.message.clone(), self.details.clone())
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

/// The `--json` failure document: `{ "ok": false, "error": { ... } }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

impl ErrorEnvelope {
    fn failure(code: &str, message: String, details: Option<Value>) -> Self {
        Self {
            ok: false,
            error: ErrorEnvelopeBody {
                code: code.to_owned(),
                message,
                details,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// First [`CodedError`] in the cause chain, outermost context first.
pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

/// Envelope for any error; uncoded failures carry [`E_INTERNAL`] and the
/// full context chain as their message.
pub fn envelope_for(error: &Error) -> ErrorEnvelope {
    find_coded_error(error).map_or_else(
        || ErrorEnvelope::failure(E_INTERNAL, format!("{error:#}"), None),
        CodedError::envelope,
    )
}
