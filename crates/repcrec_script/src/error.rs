//! Error types for script handling.

use repcrec_core::CoreError;
use std::io;
use thiserror::Error;

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised while reading or running a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A single instruction could not be parsed.
    #[error("invalid instruction `{text}`: {reason}")]
    InvalidInstruction {
        /// The offending instruction text.
        text: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An instruction on a given script line could not be parsed.
    #[error("line {line}: invalid instruction `{text}`: {reason}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// The offending instruction text.
        text: String,
        /// What is wrong with it.
        reason: String,
    },

    /// I/O error while reading the script.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine rejected the setup.
    #[error("engine error: {0}")]
    Core(#[from] CoreError),
}

impl ScriptError {
    /// Creates an invalid-instruction error.
    pub fn invalid(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInstruction {
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Attaches a line number to an invalid-instruction error.
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::InvalidInstruction { text, reason } => Self::Syntax { line, text, reason },
            other => other,
        }
    }

    /// Returns true for parse errors, which skip a line but do not stop a run.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::InvalidInstruction { .. } | Self::Syntax { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_line_adds_location() {
        let err = ScriptError::invalid("R(T1)", "expected 2 arguments").at_line(4);
        assert_eq!(
            err.to_string(),
            "line 4: invalid instruction `R(T1)`: expected 2 arguments"
        );
        assert!(err.is_syntax());
    }

    #[test]
    fn io_errors_are_not_syntax() {
        let err = ScriptError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(!err.is_syntax());
        assert!(!err.at_line(1).is_syntax());
    }
}
