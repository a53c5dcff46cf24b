//! Non-fatal problems found while reading JSONL.

use std::fmt;

/// A line that [`read_jsonl_resilient`](crate::read_jsonl_resilient) skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The line is not valid JSON, or does not match the target type.
    MalformedJson {
        /// The 1-based line number.
        line_number: usize,
        /// The parser's message.
        error: String,
    },

    /// The line is not valid UTF-8.
    InvalidUtf8 {
        /// The 1-based line number.
        line_number: usize,
    },
}

impl Warning {
    /// Returns the 1-based line number the warning refers to.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self {
            Self::MalformedJson { line_number, .. } | Self::InvalidUtf8 { line_number } => {
                *line_number
            }
        }
    }

    /// Short machine-friendly name of the warning kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedJson { .. } => "malformed_json",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed JSON: {error}")
            }
            Self::InvalidUtf8 { line_number } => write!(f, "line {line_number}: invalid UTF-8"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_number() {
        let warning = Warning::MalformedJson {
            line_number: 7,
            error: "expected value".to_string(),
        };
        assert_eq!(warning.line_number(), 7);
        assert_eq!(warning.kind(), "malformed_json");
        assert!(warning.to_string().contains("line 7"));
    }
}
