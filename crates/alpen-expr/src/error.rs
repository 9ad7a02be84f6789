#![forbid(unsafe_code)]

//! Expression failures.

use std::fmt;

/// Category of an [`ExpressionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionErrorKind {
    /// The source text does not parse.
    Syntax,
    /// An identifier resolved to nothing.
    Reference,
    /// An operation was applied to a value of the wrong type.
    Type,
    /// The left-hand side cannot be written.
    Assignment,
}

impl ExpressionErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Reference => "reference",
            Self::Type => "type",
            Self::Assignment => "assignment",
        }
    }
}

/// A parse or evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionError {
    pub kind: ExpressionErrorKind,
    pub message: String,
    /// Byte offset into the source, known for syntax errors.
    pub position: Option<usize>,
}

impl ExpressionError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self {
            kind: ExpressionErrorKind::Syntax,
            message: message.into(),
            position: Some(position),
        }
    }

    pub(crate) fn reference(name: &str) -> Self {
        Self {
            kind: ExpressionErrorKind::Reference,
            message: format!("{name} is not defined"),
            position: None,
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: ExpressionErrorKind::Type,
            message: message.into(),
            position: None,
        }
    }

    pub(crate) fn assignment(message: impl Into<String>) -> Self {
        Self {
            kind: ExpressionErrorKind::Assignment,
            message: message.into(),
            position: None,
        }
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} error at {pos}: {}", self.kind.as_str(), self.message),
            None => write!(f, "{} error: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for ExpressionError {}
