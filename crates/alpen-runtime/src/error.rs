#![forbid(unsafe_code)]

//! Runtime error types.
//!
//! Nothing in the runtime returns these to the embedding application as a
//! hard failure: handlers return them, the tree walk and the scheduler catch
//! them, and [`crate::diagnostics::report`] records them.

use std::fmt;

use alpen_dom::{DomError, NodeId};
use alpen_expr::ExpressionError;

use crate::scheduler::TaskId;

/// Coarse classification of a [`RuntimeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Expression,
    Directive,
    Reconciliation,
    Scheduler,
    Dom,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expression => "expression",
            Self::Directive => "directive",
            Self::Reconciliation => "reconciliation",
            Self::Scheduler => "scheduler",
            Self::Dom => "dom",
        }
    }
}

/// Loop bookkeeping violations. Both degrade gracefully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    /// Two items of one evaluation produced the same key; the first wins.
    DuplicateKey { node: NodeId, key: String },
    /// A row matched by key had already been disposed or detached; it is
    /// recreated.
    DisposedEntry { node: NodeId, key: String },
}

impl fmt::Display for ReconciliationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { node, key } => {
                write!(f, "duplicate loop key {key:?} on {node}; later rows skipped")
            }
            Self::DisposedEntry { node, key } => {
                write!(f, "loop row {key:?} on {node} was disposed before reuse")
            }
        }
    }
}

impl std::error::Error for ReconciliationError {}

/// Any failure the runtime reports.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// An expression failed to parse or evaluate.
    Expression {
        node: NodeId,
        expression: String,
        source: ExpressionError,
    },
    /// A directive handler rejected its input.
    Directive {
        node: NodeId,
        directive: String,
        expression: String,
        message: String,
    },
    Reconciliation(ReconciliationError),
    /// A scheduled task panicked; the flush carried on.
    TaskPanicked {
        task: TaskId,
        label: String,
        message: String,
    },
    /// A task re-queued itself too often within one flush and was dropped.
    FlushLimit {
        task: TaskId,
        label: String,
        runs: u32,
    },
    Dom(DomError),
}

impl RuntimeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Expression { .. } => ErrorKind::Expression,
            Self::Directive { .. } => ErrorKind::Directive,
            Self::Reconciliation(_) => ErrorKind::Reconciliation,
            Self::TaskPanicked { .. } | Self::FlushLimit { .. } => ErrorKind::Scheduler,
            Self::Dom(_) => ErrorKind::Dom,
        }
    }

    /// Node the error is attached to, when known.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Expression { node, .. } | Self::Directive { node, .. } => Some(*node),
            Self::Reconciliation(
                ReconciliationError::DuplicateKey { node, .. }
                | ReconciliationError::DisposedEntry { node, .. },
            ) => Some(*node),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression {
                node,
                expression,
                source,
            } => write!(f, "{source} in `{expression}` on {node}"),
            Self::Directive {
                node,
                directive,
                expression,
                message,
            } => write!(f, "{directive}=\"{expression}\" on {node}: {message}"),
            Self::Reconciliation(err) => err.fmt(f),
            Self::TaskPanicked {
                task,
                label,
                message,
            } => write!(f, "task {task} ({label}) panicked: {message}"),
            Self::FlushLimit { task, label, runs } => write!(
                f,
                "task {task} ({label}) re-queued {runs} times in one flush; dropped"
            ),
            Self::Dom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Expression { source, .. } => Some(source),
            Self::Reconciliation(err) => Some(err),
            Self::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for RuntimeError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

impl From<ReconciliationError> for RuntimeError {
    fn from(err: ReconciliationError) -> Self {
        Self::Reconciliation(err)
    }
}
