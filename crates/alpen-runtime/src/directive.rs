#![forbid(unsafe_code)]

//! Directive handler interface.
//!
//! A [`Directive`] is registered under a kind (`text`, `for`, ...) and is
//! invoked once per (node, attribute) by the tree initializer. Handlers set
//! up whatever they need through a [`DirectiveContext`]: reactive effects,
//! listeners, child scopes.

use alpen_dom::NodeId;
use alpen_reactive::{Effect, ScopeId, Value};

use crate::binding::DirectiveBinding;
use crate::diagnostics;
use crate::error::RuntimeError;
use crate::runtime::Runtime;

/// Execution order of directives on one element. Lower runs first; ties keep
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirectivePriority {
    /// Creates the scope the other directives resolve against.
    Scope,
    Reference,
    /// Clones and removes subtrees.
    Structural,
    Presentational,
}

/// Behavior attached to one directive kind.
pub trait Directive {
    fn priority(&self) -> DirectivePriority {
        DirectivePriority::Presentational
    }

    /// Run during the tree walk instead of through the scheduler.
    ///
    /// Directives whose effect later directives depend on (scope creation,
    /// refs) need this.
    fn run_immediately(&self) -> bool {
        false
    }

    /// Set up the directive on `cx.node()`.
    ///
    /// # Errors
    ///
    /// Any error is reported to diagnostics; the walk continues.
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError>;
}

/// Everything a handler can reach while initializing.
pub struct DirectiveContext<'a> {
    runtime: &'a Runtime,
    node: NodeId,
    binding: &'a DirectiveBinding,
}

impl<'a> DirectiveContext<'a> {
    pub(crate) fn new(runtime: &'a Runtime, node: NodeId, binding: &'a DirectiveBinding) -> Self {
        Self {
            runtime,
            node,
            binding,
        }
    }

    #[must_use]
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn binding(&self) -> &'a DirectiveBinding {
        self.binding
    }

    #[must_use]
    pub fn expression(&self) -> &'a str {
        &self.binding.expression
    }

    /// Closest scope of the node at this moment.
    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.runtime.closest_scope(self.node)
    }

    /// Evaluate the directive's expression now.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Expression`] on a parse or evaluation failure.
    pub fn evaluate(&self) -> Result<Value, RuntimeError> {
        self.runtime.evaluate(self.node, self.expression())
    }

    /// Deferred evaluation of the directive's expression.
    #[must_use]
    pub fn evaluate_later(&self) -> Evaluation {
        self.runtime.evaluate_later(self.node, self.expression())
    }

    /// A scheduler-bound effect owned by the node's closest scope.
    ///
    /// Runs once now; later re-runs go through the scheduler.
    pub fn effect(&self, f: impl Fn(&Runtime) + 'static) -> Effect {
        self.runtime.effect(self.node, &self.binding.raw_name, f)
    }

    /// A [`RuntimeError::Directive`] carrying this binding.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Directive {
            node: self.node,
            directive: self.binding.raw_name.clone(),
            expression: self.binding.expression.clone(),
            message: message.into(),
        }
    }
}

/// An expression bound to a node, evaluated on demand against the node's
/// scope chain as it is at call time.
#[derive(Debug, Clone)]
pub struct Evaluation {
    runtime: crate::runtime::WeakRuntime,
    node: NodeId,
    expression: String,
}

impl Evaluation {
    pub(crate) fn new(runtime: crate::runtime::WeakRuntime, node: NodeId, expression: String) -> Self {
        Self {
            runtime,
            node,
            expression,
        }
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate and hand the value to `f`.
    ///
    /// Failures are reported to diagnostics and yield `None`, as does a
    /// dropped runtime.
    pub fn run<R>(&self, f: impl FnOnce(Value) -> R) -> Option<R> {
        let runtime = self.runtime.upgrade()?;
        match runtime.evaluate(self.node, &self.expression) {
            Ok(value) => Some(f(value)),
            Err(err) => {
                diagnostics::report(err);
                None
            }
        }
    }
}
