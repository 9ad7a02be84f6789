#![forbid(unsafe_code)]

//! Attribute expression language for alpen.
//!
//! A small script-like language: literals, array and object literals,
//! member/index access, method calls (with arrow-function arguments for the
//! array helpers), arithmetic, comparisons, logical operators, the
//! conditional operator, assignment and `;` sequences.
//!
//! ```
//! use alpen_expr::{Environment, Expression};
//! use alpen_reactive::{ReactiveObject, Value};
//!
//! struct Data(ReactiveObject);
//!
//! impl Environment for Data {
//!     fn lookup(&self, name: &str) -> Option<Value> {
//!         self.0.get(name)
//!     }
//!     fn assign(&self, name: &str, value: Value) -> bool {
//!         self.0.set(name, value);
//!         true
//!     }
//! }
//!
//! let data = Data(ReactiveObject::from_entries([("count", Value::from(1))]));
//! let expr = Expression::compile("count += 1").unwrap();
//! assert_eq!(expr.evaluate(&data).unwrap(), Value::from(2));
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::rc::Rc;

pub use error::{ExpressionError, ExpressionErrorKind};
pub use eval::{Environment, LocalEnvironment, binary, evaluate, loose_eq, strict_eq};

/// A parsed expression, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Expression {
    source: Rc<str>,
    ast: Rc<ast::Expr>,
}

impl Expression {
    /// Parse `source`.
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let ast = parser::parse(source).inspect_err(|_err| {
            #[cfg(feature = "tracing")]
            tracing::debug!(source, error = %_err, "expression failed to parse");
        })?;
        Ok(Self {
            source: Rc::from(source),
            ast: Rc::new(ast),
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn ast(&self) -> &ast::Expr {
        &self.ast
    }

    /// Evaluate against `env`.
    pub fn evaluate(&self, env: &dyn Environment) -> Result<alpen_reactive::Value, ExpressionError> {
        evaluate(&self.ast, env)
    }
}
