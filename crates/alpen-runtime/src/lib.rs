#![forbid(unsafe_code)]

//! Directive runtime for alpen.
//!
//! This crate provides:
//! - [`Scheduler`]: deduplicating effect queue flushed to a fixed point
//! - [`Runtime`]: document, scopes, directive registry, tree initialization,
//!   live observation of structural changes, event dispatch
//! - [`loops`]: keyed loop reconciliation behind `x-for`
//! - [`diagnostics`]: where every caught error is reported
//!
//! # Example
//!
//! ```
//! use alpen_runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! runtime
//!     .mount(r#"<div x-data="{ n: 1 }"><button @click="n++"></button><span x-text="n"></span></div>"#)
//!     .unwrap();
//! runtime.start();
//!
//! let body = runtime.document().body();
//! let button = runtime.document().query_tag(body, "button")[0];
//! let span = runtime.document().query_tag(body, "span")[0];
//! assert_eq!(runtime.document().text_content(span), "1");
//!
//! runtime.dispatch(button, "click");
//! assert_eq!(runtime.document().text_content(span), "2");
//! ```

pub mod binding;
pub mod config;
pub mod diagnostics;
pub mod directive;
mod directives;
pub mod error;
mod init;
pub mod lifecycle;
pub mod loops;
pub mod runtime;
pub mod scheduler;

pub use binding::{DirectiveBinding, directive_bindings};
pub use config::{ConfigError, RuntimeConfig};
pub use diagnostics::{Diagnostic, DiagnosticSubscription};
pub use directive::{Directive, DirectiveContext, DirectivePriority, Evaluation};
pub use error::{ErrorKind, ReconciliationError, RuntimeError};
pub use lifecycle::{LifecycleEvent, LifecycleSubscription};
pub use loops::{IterationError, LoopEntry, LoopExpression, ReconcileStats};
pub use runtime::{ListenerModifiers, Runtime, WeakRuntime};
pub use scheduler::{Scheduler, SchedulerStats, Task, TaskId};
