#![forbid(unsafe_code)]

//! alpen: declarative reactivity for an attribute-annotated document tree.
//!
//! Markup declares component state with `x-data` and binds it with
//! directives (`x-text`, `x-show`, `x-bind`, `x-on`, `x-if`, `x-for`, ...).
//! The runtime walks the tree, hands each directive to its handler, batches
//! reactive re-runs through one scheduler and keeps keyed loops in sync with
//! minimal node moves.
//!
//! # Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | [`dom`] | Document tree, markup parsing, structural-change records |
//! | [`reactive`] | Reactive values, effects, scope chains |
//! | [`expr`] | Attribute expression language |
//! | [`runtime`] | Scheduler, tree initializer, directives, loop reconciliation |
//!
//! # Example
//!
//! ```
//! use alpen::prelude::*;
//!
//! let runtime = Runtime::new();
//! runtime
//!     .mount(r#"
//!         <ul x-data="{ todos: ['milk', 'eggs'] }">
//!             <template x-for="todo in todos" :key="todo"><li x-text="todo"></li></template>
//!         </ul>"#)
//!     .unwrap();
//! runtime.start();
//!
//! let list = runtime.document().query_tag(runtime.document().body(), "ul")[0];
//! runtime.evaluate(list, "todos.unshift('bread')").unwrap();
//! runtime.tick();
//!
//! let doc = runtime.document();
//! let items: Vec<String> = doc
//!     .element_children(list)
//!     .into_iter()
//!     .filter(|&n| doc.tag(n) == Some("li"))
//!     .map(|n| doc.text_content(n))
//!     .collect();
//! assert_eq!(items, ["bread", "milk", "eggs"]);
//! ```

pub use alpen_dom as dom;
pub use alpen_expr as expr;
pub use alpen_reactive as reactive;
pub use alpen_runtime as runtime;

pub use alpen_dom::{Document, NodeId};
pub use alpen_reactive::{Effect, ReactiveObject, Value};
pub use alpen_runtime::{
    Directive, DirectiveContext, DirectivePriority, Runtime, RuntimeConfig, RuntimeError,
};

/// Everything an embedding application usually needs.
pub mod prelude {
    pub use alpen_dom::{Document, NodeId};
    pub use alpen_reactive::{Effect, ReactiveObject, Value, untracked};
    pub use alpen_runtime::{
        Diagnostic, Directive, DirectiveContext, DirectivePriority, ErrorKind, LifecycleEvent,
        ListenerModifiers, Runtime, RuntimeConfig, RuntimeError, diagnostics,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    /// `x-shout`: upper-cased text content.
    struct Shout;

    impl Directive for Shout {
        fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
            let node = cx.node();
            let evaluation = cx.evaluate_later();
            cx.effect(move |runtime| {
                if let Some(text) = evaluation.run(|value| value.to_text().to_uppercase()) {
                    runtime.document_mut().set_text_content(node, text);
                }
            });
            Ok(())
        }
    }

    #[test]
    fn custom_directives_join_the_registry() {
        let runtime = Runtime::new();
        runtime.directive("shout", Shout);
        assert!(runtime.has_directive("shout"));

        let nodes = runtime
            .mount(r#"<p x-data="{ word: 'hey' }" x-shout="word"></p>"#)
            .unwrap();
        runtime.start();
        let p = nodes[0];
        assert_eq!(runtime.document().text_content(p), "HEY");

        runtime.evaluate(p, "word = 'bye'").unwrap();
        runtime.tick();
        assert_eq!(runtime.document().text_content(p), "BYE");
    }

    #[test]
    fn prelude_exposes_the_stack() {
        let runtime = Runtime::with_config(RuntimeConfig::default()).unwrap();
        assert!(!runtime.is_started());
        let value = Value::from("x");
        assert!(value.is_truthy());
        assert_eq!(ErrorKind::Scheduler.as_str(), "scheduler");
    }
}
