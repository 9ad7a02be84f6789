#![forbid(unsafe_code)]

use alpen_reactive::{ReactiveObject, Value, untracked};

use crate::directive::{Directive, DirectiveContext, DirectivePriority};
use crate::error::RuntimeError;

/// `x-data`: opens a component scope on the element.
///
/// The expression is evaluated once, untracked, against the enclosing scope
/// and must produce an object. An empty expression means `{}`.
pub(crate) struct DataDirective;

impl Directive for DataDirective {
    fn priority(&self) -> DirectivePriority {
        DirectivePriority::Scope
    }

    fn run_immediately(&self) -> bool {
        true
    }

    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let runtime = cx.runtime();
        let node = cx.node();
        let parent = runtime.closest_scope(node);
        let source = cx.expression().trim();

        let data = if source.is_empty() {
            ReactiveObject::new()
        } else {
            match untracked(|| runtime.evaluate_with(node, parent, source, &[]))? {
                Value::Object(object) => object,
                other => {
                    return Err(cx.error(format!("expected an object, got {}", other.type_name())));
                }
            }
        };

        let scope = runtime.create_scope(parent, node, data);
        tracing::trace!(node = %node, scope = %scope, parent = %parent, "component scope");
        Ok(())
    }
}
