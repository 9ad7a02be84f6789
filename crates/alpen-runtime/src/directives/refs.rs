#![forbid(unsafe_code)]

use crate::directive::{Directive, DirectiveContext, DirectivePriority};
use crate::error::RuntimeError;

/// `x-ref="name"`: registers the element for [`crate::Runtime::ref_node`].
pub(crate) struct RefDirective;

impl Directive for RefDirective {
    fn priority(&self) -> DirectivePriority {
        DirectivePriority::Reference
    }

    fn run_immediately(&self) -> bool {
        true
    }

    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let name = cx.expression().trim();
        if name.is_empty() {
            return Err(cx.error("ref name is empty"));
        }
        cx.runtime().register_ref(cx.node(), name);
        Ok(())
    }
}
