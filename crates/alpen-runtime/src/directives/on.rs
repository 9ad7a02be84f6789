#![forbid(unsafe_code)]

use crate::directive::{Directive, DirectiveContext};
use crate::error::RuntimeError;
use crate::runtime::ListenerModifiers;

/// `x-on:<event>` / `@<event>`: attaches a listener whose handler is
/// evaluated when the event fires.
pub(crate) struct OnDirective;

impl Directive for OnDirective {
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let binding = cx.binding();
        let Some(event) = binding.value.as_deref() else {
            return Err(cx.error("missing event name"));
        };
        let modifiers = ListenerModifiers::from_names(&binding.modifiers);
        cx.runtime()
            .listen(cx.node(), event, modifiers, cx.expression());
        Ok(())
    }
}
