#![forbid(unsafe_code)]

//! Directives that write an element's own content or visibility.

use crate::diagnostics;
use crate::directive::{Directive, DirectiveContext};
use crate::error::RuntimeError;

/// Node property holding the `display` value `x-show` hid.
const HIDDEN_DISPLAY: &str = "alpen:hidden-display";

/// `x-text`: keeps the text content equal to the expression's text form.
pub(crate) struct TextDirective;

impl Directive for TextDirective {
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let node = cx.node();
        let expression = cx.expression().to_string();
        cx.effect(move |runtime| match runtime.evaluate(node, &expression) {
            Ok(value) => {
                let text = value.to_text();
                runtime.document_mut().set_text_content(node, text);
            }
            Err(err) => diagnostics::report(err),
        });
        Ok(())
    }
}

/// `x-show`: hides with inline `display: none` while falsy and restores the
/// previous inline display when shown again.
pub(crate) struct ShowDirective;

impl Directive for ShowDirective {
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let node = cx.node();
        let expression = cx.expression().to_string();
        cx.effect(move |runtime| {
            let visible = match runtime.evaluate(node, &expression) {
                Ok(value) => value.is_truthy(),
                Err(err) => {
                    diagnostics::report(err);
                    return;
                }
            };
            let mut doc = runtime.document_mut();
            if visible {
                match doc.remove_property(node, HIDDEN_DISPLAY).as_deref() {
                    None => {}
                    Some("") => {
                        doc.remove_style_property(node, "display");
                    }
                    Some(previous) => doc.set_style_property(node, "display", previous),
                }
            } else if doc.property(node, HIDDEN_DISPLAY).is_none() {
                let previous = doc.style_property(node, "display").unwrap_or_default();
                doc.set_property(node, HIDDEN_DISPLAY, previous);
                doc.set_style_property(node, "display", "none");
            }
        });
        Ok(())
    }
}

/// `x-cloak`: removed once the element is initialized.
pub(crate) struct CloakDirective;

impl Directive for CloakDirective {
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        cx.runtime()
            .document_mut()
            .remove_attribute(cx.node(), &cx.binding().raw_name);
        Ok(())
    }
}
