#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

use alpen_dom::NodeId;
use alpen_reactive::{ReactiveObject, ScopeId, untracked};

use crate::diagnostics;
use crate::directive::{Directive, DirectiveContext, DirectivePriority};
use crate::error::RuntimeError;
use crate::runtime::Runtime;

/// The clone currently rendered by one `x-if`.
#[derive(Default)]
struct Rendered(Cell<Option<(NodeId, ScopeId)>>);

impl Rendered {
    fn show(&self, runtime: &Runtime, template: NodeId) {
        if self.0.get().is_some() {
            return;
        }
        let root = {
            let mut doc = runtime.document_mut();
            let Some(prototype) = doc.first_element_child(template) else {
                return;
            };
            doc.clone_subtree(prototype)
        };
        let scope = runtime.create_scope(runtime.closest_scope(template), root, ReactiveObject::new());
        runtime.mark_managed(root);
        let inserted = runtime.document_mut().insert_after(template, root);
        if let Err(err) = inserted {
            diagnostics::report(err.into());
            runtime.dispose_scope(scope);
            runtime.destroy_tree(root);
            return;
        }
        self.0.set(Some((root, scope)));
        runtime.init_tree(root);
    }

    fn hide(&self, runtime: &Runtime) {
        let Some((root, scope)) = self.0.take() else {
            return;
        };
        runtime.document_mut().remove(root);
        runtime.dispose_scope(scope);
        runtime.destroy_tree(root);
    }
}

/// `x-if`: renders the template's first element child while the expression
/// is truthy, in its own child scope; removes and disposes it while falsy.
pub(crate) struct IfDirective;

impl Directive for IfDirective {
    fn priority(&self) -> DirectivePriority {
        DirectivePriority::Structural
    }

    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let template = cx.node();
        {
            let doc = cx.runtime().document();
            if !doc.is_template(template) {
                return Err(cx.error("x-if must be declared on a <template> element"));
            }
            if doc.first_element_child(template).is_none() {
                return Err(cx.error("<template> has no element child to render"));
            }
        }

        let rendered = Rc::new(Rendered::default());
        let state = Rc::clone(&rendered);
        let expression = cx.expression().to_string();
        cx.effect(move |runtime| {
            let visible = match runtime.evaluate(template, &expression) {
                Ok(value) => value.is_truthy(),
                Err(err) => {
                    diagnostics::report(err);
                    false
                }
            };
            untracked(|| {
                if visible {
                    state.show(runtime, template);
                } else {
                    state.hide(runtime);
                }
            });
        });
        cx.runtime()
            .on_cleanup(template, move |runtime| rendered.hide(runtime));
        Ok(())
    }
}
