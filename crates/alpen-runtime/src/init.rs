#![forbid(unsafe_code)]

//! Tree initialization, live observation and teardown.
//!
//! # Invariants
//!
//! 1. A directive handler runs at most once per (node, raw attribute name),
//!    however often a subtree is walked.
//! 2. `<template>` content is never walked; the template element itself is.
//! 3. On one element, directives run in [`DirectivePriority`] order; ties
//!    keep declaration order.
//! 4. A removed element is torn down only if it is still disconnected when
//!    its record is delivered, so moves never dispose anything.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Unknown directive kind | Ignored, traced at debug level |
//! | Handler returns `Err` | Reported; the walk continues |
//! | Immediate handler panics | Reported as a directive error; the walk continues |
//! | Node's scope disposed before its deferred handler runs | Handler skipped |
//!
//! [`DirectivePriority`]: crate::directive::DirectivePriority

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use ahash::AHashSet;
use alpen_dom::{Document, MutationRecord, NodeId};
use alpen_reactive::{Effect, ScopeId};

use crate::binding::{DirectiveBinding, directive_bindings};
use crate::diagnostics;
use crate::directive::{Directive, DirectiveContext};
use crate::error::RuntimeError;
use crate::lifecycle::LifecycleEvent;
use crate::runtime::Runtime;
use crate::scheduler::{Task, panic_message};

/// Bound on flush/record rounds in one [`Runtime::tick`].
const MAX_TICK_ROUNDS: usize = 64;

/// Elements under `root` in pre-order, not descending into templates.
fn walk(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !doc.is_element(node) {
            continue;
        }
        out.push(node);
        if !doc.is_template(node) {
            stack.extend(doc.children(node).iter().rev().copied());
        }
    }
    out
}

fn inside_template(doc: &Document, node: NodeId) -> bool {
    doc.ancestors(node).any(|a| doc.is_template(a))
}

impl Runtime {
    /// Initialize every `[x-data]` element without an `[x-data]` ancestor
    /// and start observing the body for structural changes.
    ///
    /// Calling it again does nothing.
    pub fn start(&self) {
        if self.inner.started.replace(true) {
            return;
        }
        self.inner.lifecycle.emit(LifecycleEvent::Initializing);

        let data_attr = format!("{}data", self.inner.config.prefix);
        let roots: Vec<NodeId> = {
            let mut doc = self.document_mut();
            let body = doc.body();
            if self.inner.config.observe_mutations {
                doc.observe(body);
            }
            doc.query_attribute(body, &data_attr)
                .into_iter()
                .filter(|&n| {
                    !inside_template(&doc, n)
                        && !doc.ancestors(n).any(|a| doc.has_attribute(a, &data_attr))
                })
                .collect()
        };
        tracing::debug!(roots = roots.len(), "starting");
        for root in roots {
            self.init_tree(root);
        }
        self.tick();

        self.inner.lifecycle.emit(LifecycleEvent::Initialized);
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    /// Walk `root` and hand every not-yet-initialized directive to its
    /// handler, then flush.
    pub fn init_tree(&self, root: NodeId) {
        let prefix = self.inner.config.prefix.as_str();
        let nodes = walk(&self.document(), root);

        for node in nodes {
            let bindings = directive_bindings(prefix, self.document().attributes(node));
            let mut resolved: Vec<(Rc<dyn Directive>, DirectiveBinding)> = bindings
                .into_iter()
                .filter_map(|binding| match self.lookup_directive(&binding.kind) {
                    Some(directive) => Some((directive, binding)),
                    None => {
                        tracing::debug!(node = %node, directive = %binding.raw_name, "unknown directive");
                        None
                    }
                })
                .collect();
            resolved.sort_by_key(|(directive, _)| directive.priority());

            for (directive, binding) in resolved {
                let fresh = self
                    .inner
                    .initialized
                    .borrow_mut()
                    .insert((node, binding.raw_name.clone()));
                if !fresh {
                    continue;
                }
                if directive.run_immediately() {
                    tracing::trace!(node = %node, directive = %binding.raw_name, "directive init");
                    let outcome = catch_unwind(AssertUnwindSafe(|| {
                        directive.init(&DirectiveContext::new(self, node, &binding))
                    }));
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => diagnostics::report(err),
                        Err(payload) => diagnostics::report(RuntimeError::Directive {
                            node,
                            directive: binding.raw_name.clone(),
                            expression: binding.expression.clone(),
                            message: format!("handler panicked: {}", panic_message(&*payload)),
                        }),
                    }
                } else {
                    self.defer_directive(node, directive, binding);
                }
            }
        }

        self.inner.scheduler.flush();
    }

    fn defer_directive(&self, node: NodeId, directive: Rc<dyn Directive>, binding: DirectiveBinding) {
        let weak = self.downgrade();
        let label = format!("{} on {node}", binding.raw_name);
        self.inner.scheduler.task(Task::new(label, move || {
            let Some(runtime) = weak.upgrade() else {
                return Ok(());
            };
            let scope = runtime.closest_scope(node);
            if !runtime.is_scope_alive(scope) || !runtime.document().is_connected(node) {
                tracing::trace!(node = %node, directive = %binding.raw_name, "skipped: torn down");
                return Ok(());
            }
            tracing::trace!(node = %node, directive = %binding.raw_name, "directive init");
            directive.init(&DirectiveContext::new(&runtime, node, &binding))
        }));
    }

    /// End the current unit of work: run the pending flush and deliver
    /// structural-change records, until both are quiet.
    ///
    /// A no-op while a flush is already running.
    pub fn tick(&self) {
        let scheduler = &self.inner.scheduler;
        if scheduler.is_flushing() {
            return;
        }
        for _ in 0..MAX_TICK_ROUNDS {
            let mut progressed = false;
            if scheduler.is_flush_pending() || scheduler.pending() > 0 {
                scheduler.flush();
                progressed = true;
            }
            let records = self.document_mut().take_records();
            if !records.is_empty() {
                self.process_records(records);
                progressed = true;
            }
            if !progressed {
                return;
            }
        }
        tracing::warn!(rounds = MAX_TICK_ROUNDS, "tick did not settle");
    }

    fn process_records(&self, records: Vec<MutationRecord>) {
        if !self.inner.config.observe_mutations {
            return;
        }
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for record in records {
            added.extend(record.added);
            removed.extend(record.removed);
        }

        for node in removed {
            let detached = {
                let doc = self.document();
                doc.is_element(node) && !doc.is_connected(node)
            };
            if detached {
                self.destroy_tree(node);
            }
        }

        for node in added {
            let eligible = {
                let doc = self.document();
                doc.is_element(node) && doc.is_connected(node) && !inside_template(&doc, node)
            };
            if eligible && !self.is_managed(node) {
                self.init_tree(node);
            }
        }
    }

    /// Tear down everything attached to `root` and its descendants: owned
    /// scopes (recursively stopping their effects), node effects, listeners,
    /// refs and initialization marks. Idempotent.
    pub fn destroy_tree(&self, root: NodeId) {
        let nodes = self.document().descendants(root);
        let set: AHashSet<NodeId> = nodes.iter().copied().collect();

        let cleanups: Vec<_> = {
            let mut map = self.inner.cleanups.borrow_mut();
            nodes.iter().filter_map(|n| map.remove(n)).flatten().collect()
        };
        for cleanup in cleanups {
            cleanup(self);
        }

        let scopes: Vec<ScopeId> = {
            let mut map = self.inner.node_scopes.borrow_mut();
            nodes.iter().filter_map(|n| map.remove(n)).collect()
        };
        let effects: Vec<Effect> = {
            let mut map = self.inner.node_effects.borrow_mut();
            nodes.iter().filter_map(|n| map.remove(n)).flatten().collect()
        };
        let mut stopped = 0;
        for scope in scopes {
            stopped += self.dispose_scope(scope);
        }
        for effect in &effects {
            effect.stop();
        }

        self.inner
            .initialized
            .borrow_mut()
            .retain(|(n, _)| !set.contains(n));
        self.inner.managed.borrow_mut().retain(|n| !set.contains(n));
        self.forget_nodes(&set);
        tracing::trace!(root = %root, nodes = nodes.len(), stopped, "destroyed tree");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_skips_template_content() {
        let mut doc = Document::new();
        let body = doc.body();
        let nodes = doc
            .append_markup(body, "<div><template><p></p></template><span></span></div>")
            .unwrap();
        let order: Vec<_> = walk(&doc, nodes[0])
            .into_iter()
            .map(|n| doc.tag(n).unwrap_or_default().to_string())
            .collect();
        assert_eq!(order, ["div", "template", "span"]);
    }
}
