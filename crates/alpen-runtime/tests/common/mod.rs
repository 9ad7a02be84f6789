//! Shared helpers for alpen-runtime integration tests.

#![allow(dead_code)]

use alpen_dom::NodeId;
use alpen_runtime::{Diagnostic, Runtime, diagnostics};

/// Mount `markup` into a fresh runtime and start it.
pub fn page(markup: &str) -> Runtime {
    let runtime = Runtime::new();
    runtime.mount(markup).expect("markup parses");
    runtime.start();
    runtime
}

/// Rendered elements with `tag` in document order, skipping template
/// content.
pub fn all(runtime: &Runtime, tag: &str) -> Vec<NodeId> {
    let doc = runtime.document();
    doc.query_tag(doc.body(), tag)
        .into_iter()
        .filter(|&n| !doc.ancestors(n).any(|a| doc.is_template(a)))
        .collect()
}

/// The single connected element with `tag`.
pub fn one(runtime: &Runtime, tag: &str) -> NodeId {
    let found = all(runtime, tag);
    assert_eq!(found.len(), 1, "expected exactly one <{tag}>");
    found[0]
}

/// The element whose `id` attribute is `id`.
pub fn by_id(runtime: &Runtime, id: &str) -> NodeId {
    let doc = runtime.document();
    doc.descendants(doc.body())
        .into_iter()
        .find(|&n| doc.attribute(n, "id") == Some(id) && !doc.ancestors(n).any(|a| doc.is_template(a)))
        .unwrap_or_else(|| panic!("no element with id {id:?}"))
}

/// Text content of every connected `tag` element.
pub fn texts(runtime: &Runtime, tag: &str) -> Vec<String> {
    all(runtime, tag)
        .into_iter()
        .map(|n| runtime.document().text_content(n))
        .collect()
}

pub fn text(runtime: &Runtime, node: NodeId) -> String {
    runtime.document().text_content(node)
}

/// Evaluate `expression` against `node`'s scope, then end the unit of work.
pub fn run(runtime: &Runtime, node: NodeId, expression: &str) {
    runtime
        .evaluate(node, expression)
        .unwrap_or_else(|err| panic!("{expression}: {err}"));
    runtime.tick();
}

/// Click `node` and let the runtime settle.
pub fn click(runtime: &Runtime, node: NodeId) {
    runtime.dispatch(node, "click");
}

/// Drain buffered diagnostics.
pub fn drain_diagnostics() -> Vec<Diagnostic> {
    diagnostics::take()
}

/// Install a test subscriber once so `RUST_LOG` works while debugging.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
