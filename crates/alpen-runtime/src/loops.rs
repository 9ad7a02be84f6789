#![forbid(unsafe_code)]

//! Keyed loop reconciliation (`x-for`).
//!
//! A loop projects a collection onto a run of cloned subtrees placed right
//! after its `<template>`. Each row owns a child scope binding the loop
//! names. Re-evaluation reconciles by key:
//!
//! 1. Rows whose key survives keep their subtree and scope; the loop names
//!    are rebound (identical writes are no-ops, so untouched rows do not
//!    re-render).
//! 2. Rows whose key disappeared are removed and their scopes disposed,
//!    recursively stopping inner effects and inner loops.
//! 3. New keys get a fresh clone, inserted and then initialized outside of
//!    dependency tracking.
//! 4. Reused rows are repositioned with a longest-increasing-subsequence
//!    pass over their old positions: only rows outside the subsequence move.
//!
//! # Invariants
//!
//! 1. After a render the rows follow the template in collection order, one
//!    per distinct key.
//! 2. A reused row's root node and scope are never recreated.
//! 3. Every removed row's scope is disposed before the render returns.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Source expression throws | Reported; renders empty |
//! | Source is not iterable | `Directive` error reported; renders empty |
//! | Key expression throws | Reported; that item falls back to its position |
//! | Duplicate key | First occurrence wins; `DuplicateKey` reported |
//! | Matched row disposed or detached | `DisposedEntry` reported; row recreated |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use alpen_dom::{Document, NodeId};
use alpen_reactive::{ReactiveObject, ScopeId, Value, untracked};

use crate::diagnostics;
use crate::directive::{Directive, DirectiveContext, DirectivePriority};
use crate::error::{ReconciliationError, RuntimeError};
use crate::runtime::Runtime;

// =============================================================================
// Loop expression
// =============================================================================

/// Parsed `item in items` / `(item, index, collection) of items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopExpression {
    pub item: String,
    pub index: Option<String>,
    pub collection: Option<String>,
    pub source: String,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Parse a loop expression. `None` if it is malformed.
#[must_use]
pub fn parse_loop_expression(expression: &str) -> Option<LoopExpression> {
    let bytes = expression.as_bytes();
    let split = (1..bytes.len().saturating_sub(2)).find(|&i| {
        bytes[i - 1].is_ascii_whitespace()
            && matches!(&bytes[i..i + 2], b"in" | b"of")
            && bytes[i + 2].is_ascii_whitespace()
    })?;

    let names = expression[..split].trim();
    let source = expression[split + 2..].trim();
    if source.is_empty() {
        return None;
    }
    let names = names
        .strip_prefix('(')
        .and_then(|n| n.strip_suffix(')'))
        .unwrap_or(names);

    let mut parts = names.split(',').map(str::trim);
    let item = parts.next().filter(|n| is_identifier(n))?.to_string();
    let mut optional = || -> Result<Option<String>, ()> {
        match parts.next() {
            None => Ok(None),
            Some(name) if is_identifier(name) => Ok(Some(name.to_string())),
            Some(_) => Err(()),
        }
    };
    let index = optional().ok()?;
    let collection = optional().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(LoopExpression {
        item,
        index,
        collection,
        source: source.to_string(),
    })
}

/// Largest `N` accepted for a numeric `x-for` range.
pub const MAX_RANGE: usize = 1 << 20;

/// Why a loop source produced no rows.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationError {
    /// The value's type cannot be iterated; carries the type name.
    NotIterable(&'static str),
    /// A numeric range above [`MAX_RANGE`].
    RangeTooLarge(f64),
}

impl fmt::Display for IterationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotIterable(type_name) => write!(f, "cannot iterate over {type_name}"),
            Self::RangeTooLarge(n) => {
                write!(f, "range of {n} exceeds the limit of {MAX_RANGE} items")
            }
        }
    }
}

/// `(item, index)` pairs for a source value.
///
/// Arrays yield their elements with numeric positions, a number `N` yields
/// `1..=N`, objects yield `(value, key)`. Nullish sources are empty.
///
/// # Errors
///
/// [`IterationError::NotIterable`] for other types, and
/// [`IterationError::RangeTooLarge`] when `N` exceeds [`MAX_RANGE`].
pub fn iteration_items(source: &Value) -> Result<Vec<(Value, Value)>, IterationError> {
    match source {
        Value::Undefined | Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(i, item)| (item, Value::from(i)))
            .collect()),
        Value::Number(n) if n.is_finite() => {
            if *n >= MAX_RANGE as f64 + 1.0 {
                return Err(IterationError::RangeTooLarge(*n));
            }
            let count = if *n >= 1.0 { n.floor() as usize } else { 0 };
            Ok((1..=count)
                .map(|i| (Value::from(i), Value::from(i - 1)))
                .collect())
        }
        Value::Object(object) => Ok(object
            .entries()
            .into_iter()
            .map(|(key, value)| (value, Value::from(key)))
            .collect()),
        other => Err(IterationError::NotIterable(other.type_name())),
    }
}

// =============================================================================
// Longest increasing subsequence
// =============================================================================

/// Positions (into `seq`) of one longest strictly increasing subsequence.
///
/// O(n log n) patience sorting with back-pointers.
#[must_use]
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k]: position of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let slot = tails.partition_point(|&t| seq[t] < value);
        if slot > 0 {
            prev[i] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }
    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = prev[i];
    }
    out.reverse();
    out
}

// =============================================================================
// Loop state and reconciliation
// =============================================================================

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopEntry {
    pub key: String,
    pub scope: ScopeId,
    pub root: NodeId,
}

/// Counts from one render, traced at debug level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub reused: usize,
    pub created: usize,
    pub removed: usize,
    pub moved: usize,
}

struct Row {
    item: Value,
    index: Value,
    key: String,
}

struct Loop {
    template: NodeId,
    expression: LoopExpression,
    key: Option<String>,
    directive: String,
    entries: RefCell<Vec<LoopEntry>>,
}

impl Loop {
    fn bindings(&self, row: &Row, collection: &Value) -> Vec<(&str, Value)> {
        let mut names = vec![(self.expression.item.as_str(), row.item.clone())];
        if let Some(index) = &self.expression.index {
            names.push((index.as_str(), row.index.clone()));
        }
        if let Some(name) = &self.expression.collection {
            names.push((name.as_str(), collection.clone()));
        }
        names
    }

    fn directive_error(&self, message: String) -> RuntimeError {
        RuntimeError::Directive {
            node: self.template,
            directive: self.directive.clone(),
            expression: self.expression.source.clone(),
            message,
        }
    }

    /// Evaluate the source and compute one row per distinct key.
    fn rows(&self, runtime: &Runtime, scope: ScopeId) -> (Vec<Row>, Value) {
        let source = match runtime.evaluate_with(self.template, scope, &self.expression.source, &[]) {
            Ok(value) => value,
            Err(err) => {
                diagnostics::report(err);
                return (Vec::new(), Value::Undefined);
            }
        };
        let items = match iteration_items(&source) {
            Ok(items) => items,
            Err(err) => {
                diagnostics::report(self.directive_error(err.to_string()));
                return (Vec::new(), source);
            }
        };

        let mut seen = AHashSet::with_capacity(items.len());
        let mut rows = Vec::with_capacity(items.len());
        for (position, (item, index)) in items.into_iter().enumerate() {
            let mut row = Row {
                item,
                index,
                key: position.to_string(),
            };
            if let Some(key_expr) = &self.key {
                match runtime.evaluate_with(self.template, scope, key_expr, &self.bindings(&row, &source)) {
                    Ok(key) => row.key = key.to_key_string(),
                    Err(err) => diagnostics::report(err),
                }
            }
            if !seen.insert(row.key.clone()) {
                diagnostics::report(
                    ReconciliationError::DuplicateKey {
                        node: self.template,
                        key: row.key,
                    }
                    .into(),
                );
                continue;
            }
            rows.push(row);
        }
        (rows, source)
    }

    fn create_row(&self, runtime: &Runtime, scope: ScopeId, row: &Row, collection: &Value) -> Option<LoopEntry> {
        let root = {
            let mut doc = runtime.document_mut();
            let prototype = doc.first_element_child(self.template)?;
            doc.clone_subtree(prototype)
        };
        let data = ReactiveObject::from_entries(self.bindings(row, collection));
        let row_scope = runtime.create_scope(scope, root, data);
        runtime.mark_managed(root);
        Some(LoopEntry {
            key: row.key.clone(),
            scope: row_scope,
            root,
        })
    }

    fn rebind(&self, runtime: &Runtime, entry: &LoopEntry, row: &Row, collection: &Value) {
        if let Some(data) = runtime.scope_data(entry.scope) {
            for (name, value) in self.bindings(row, collection) {
                data.set(name, value);
            }
        }
    }

    fn discard(runtime: &Runtime, entry: &LoopEntry) {
        runtime.document_mut().remove(entry.root);
        runtime.dispose_scope(entry.scope);
        runtime.destroy_tree(entry.root);
    }

    /// Bring the rendered rows in line with the current source.
    fn reconcile(&self, runtime: &Runtime) -> ReconcileStats {
        let scope = runtime.closest_scope(self.template);
        let (rows, collection) = self.rows(runtime, scope);

        untracked(|| {
            let mut stats = ReconcileStats::default();
            let Some(parent) = runtime.document().parent(self.template) else {
                return stats;
            };

            let old = self.entries.take();
            let mut old_by_key: AHashMap<&str, usize> =
                old.iter().enumerate().map(|(i, e)| (e.key.as_str(), i)).collect();

            // (entry, old position) in new order; `None` marks a new row.
            let mut next: Vec<(LoopEntry, Option<usize>)> = Vec::with_capacity(rows.len());
            let mut fresh = Vec::new();
            for row in &rows {
                let reused = old_by_key.remove(row.key.as_str()).and_then(|i| {
                    let entry = &old[i];
                    let intact = runtime.is_scope_alive(entry.scope)
                        && runtime.document().parent(entry.root) == Some(parent);
                    if intact {
                        return Some((entry.clone(), i));
                    }
                    diagnostics::report(
                        ReconciliationError::DisposedEntry {
                            node: self.template,
                            key: entry.key.clone(),
                        }
                        .into(),
                    );
                    Self::discard(runtime, entry);
                    None
                });
                match reused {
                    Some((entry, i)) => {
                        self.rebind(runtime, &entry, row, &collection);
                        stats.reused += 1;
                        next.push((entry, Some(i)));
                    }
                    None => {
                        let Some(entry) = self.create_row(runtime, scope, row, &collection) else {
                            continue;
                        };
                        stats.created += 1;
                        fresh.push(entry.root);
                        next.push((entry, None));
                    }
                }
            }

            let mut leftovers: Vec<usize> = old_by_key.into_values().collect();
            leftovers.sort_unstable();
            for i in leftovers {
                Self::discard(runtime, &old[i]);
                stats.removed += 1;
            }

            stats.moved = self.position(runtime, parent, &next);
            *self.entries.borrow_mut() = next.into_iter().map(|(entry, _)| entry).collect();

            for root in fresh {
                runtime.init_tree(root);
            }
            stats
        })
    }

    /// Place rows right after the template in `next` order, moving only rows
    /// outside the longest run already in order. Returns the number moved.
    fn position(&self, runtime: &Runtime, parent: NodeId, next: &[(LoopEntry, Option<usize>)]) -> usize {
        let old_positions: Vec<usize> = next.iter().filter_map(|(_, old)| *old).collect();
        let stable: AHashSet<usize> = longest_increasing_subsequence(&old_positions)
            .into_iter()
            .map(|i| old_positions[i])
            .collect();

        let mut failures = Vec::new();
        let mut moved = 0;
        {
            let mut doc = runtime.document_mut();
            let mut reference = end_anchor(&doc, self.template, next);
            for (entry, old) in next.iter().rev() {
                let in_place = old.is_some_and(|i| stable.contains(&i));
                if !in_place {
                    if let Err(err) = doc.insert_before(parent, entry.root, reference) {
                        failures.push(err);
                    }
                    moved += usize::from(old.is_some());
                }
                reference = Some(entry.root);
            }
        }
        for err in failures {
            diagnostics::report(err.into());
        }
        moved
    }

    /// Remove every row, for when the template itself goes away.
    fn clear(&self, runtime: &Runtime) {
        for entry in self.entries.take() {
            Self::discard(runtime, &entry);
        }
    }
}

/// First sibling after the template that is not a kept row.
fn end_anchor(doc: &Document, template: NodeId, next: &[(LoopEntry, Option<usize>)]) -> Option<NodeId> {
    let rows: AHashSet<NodeId> = next
        .iter()
        .filter(|(_, old)| old.is_some())
        .map(|(entry, _)| entry.root)
        .collect();
    let mut cursor = doc.next_sibling(template);
    while let Some(node) = cursor {
        if !rows.contains(&node) {
            break;
        }
        cursor = doc.next_sibling(node);
    }
    cursor
}

// =============================================================================
// Directive
// =============================================================================

/// `x-for`: must sit on a `<template>` whose first element child is the row
/// prototype. The key comes from the template's `:key` attribute.
pub(crate) struct ForDirective;

impl Directive for ForDirective {
    fn priority(&self) -> DirectivePriority {
        DirectivePriority::Structural
    }

    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let runtime = cx.runtime();
        let template = cx.node();
        let key_attr = format!("{}bind:key", runtime.config().prefix);
        let key = {
            let doc = runtime.document();
            if !doc.is_template(template) {
                return Err(cx.error("x-for must be declared on a <template> element"));
            }
            if doc.first_element_child(template).is_none() {
                return Err(cx.error("<template> has no element child to repeat"));
            }
            doc.attribute(template, ":key")
                .or_else(|| doc.attribute(template, &key_attr))
                .map(str::to_string)
        };
        let Some(expression) = parse_loop_expression(cx.expression()) else {
            return Err(cx.error("expected `item in items` or `(item, index) in items`"));
        };

        let state = Rc::new(Loop {
            template,
            expression,
            key,
            directive: cx.binding().raw_name.clone(),
            entries: RefCell::new(Vec::new()),
        });
        let render = Rc::clone(&state);
        cx.effect(move |runtime| {
            let stats = render.reconcile(runtime);
            tracing::debug!(
                template = %render.template,
                reused = stats.reused,
                created = stats.created,
                removed = stats.removed,
                moved = stats.moved,
                "loop reconciled"
            );
        });
        runtime.on_cleanup(template, move |runtime| state.clear(runtime));
        Ok(())
    }
}
