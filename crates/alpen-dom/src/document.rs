#![forbid(unsafe_code)]

//! Arena-backed document tree.
//!
//! A [`Document`] owns every node it ever created. Nodes are addressed by
//! [`NodeId`] and are never freed: a removed subtree stays in the arena in a
//! detached state, so ids held by other components never dangle.
//!
//! # Invariants
//!
//! 1. A node has at most one parent and appears exactly once in that parent's
//!    child list.
//! 2. Only elements have children; text nodes are always leaves.
//! 3. Moving an attached node (via [`Document::insert_before`] or
//!    [`Document::append_child`]) detaches it first, so a move is a remove
//!    followed by an insert. Node-local properties survive moves.
//! 4. While an observer is installed, every structural change whose target
//!    lies inside the observed root produces exactly one [`MutationRecord`],
//!    in mutation order.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Insert into text node | Caller bug | [`DomError::HierarchyRequest`] |
//! | Insert ancestor into descendant | Caller bug | [`DomError::HierarchyRequest`] |
//! | Reference node not a child | Stale anchor | [`DomError::NotAChild`] |
//! | Removing a detached node | Already removed | `false`, no record |

use std::fmt;

use ahash::AHashMap;

/// Identifier of a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Raw arena index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single attribute, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: AHashMap<String, String>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            properties: AHashMap::new(),
        }
    }
}

/// A batch entry describing one structural change under an observed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// The parent whose child list changed.
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Errors from structural operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The operation would produce an invalid tree.
    HierarchyRequest { parent: NodeId, child: NodeId },
    /// The reference node is not a child of the given parent.
    NotAChild { parent: NodeId, reference: NodeId },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HierarchyRequest { parent, child } => {
                write!(f, "cannot insert {child} into {parent}")
            }
            Self::NotAChild { parent, reference } => {
                write!(f, "{reference} is not a child of {parent}")
            }
        }
    }
}

impl std::error::Error for DomError {}

struct Observer {
    root: NodeId,
    records: Vec<MutationRecord>,
}

/// In-memory document: an arena of element and text nodes under a `body`.
pub struct Document {
    nodes: Vec<NodeData>,
    body: NodeId,
    observer: Option<Observer>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("observing", &self.observer.is_some())
            .finish()
    }
}

impl Document {
    /// Create an empty document containing only `body`.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
            observer: None,
        };
        doc.body = doc.create_element("body");
        doc
    }

    /// The document body; the root of connectivity.
    #[inline]
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Number of nodes ever created (attached or not).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind));
        id
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.index()]
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.index()]
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.data(node).kind
    }

    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.data(node).kind, NodeKind::Element { .. })
    }

    /// Lowercase tag name, `None` for text nodes.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.data(node).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    #[must_use]
    pub fn is_template(&self, node: NodeId) -> bool {
        self.tag(node) == Some("template")
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.data(node).children
    }

    /// Element children in order (text nodes skipped).
    #[must_use]
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    #[must_use]
    pub fn first_element_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    fn position(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let idx = self.children(parent).iter().position(|&c| c == node)?;
        Some((parent, idx))
    }

    #[must_use]
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, idx) = self.position(node)?;
        self.children(parent).get(idx + 1).copied()
    }

    #[must_use]
    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, idx) = self.position(node)?;
        idx.checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Inclusive ancestry test: a node contains itself.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether the node is reachable from `body`.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.body, node)
    }

    /// Ancestors from the parent upward.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    /// Pre-order list of `root` and all element descendants.
    #[must_use]
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !self.is_element(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Element descendants of `root` (excluding `root`) with the given tag,
    /// in document order.
    #[must_use]
    pub fn query_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .skip(1)
            .filter(|&n| self.tag(n) == Some(tag))
            .collect()
    }

    /// Element descendants of `root` (excluding `root`) carrying `name`.
    #[must_use]
    pub fn query_attribute(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .skip(1)
            .filter(|&n| self.has_attribute(n, name))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Append `child` as the last child of `parent`, moving it if attached.
    ///
    /// # Errors
    ///
    /// [`DomError::HierarchyRequest`] when `parent` is a text node or lies
    /// inside `child`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (append when `None`).
    ///
    /// Inserting a node directly before itself is a no-op.
    ///
    /// # Errors
    ///
    /// [`DomError::HierarchyRequest`] for invalid trees,
    /// [`DomError::NotAChild`] when `reference` is not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.is_element(parent) || self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild { parent, reference });
            }
            if reference == child {
                return Ok(());
            }
        }

        self.detach(child);

        let children = &mut self.data_mut(parent).children;
        let idx = reference
            .and_then(|r| children.iter().position(|&c| c == r))
            .unwrap_or(children.len());
        children.insert(idx, child);
        self.data_mut(child).parent = Some(parent);

        #[cfg(feature = "tracing")]
        tracing::trace!(parent = %parent, child = %child, "insert node");

        self.record(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Insert `child` right after `node` in `node`'s parent.
    ///
    /// # Errors
    ///
    /// [`DomError::HierarchyRequest`] when `node` is detached or the result
    /// would be an invalid tree.
    pub fn insert_after(&mut self, node: NodeId, child: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.parent(node) else {
            return Err(DomError::HierarchyRequest {
                parent: node,
                child,
            });
        };
        let next = self.next_sibling(node);
        if next == Some(child) {
            return Ok(());
        }
        self.insert_before(parent, child, next)
    }

    /// Detach `node` from its parent. Returns `false` if already detached.
    pub fn remove(&mut self, node: NodeId) -> bool {
        self.detach(node).is_some()
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.data_mut(parent).children.retain(|&c| c != node);
        self.data_mut(node).parent = None;
        self.record(MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
        Some(parent)
    }

    /// Deep-clone `node` into a new detached subtree.
    ///
    /// Attributes and text are copied; node-local properties are not.
    pub fn clone_subtree(&mut self, node: NodeId) -> NodeId {
        let kind = self.data(node).kind.clone();
        let copy = self.push(kind);
        let children = self.children(node).to_vec();
        for child in children {
            let cloned = self.clone_subtree(child);
            self.data_mut(cloned).parent = Some(copy);
            self.data_mut(copy).children.push(cloned);
        }
        copy
    }

    // -----------------------------------------------------------------------
    // Attributes, text, properties
    // -----------------------------------------------------------------------

    /// Attributes in declaration order (empty for text nodes).
    #[must_use]
    pub fn attributes(&self, node: NodeId) -> &[Attribute] {
        match &self.data(node).kind {
            NodeKind::Element { attributes, .. } => attributes,
            NodeKind::Text(_) => &[],
        }
    }

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    #[must_use]
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Set an attribute, keeping its original position when it exists.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let NodeKind::Element { attributes, .. } = &mut self.data_mut(node).kind {
            match attributes.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value,
                None => attributes.push(Attribute {
                    name: name.to_string(),
                    value,
                }),
            }
        }
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        if let NodeKind::Element { attributes, .. } = &mut self.data_mut(node).kind {
            let before = attributes.len();
            attributes.retain(|a| a.name != name);
            return attributes.len() != before;
        }
        false
    }

    /// Concatenated text of the node and its descendants.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.data(node).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for &child in self.children(node) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Replace all children with a single text node (or the text itself for
    /// text nodes).
    pub fn set_text_content(&mut self, node: NodeId, text: impl Into<String>) {
        let text = text.into();
        if let NodeKind::Text(current) = &mut self.data_mut(node).kind {
            *current = text;
            return;
        }
        for child in self.children(node).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let child = self.create_text(text);
            self.data_mut(child).parent = Some(node);
            self.data_mut(node).children.push(child);
            self.record(MutationRecord {
                target: node,
                added: vec![child],
                removed: Vec::new(),
            });
        }
    }

    /// Node-local data that is never cloned and survives moves.
    #[must_use]
    pub fn property(&self, node: NodeId, key: &str) -> Option<&str> {
        self.data(node).properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, node: NodeId, key: &str, value: impl Into<String>) {
        self.data_mut(node)
            .properties
            .insert(key.to_string(), value.into());
    }

    pub fn remove_property(&mut self, node: NodeId, key: &str) -> Option<String> {
        self.data_mut(node).properties.remove(key)
    }

    // -----------------------------------------------------------------------
    // Inline style
    // -----------------------------------------------------------------------

    fn style_entries(&self, node: NodeId) -> Vec<(String, String)> {
        self.attribute(node, "style")
            .unwrap_or_default()
            .split(';')
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                let prop = prop.trim();
                (!prop.is_empty()).then(|| (prop.to_ascii_lowercase(), value.trim().to_string()))
            })
            .collect()
    }

    fn write_style(&mut self, node: NodeId, entries: &[(String, String)]) {
        if entries.is_empty() {
            self.remove_attribute(node, "style");
            return;
        }
        let style = entries
            .iter()
            .map(|(p, v)| format!("{p}: {v};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "style", style);
    }

    #[must_use]
    pub fn style_property(&self, node: NodeId, property: &str) -> Option<String> {
        self.style_entries(node)
            .into_iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v)
    }

    pub fn set_style_property(&mut self, node: NodeId, property: &str, value: &str) {
        let mut entries = self.style_entries(node);
        match entries.iter_mut().find(|(p, _)| p == property) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((property.to_string(), value.to_string())),
        }
        self.write_style(node, &entries);
    }

    /// Remove an inline style property, returning its previous value.
    pub fn remove_style_property(&mut self, node: NodeId, property: &str) -> Option<String> {
        let mut entries = self.style_entries(node);
        let idx = entries.iter().position(|(p, _)| p == property)?;
        let (_, old) = entries.remove(idx);
        self.write_style(node, &entries);
        Some(old)
    }

    /// Connected and no inclusive ancestor is `display: none`.
    #[must_use]
    pub fn is_visible(&self, node: NodeId) -> bool {
        self.is_connected(node)
            && std::iter::once(node)
                .chain(self.ancestors(node))
                .all(|n| self.style_property(n, "display").as_deref() != Some("none"))
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Start recording structural changes under `root` (inclusive).
    ///
    /// Replaces any previous observer and drops its pending records.
    pub fn observe(&mut self, root: NodeId) {
        self.observer = Some(Observer {
            root,
            records: Vec::new(),
        });
    }

    /// Stop recording. Pending records are discarded.
    pub fn disconnect(&mut self) {
        self.observer = None;
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observer.is_some()
    }

    #[must_use]
    pub fn has_records(&self) -> bool {
        self.observer
            .as_ref()
            .is_some_and(|o| !o.records.is_empty())
    }

    /// Drain pending mutation records in mutation order.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.observer
            .as_mut()
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    fn record(&mut self, record: MutationRecord) {
        let Some(root) = self.observer.as_ref().map(|o| o.root) else {
            return;
        };
        if !self.contains(root, record.target) {
            return;
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.records.push(record);
        }
    }
}
