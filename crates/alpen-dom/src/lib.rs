#![forbid(unsafe_code)]

//! In-memory document tree for the alpen runtime.
//!
//! - [`Document`]: arena of element and text nodes with structural editing,
//!   attributes, inline styles, node-local properties and deep cloning.
//! - [`MutationRecord`]: structural-change notifications recorded under an
//!   observed root and drained by the embedding layer.
//! - [`markup`]: fragment parser and serializer for the HTML subset
//!   directive-bearing pages use.

pub mod document;
pub mod markup;

pub use document::{Attribute, Document, DomError, MutationRecord, NodeId, NodeKind};
pub use markup::MarkupError;
