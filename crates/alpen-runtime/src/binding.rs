#![forbid(unsafe_code)]

//! Directive attribute parsing.
//!
//! | Attribute | kind | value | modifiers |
//! |-----------|------|-------|-----------|
//! | `x-text="msg"` | `text` | - | - |
//! | `x-on:click.prevent="go()"` | `on` | `click` | `prevent` |
//! | `@click.once="go()"` | `on` | `click` | `once` |
//! | `:class="cls"` | `bind` | `class` | - |
//! | `x-bind:xlink:href="u"` | `bind` | `xlink:href` | - |

use alpen_dom::Attribute;

/// One parsed directive attribute. Immutable after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveBinding {
    pub kind: String,
    pub value: Option<String>,
    pub modifiers: Vec<String>,
    pub expression: String,
    /// Attribute name exactly as written.
    pub raw_name: String,
    /// Position among the element's attributes.
    pub order: usize,
}

impl DirectiveBinding {
    /// Parse one attribute, or `None` if it is not a directive.
    #[must_use]
    pub fn parse(prefix: &str, name: &str, expression: &str, order: usize) -> Option<Self> {
        let normalized = if let Some(event) = name.strip_prefix('@') {
            format!("on:{event}")
        } else if let Some(attr) = name.strip_prefix(':') {
            format!("bind:{attr}")
        } else {
            name.strip_prefix(prefix)?.to_string()
        };

        let kind_end = normalized
            .find([':', '.'])
            .unwrap_or(normalized.len());
        let kind = &normalized[..kind_end];
        if kind.is_empty() {
            return None;
        }
        let rest = &normalized[kind_end..];
        let (value, modifiers) = match rest.strip_prefix(':') {
            Some(tail) => {
                let end = tail.find('.').unwrap_or(tail.len());
                (Some(&tail[..end]), &tail[end..])
            }
            None => (None, rest),
        };
        let modifiers = modifiers
            .split('.')
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        Some(Self {
            kind: kind.to_string(),
            value: value.filter(|v| !v.is_empty()).map(str::to_string),
            modifiers,
            expression: expression.to_string(),
            raw_name: name.to_string(),
            order,
        })
    }

    #[must_use]
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// `kind` or `kind:value`, used in labels and diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.value {
            Some(value) => format!("{}:{value}", self.kind),
            None => self.kind.clone(),
        }
    }
}

/// Every directive binding among `attributes`, in declaration order.
#[must_use]
pub fn directive_bindings(prefix: &str, attributes: &[Attribute]) -> Vec<DirectiveBinding> {
    attributes
        .iter()
        .enumerate()
        .filter_map(|(order, attr)| DirectiveBinding::parse(prefix, &attr.name, &attr.value, order))
        .collect()
}
