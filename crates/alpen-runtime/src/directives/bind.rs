#![forbid(unsafe_code)]

use alpen_reactive::Value;

use crate::diagnostics;
use crate::directive::{Directive, DirectiveContext};
use crate::error::RuntimeError;

/// Class tokens contributed by a `:class` value.
///
/// Objects contribute their truthy keys, arrays their elements, strings
/// their whitespace-separated words.
pub(crate) fn class_names(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object
            .entries()
            .into_iter()
            .filter(|(_, v)| v.is_truthy())
            .map(|(k, _)| k)
            .collect(),
        Value::Array(items) => items
            .to_vec()
            .iter()
            .filter(|v| v.is_truthy())
            .map(Value::to_text)
            .collect(),
        Value::Undefined | Value::Null | Value::Bool(false) => Vec::new(),
        other => other.to_text().split_whitespace().map(str::to_string).collect(),
    }
}

fn merge_classes(base: &str, extra: Vec<String>) -> String {
    let mut tokens: Vec<String> = base.split_whitespace().map(str::to_string).collect();
    for token in extra {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens.join(" ")
}

/// `x-bind:<attr>` / `:<attr>`: keeps an attribute in sync with a value.
///
/// `false`, `null` and `undefined` remove the attribute; `true` sets it to
/// its own name. `:class` merges with the classes written in markup.
/// `:key` belongs to `x-for` and is ignored here.
pub(crate) struct BindDirective;

impl Directive for BindDirective {
    fn init(&self, cx: &DirectiveContext<'_>) -> Result<(), RuntimeError> {
        let Some(attribute) = cx.binding().value.clone() else {
            return Err(cx.error("missing attribute name"));
        };
        if attribute == "key" {
            return Ok(());
        }
        let node = cx.node();
        let expression = cx.expression().to_string();
        let base_class = (attribute == "class").then(|| {
            cx.runtime()
                .document()
                .attribute(node, "class")
                .unwrap_or_default()
                .to_string()
        });

        cx.effect(move |runtime| {
            let value = match runtime.evaluate(node, &expression) {
                Ok(value) => value,
                Err(err) => {
                    diagnostics::report(err);
                    return;
                }
            };
            let rendered = match &base_class {
                Some(base) => Some(merge_classes(base, class_names(&value))),
                None => match &value {
                    Value::Undefined | Value::Null | Value::Bool(false) => None,
                    Value::Bool(true) => Some(attribute.clone()),
                    other => Some(other.to_text()),
                },
            };
            let mut doc = runtime.document_mut();
            match rendered {
                Some(text) => doc.set_attribute(node, &attribute, text),
                None => {
                    doc.remove_attribute(node, &attribute);
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_from_values() {
        let object = Value::object([
            ("active", Value::from(true)),
            ("hidden", Value::from(false)),
            ("big", Value::from(1)),
        ]);
        assert_eq!(class_names(&object), ["active", "big"]);
        assert_eq!(class_names(&Value::from("a  b")), ["a", "b"]);
        assert_eq!(
            class_names(&Value::array(vec![Value::from("x"), Value::Null])),
            ["x"]
        );
        assert!(class_names(&Value::Null).is_empty());
    }

    #[test]
    fn merge_keeps_markup_classes_first() {
        assert_eq!(merge_classes("row odd", vec!["active".into(), "row".into()]), "row odd active");
        assert_eq!(merge_classes("", Vec::new()), "");
    }
}
