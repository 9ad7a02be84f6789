#![forbid(unsafe_code)]

//! Dynamic, deep-reactive values.
//!
//! [`Value`] is the data model expressions evaluate to. Arrays and objects
//! are shared reactive containers: cloning a `Value::Array` clones the
//! handle, not the contents, and two containers are equal only when they are
//! the same container.
//!
//! # Invariants
//!
//! 1. Every read through a container API is tracked by the running effect;
//!    `peek*` methods are the untracked escape hatch.
//! 2. Writing a value that is [`Value::same`] as the current one is a no-op
//!    (no notification).
//! 3. Object reads track per key; array reads track the array as a whole.
//! 4. Text conversion follows the familiar script rules: `null` and
//!    `undefined` render as empty text, arrays join with `,`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::effect::{Dep, untracked};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ReactiveArray),
    Object(ReactiveObject),
}

impl Value {
    /// Build an array value.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(ReactiveArray::new(items))
    }

    /// Build an object value from ordered pairs.
    #[must_use]
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(ReactiveObject::from_entries(entries))
    }

    /// Identity comparison: primitives by value (`NaN` equals itself),
    /// containers by reference.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// Name of the runtime type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Numeric conversion (`NaN` when not numeric).
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Array(_) => Self::from(self.to_key_string()).as_number(),
            Self::Object(_) => f64::NAN,
        }
    }

    /// Text used for rendering: `null`/`undefined` become empty text.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Undefined | Self::Null => String::new(),
            other => other.to_key_string(),
        }
    }

    /// String conversion used for keys and concatenation.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.to_string(),
            Self::Array(a) => a
                .to_vec()
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Convert to JSON. Reads are tracked like any other read.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(a) => {
                serde_json::Value::Array(a.to_vec().iter().map(Value::to_json).collect())
            }
            Self::Object(o) => serde_json::Value::Object(
                o.entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Format a number the way scripts print them (`1`, `1.5`, `NaN`).
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::String(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", untracked(|| other.to_json())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&untracked(|| self.to_key_string()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::array(items)
    }
}

impl From<ReactiveArray> for Value {
    fn from(a: ReactiveArray) -> Self {
        Self::Array(a)
    }
}

impl From<ReactiveObject> for Value {
    fn from(o: ReactiveObject) -> Self {
        Self::Object(o)
    }
}

/// Deep-convert plain JSON into reactive containers.
#[must_use]
pub fn observe(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(observe).collect()),
        serde_json::Value::Object(map) => {
            Value::object(map.into_iter().map(|(k, v)| (k, observe(v))))
        }
    }
}

// ---------------------------------------------------------------------------
// ReactiveArray
// ---------------------------------------------------------------------------

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    dep: Rc<Dep>,
}

/// Shared reactive array. Every read tracks the whole array.
#[derive(Clone)]
pub struct ReactiveArray(Rc<ArrayInner>);

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.items.borrow().iter()).finish()
    }
}

impl ReactiveArray {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayInner {
            items: RefCell::new(items),
            dep: Dep::new(),
        }))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.dep.track();
        self.0.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.dep.track();
        self.0.items.borrow().get(index).cloned()
    }

    /// Snapshot of the items.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.dep.track();
        self.0.items.borrow().clone()
    }

    /// Untracked snapshot of the items.
    #[must_use]
    pub fn peek(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let out = f(&mut self.0.items.borrow_mut());
        self.0.dep.trigger();
        out
    }

    /// Append, returning the new length.
    pub fn push(&self, value: Value) -> usize {
        self.mutate(|items| {
            items.push(value);
            items.len()
        })
    }

    pub fn pop(&self) -> Option<Value> {
        if self.0.items.borrow().is_empty() {
            return None;
        }
        self.mutate(Vec::pop)
    }

    pub fn shift(&self) -> Option<Value> {
        if self.0.items.borrow().is_empty() {
            return None;
        }
        self.mutate(|items| Some(items.remove(0)))
    }

    /// Prepend, returning the new length.
    pub fn unshift(&self, value: Value) -> usize {
        self.mutate(|items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Write one slot, growing with `undefined` if needed.
    pub fn set(&self, index: usize, value: Value) {
        if self
            .0
            .items
            .borrow()
            .get(index)
            .is_some_and(|current| current.same(&value))
        {
            return;
        }
        self.mutate(|items| {
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
            }
            items[index] = value;
        });
    }

    /// Replace the whole contents.
    pub fn replace(&self, values: Vec<Value>) {
        self.mutate(|items| *items = values);
    }

    pub fn reverse(&self) {
        self.mutate(|items| items.reverse());
    }

    /// Remove `count` items at `start`, returning them.
    pub fn splice(&self, start: usize, count: usize) -> Vec<Value> {
        let len = self.0.items.borrow().len();
        let start = start.min(len);
        let end = start.saturating_add(count).min(len);
        if start == end {
            return Vec::new();
        }
        self.mutate(|items| items.drain(start..end).collect())
    }
}

// ---------------------------------------------------------------------------
// ReactiveObject
// ---------------------------------------------------------------------------

struct ObjectInner {
    entries: RefCell<Vec<(String, Value)>>,
    deps: RefCell<AHashMap<String, Rc<Dep>>>,
    keys: Rc<Dep>,
}

/// Shared reactive object with insertion-ordered keys and per-key tracking.
#[derive(Clone)]
pub struct ReactiveObject(Rc<ObjectInner>);

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.entries.borrow().iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl ReactiveObject {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(ObjectInner {
            entries: RefCell::new(Vec::new()),
            deps: RefCell::new(AHashMap::new()),
            keys: Dep::new(),
        }))
    }

    #[must_use]
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Self::new();
        {
            let mut slots = obj.0.entries.borrow_mut();
            for (k, v) in entries {
                let k = k.into();
                match slots.iter_mut().find(|(name, _)| *name == k) {
                    Some(slot) => slot.1 = v,
                    None => slots.push((k, v)),
                }
            }
        }
        obj
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn key_dep(&self, key: &str) -> Rc<Dep> {
        let mut deps = self.0.deps.borrow_mut();
        match deps.get(key) {
            Some(dep) => Rc::clone(dep),
            None => {
                let dep = Dep::new();
                deps.insert(key.to_string(), Rc::clone(&dep));
                dep
            }
        }
    }

    /// Tracked read. Missing keys are tracked too, so adding them later
    /// notifies the reader.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.key_dep(key).track();
        self.peek(key)
    }

    /// Tracked membership test.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.key_dep(key).track();
        self.has_own(key)
    }

    /// Untracked read.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.0
            .entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Untracked membership test.
    #[must_use]
    pub fn has_own(&self, key: &str) -> bool {
        self.0.entries.borrow().iter().any(|(k, _)| k == key)
    }

    /// Write a key, notifying readers unless the value is unchanged.
    pub fn set(&self, key: &str, value: Value) {
        let added = {
            let mut entries = self.0.entries.borrow_mut();
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, current)) if current.same(&value) => return,
                Some((_, current)) => {
                    *current = value;
                    false
                }
                None => {
                    entries.push((key.to_string(), value));
                    true
                }
            }
        };
        let dep = self.0.deps.borrow().get(key).cloned();
        if let Some(dep) = dep {
            dep.trigger();
        }
        if added {
            self.0.keys.trigger();
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = {
            let mut entries = self.0.entries.borrow_mut();
            let idx = entries.iter().position(|(k, _)| k == key)?;
            entries.remove(idx).1
        };
        let dep = self.0.deps.borrow().get(key).cloned();
        if let Some(dep) = dep {
            dep.trigger();
        }
        self.0.keys.trigger();
        Some(removed)
    }

    /// Tracked key list in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.keys.track();
        self.0
            .entries
            .borrow()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Tracked entries; tracks the key set and every value.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.keys.track();
        let entries = self.0.entries.borrow().clone();
        for (k, _) in &entries {
            self.key_dep(k).track();
        }
        entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.keys.track();
        self.0.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
