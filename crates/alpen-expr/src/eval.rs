#![forbid(unsafe_code)]

//! Tree-walking evaluator.
//!
//! Name resolution and writes go through an [`Environment`]; container
//! reads go through the reactive containers, so evaluating inside an effect
//! records every value the expression touched.
//!
//! # Failure Modes
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Unknown identifier | `Reference` error (`typeof x` yields `"undefined"` instead) |
//! | Property read on `null` / `undefined` | `Type` error |
//! | Call of a non-method | `Type` error |
//! | Write to a non-container or unknown name | `Assignment` error |

use alpen_reactive::{ReactiveArray, Value};

use crate::ast::{BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use crate::error::ExpressionError;

/// Name resolution for evaluation.
pub trait Environment {
    /// Resolve `name`, or `None` if it is not defined anywhere.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Write `name`. Returns `false` if the environment refuses the write.
    fn assign(&self, name: &str, value: Value) -> bool;
}

/// Fixed local bindings layered over a parent environment.
///
/// Locals are read-only; writes to any other name go to the parent.
pub struct LocalEnvironment<'a> {
    locals: Vec<(String, Value)>,
    parent: &'a dyn Environment,
}

impl<'a> LocalEnvironment<'a> {
    #[must_use]
    pub fn new(parent: &'a dyn Environment) -> Self {
        Self {
            locals: Vec::new(),
            parent,
        }
    }

    /// Add or shadow a binding.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.locals.retain(|(n, _)| *n != name);
        self.locals.push((name, value));
        self
    }
}

impl Environment for LocalEnvironment<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.locals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .or_else(|| self.parent.lookup(name))
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        if self.locals.iter().any(|(n, _)| n == name) {
            return false;
        }
        self.parent.assign(name, value)
    }
}

/// Evaluate `expr` against `env`.
pub fn evaluate(expr: &Expr, env: &dyn Environment) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(lit) => Ok(literal(lit)),
        Expr::Ident(name) => env
            .lookup(name)
            .ok_or_else(|| ExpressionError::reference(name)),
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, env))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::array(values))
        }
        Expr::Object(entries) => {
            let mut values = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                values.push((key.clone(), evaluate(value, env)?));
            }
            Ok(Value::object(values))
        }
        Expr::Member(object, name) => {
            let object = evaluate(object, env)?;
            property(&object, name)
        }
        Expr::Index(object, index) => {
            let object = evaluate(object, env)?;
            let index = evaluate(index, env)?;
            index_value(&object, &index)
        }
        Expr::Call(callee, args) => call(callee, args, env),
        Expr::Arrow(..) => Err(ExpressionError::type_error(
            "arrow functions are only supported as method arguments",
        )),
        Expr::Unary(op, operand) => unary(*op, operand, env),
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            Ok(binary(*op, &lhs, &rhs))
        }
        Expr::Logical(op, lhs, rhs) => {
            let lhs = evaluate(lhs, env)?;
            let short_circuit = match op {
                LogicalOp::And => !lhs.is_truthy(),
                LogicalOp::Or => lhs.is_truthy(),
                LogicalOp::Nullish => !lhs.is_nullish(),
            };
            if short_circuit {
                Ok(lhs)
            } else {
                evaluate(rhs, env)
            }
        }
        Expr::Conditional(test, then, otherwise) => {
            if evaluate(test, env)?.is_truthy() {
                evaluate(then, env)
            } else {
                evaluate(otherwise, env)
            }
        }
        Expr::Assign(op, target, value) => {
            let value = evaluate(value, env)?;
            let value = match op.binary() {
                Some(bin) => binary(bin, &evaluate(target, env)?, &value),
                None => value,
            };
            write(target, value.clone(), env)?;
            Ok(value)
        }
        Expr::Update {
            increment,
            prefix,
            target,
        } => {
            let old = evaluate(target, env)?.as_number();
            let new = if *increment { old + 1.0 } else { old - 1.0 };
            write(target, Value::Number(new), env)?;
            Ok(Value::Number(if *prefix { new } else { old }))
        }
        Expr::Sequence(items) => {
            let mut last = Value::Undefined;
            for item in items {
                last = evaluate(item, env)?;
            }
            Ok(last)
        }
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::from(s.as_str()),
    }
}

fn unary(op: UnaryOp, operand: &Expr, env: &dyn Environment) -> Result<Value, ExpressionError> {
    if op == UnaryOp::TypeOf {
        if let Expr::Ident(name) = operand {
            let value = env.lookup(name).unwrap_or_default();
            return Ok(Value::from(type_of(&value)));
        }
    }
    let value = evaluate(operand, env)?;
    Ok(match op {
        UnaryOp::Not => Value::Bool(!value.is_truthy()),
        UnaryOp::Neg => Value::Number(-value.as_number()),
        UnaryOp::Plus => Value::Number(value.as_number()),
        UnaryOp::TypeOf => Value::from(type_of(&value)),
    })
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
        other => other.type_name(),
    }
}

/// Apply a binary operator with script coercion rules.
#[must_use]
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub => Value::Number(lhs.as_number() - rhs.as_number()),
        BinaryOp::Mul => Value::Number(lhs.as_number() * rhs.as_number()),
        BinaryOp::Div => Value::Number(lhs.as_number() / rhs.as_number()),
        BinaryOp::Rem => Value::Number(lhs.as_number() % rhs.as_number()),
        BinaryOp::Eq => Value::Bool(loose_eq(lhs, rhs)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(lhs, rhs)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(lhs, rhs)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_eq(lhs, rhs)),
        BinaryOp::Less => Value::Bool(compare(lhs, rhs).is_some_and(|o| o.is_lt())),
        BinaryOp::LessEq => Value::Bool(compare(lhs, rhs).is_some_and(|o| o.is_le())),
        BinaryOp::Greater => Value::Bool(compare(lhs, rhs).is_some_and(|o| o.is_gt())),
        BinaryOp::GreaterEq => Value::Bool(compare(lhs, rhs).is_some_and(|o| o.is_ge())),
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Array(_) | Value::Object(_))
}

fn add(lhs: &Value, rhs: &Value) -> Value {
    if is_textual(lhs) || is_textual(rhs) {
        let mut out = lhs.to_key_string();
        out.push_str(&rhs.to_key_string());
        Value::from(out)
    } else {
        Value::Number(lhs.as_number() + rhs.as_number())
    }
}

/// `===`: same type and value; `NaN` is unequal to itself.
#[must_use]
pub fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a == b,
        _ => lhs.same(rhs),
    }
}

/// `==` with the usual primitive coercions.
#[must_use]
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => lhs.as_number() == rhs.as_number(),
        (Value::Array(_) | Value::Object(_), Value::String(_) | Value::Number(_)) => {
            loose_eq(&Value::from(lhs.to_key_string()), rhs)
        }
        (Value::String(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
            loose_eq(lhs, &Value::from(rhs.to_key_string()))
        }
        _ => strict_eq(lhs, rhs),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.as_number().partial_cmp(&rhs.as_number()),
    }
}

fn array_index(index: &Value) -> Option<usize> {
    let n = match index {
        Value::Number(n) => *n,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0 && n < usize::MAX as f64).then_some(n as usize)
}

fn property(object: &Value, name: &str) -> Result<Value, ExpressionError> {
    match object {
        Value::Undefined | Value::Null => Err(ExpressionError::type_error(format!(
            "cannot read properties of {} (reading '{name}')",
            object.type_name()
        ))),
        Value::Object(obj) => Ok(obj.get(name).unwrap_or_default()),
        Value::Array(arr) => Ok(match name {
            "length" => Value::from(arr.len()),
            _ => array_index(&Value::from(name))
                .and_then(|i| arr.get(i))
                .unwrap_or_default(),
        }),
        Value::String(s) => Ok(match name {
            "length" => Value::from(s.chars().count()),
            _ => Value::Undefined,
        }),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

fn index_value(object: &Value, index: &Value) -> Result<Value, ExpressionError> {
    match (object, array_index(index)) {
        (Value::Array(arr), Some(i)) => Ok(arr.get(i).unwrap_or_default()),
        (Value::String(s), Some(i)) => Ok(s
            .chars()
            .nth(i)
            .map_or(Value::Undefined, |c| Value::from(c.to_string()))),
        _ => property(object, &index.to_key_string()),
    }
}

fn write(target: &Expr, value: Value, env: &dyn Environment) -> Result<(), ExpressionError> {
    match target {
        Expr::Ident(name) => {
            if env.assign(name, value) {
                Ok(())
            } else {
                Err(ExpressionError::assignment(format!(
                    "cannot assign to `{name}`"
                )))
            }
        }
        Expr::Member(object, name) => {
            let object = evaluate(object, env)?;
            set_property(&object, name, value)
        }
        Expr::Index(object, index) => {
            let object = evaluate(object, env)?;
            let index = evaluate(index, env)?;
            match (&object, array_index(&index)) {
                (Value::Array(arr), Some(i)) => {
                    arr.set(i, value);
                    Ok(())
                }
                _ => set_property(&object, &index.to_key_string(), value),
            }
        }
        _ => Err(ExpressionError::assignment("invalid assignment target")),
    }
}

fn set_property(object: &Value, name: &str, value: Value) -> Result<(), ExpressionError> {
    match object {
        Value::Object(obj) => {
            obj.set(name, value);
            Ok(())
        }
        Value::Array(arr) => match array_index(&Value::from(name)) {
            Some(i) => {
                arr.set(i, value);
                Ok(())
            }
            None => Err(ExpressionError::assignment(format!(
                "cannot set property '{name}' of an array"
            ))),
        },
        other => Err(ExpressionError::assignment(format!(
            "cannot set property '{name}' of {}",
            other.type_name()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

enum Arg<'e> {
    Value(Value),
    Func(&'e [String], &'e Expr),
}

impl Arg<'_> {
    fn value(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Func(..) => Value::Undefined,
        }
    }
}

fn call(callee: &Expr, args: &[Expr], env: &dyn Environment) -> Result<Value, ExpressionError> {
    let Expr::Member(receiver, method) = callee else {
        let name = match callee {
            Expr::Ident(name) => name.as_str(),
            _ => "expression",
        };
        return Err(ExpressionError::type_error(format!("{name} is not a function")));
    };
    let receiver = evaluate(receiver, env)?;
    let args = args
        .iter()
        .map(|arg| match arg {
            Expr::Arrow(params, body) => Ok(Arg::Func(params, body)),
            other => evaluate(other, env).map(Arg::Value),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let arg = |i: usize| args.get(i).map(Arg::value).unwrap_or_default();
    match &receiver {
        Value::Array(arr) => array_method(arr, method, &args, env),
        Value::String(s) => string_method(s, method, &arg),
        Value::Number(n) if method == "toFixed" => {
            let digits = arg(0).as_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 20.0) as usize };
            Ok(Value::from(format!("{n:.digits$}")))
        }
        Value::Object(obj) if method == "hasOwnProperty" => {
            Ok(Value::Bool(obj.contains_key(&arg(0).to_key_string())))
        }
        Value::Undefined | Value::Null => Err(ExpressionError::type_error(format!(
            "cannot read properties of {} (reading '{method}')",
            receiver.type_name()
        ))),
        _ if method == "toString" => Ok(Value::from(receiver.to_key_string())),
        _ => Err(ExpressionError::type_error(format!(
            "{method} is not a function"
        ))),
    }
}

/// Call an arrow argument with positional values.
fn invoke(
    func: &Arg<'_>,
    values: &[Value],
    env: &dyn Environment,
) -> Result<Value, ExpressionError> {
    let Arg::Func(params, body) = func else {
        return Err(ExpressionError::type_error(format!(
            "{} is not a function",
            func.value().to_key_string()
        )));
    };
    let mut scope = LocalEnvironment::new(env);
    for (param, value) in params.iter().zip(values) {
        scope = scope.with(param.clone(), value.clone());
    }
    evaluate(body, &scope)
}

fn array_method(
    arr: &ReactiveArray,
    method: &str,
    args: &[Arg<'_>],
    env: &dyn Environment,
) -> Result<Value, ExpressionError> {
    let arg = |i: usize| args.get(i).map(Arg::value).unwrap_or_default();
    let func = || {
        args.first()
            .ok_or_else(|| ExpressionError::type_error("undefined is not a function"))
    };
    let collection = Value::Array(arr.clone());
    Ok(match method {
        "push" => {
            let mut len = 0;
            for a in args {
                len = arr.push(a.value());
            }
            if args.is_empty() {
                len = arr.len();
            }
            Value::from(len)
        }
        "pop" => arr.pop().unwrap_or_default(),
        "shift" => arr.shift().unwrap_or_default(),
        "unshift" => {
            for a in args.iter().rev() {
                arr.unshift(a.value());
            }
            Value::from(arr.len())
        }
        "splice" => {
            let len = arr.len();
            let start = relative_index(arg(0).as_number(), len);
            let count = if args.len() < 2 {
                len
            } else {
                let c = arg(1).as_number();
                if c.is_nan() || c < 0.0 { 0 } else { c as usize }
            };
            Value::array(arr.splice(start, count))
        }
        "reverse" => {
            arr.reverse();
            collection
        }
        "indexOf" => {
            let needle = arg(0);
            arr.to_vec()
                .iter()
                .position(|v| strict_eq(v, &needle))
                .map_or(Value::Number(-1.0), Value::from)
        }
        "includes" => {
            let needle = arg(0);
            Value::Bool(arr.to_vec().iter().any(|v| v.same(&needle)))
        }
        "join" => {
            let sep = match arg(0) {
                Value::Undefined => ",".to_string(),
                other => other.to_key_string(),
            };
            Value::from(
                arr.to_vec()
                    .iter()
                    .map(Value::to_text)
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "slice" => {
            let items = arr.to_vec();
            let len = items.len();
            let start = relative_index(arg(0).as_number(), len);
            let end = match arg(1) {
                Value::Undefined => len,
                other => relative_index(other.as_number(), len),
            };
            Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "concat" => {
            let mut items = arr.to_vec();
            for a in args {
                match a.value() {
                    Value::Array(other) => items.extend(other.to_vec()),
                    other => items.push(other),
                }
            }
            Value::array(items)
        }
        "filter" | "map" | "find" | "findIndex" | "some" | "every" | "forEach" => {
            let f = func()?;
            let items = arr.to_vec();
            let mut mapped = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let result =
                    invoke(f, &[item.clone(), Value::from(i), collection.clone()], env)?;
                match method {
                    "filter" if result.is_truthy() => mapped.push(item.clone()),
                    "map" => mapped.push(result),
                    "find" if result.is_truthy() => return Ok(item.clone()),
                    "findIndex" if result.is_truthy() => return Ok(Value::from(i)),
                    "some" if result.is_truthy() => return Ok(Value::Bool(true)),
                    "every" if !result.is_truthy() => return Ok(Value::Bool(false)),
                    _ => {}
                }
            }
            match method {
                "filter" | "map" => Value::array(mapped),
                "findIndex" => Value::Number(-1.0),
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                _ => Value::Undefined,
            }
        }
        _ => {
            return Err(ExpressionError::type_error(format!(
                "{method} is not a function"
            )));
        }
    })
}

fn relative_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        0
    } else if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

fn string_method(
    s: &str,
    method: &str,
    arg: &dyn Fn(usize) -> Value,
) -> Result<Value, ExpressionError> {
    let text = |i: usize| arg(i).to_key_string();
    Ok(match method {
        "toUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim()),
        "includes" => Value::Bool(s.contains(text(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text(0).as_str())),
        "indexOf" => s
            .find(text(0).as_str())
            .map_or(Value::Number(-1.0), |byte| Value::from(s[..byte].chars().count())),
        "split" => {
            let sep = text(0);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::from(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(Value::from).collect()
            };
            Value::array(parts)
        }
        "toString" => Value::from(s),
        _ => {
            return Err(ExpressionError::type_error(format!(
                "{method} is not a function"
            )));
        }
    })
}
