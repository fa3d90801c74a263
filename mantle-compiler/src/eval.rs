//! Expression evaluation over JSON values.
//!
//! Evaluation is total: unknown names, missing members and type mismatches
//! all produce `null`, which renders as empty text.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Number, Value};

use mantle_renderer::RenderContext;

use crate::expr::{BinaryOp, Expr, UnaryOp};

// ---------------------------------------------------------------------------
// Locals
// ---------------------------------------------------------------------------

/// Lexically scoped local variables of one layer render.
#[derive(Debug, Default)]
pub struct Locals {
    frames: Vec<HashMap<String, Value>>,
}

impl Locals {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Bind `name` in the innermost frame.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if self.frames.is_empty() {
            self.frames.push(HashMap::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate `expr`; names resolve through locals, then globals, then the
/// model's top-level fields.
pub fn evaluate(expr: &Expr, locals: &Locals, ctx: &RenderContext<'_>) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Name(name) => locals
            .get(name)
            .or_else(|| ctx.global(name))
            .or_else(|| ctx.model().get(name))
            .cloned()
            .unwrap_or(Value::Null),
        Expr::Member(target, name) => member(&evaluate(target, locals, ctx), name),
        Expr::Index(target, index) => {
            let target = evaluate(target, locals, ctx);
            let index = evaluate(index, locals, ctx);
            index_value(&target, &index)
        }
        Expr::Unary(UnaryOp::Not, e) => Value::Bool(!truthy(&evaluate(e, locals, ctx))),
        Expr::Unary(UnaryOp::Neg, e) => match evaluate(e, locals, ctx) {
            Value::Number(n) => negate(&n),
            _ => Value::Null,
        },
        Expr::Binary(BinaryOp::Or, l, r) => {
            let left = evaluate(l, locals, ctx);
            if truthy(&left) {
                left
            } else {
                evaluate(r, locals, ctx)
            }
        }
        Expr::Binary(BinaryOp::And, l, r) => {
            let left = evaluate(l, locals, ctx);
            if truthy(&left) {
                evaluate(r, locals, ctx)
            } else {
                left
            }
        }
        Expr::Binary(op, l, r) => {
            let left = evaluate(l, locals, ctx);
            let right = evaluate(r, locals, ctx);
            binary(*op, &left, &right)
        }
    }
}

fn member(target: &Value, name: &str) -> Value {
    match (target, name) {
        (Value::Object(map), _) if map.contains_key(name) => map[name].clone(),
        (Value::Array(items), "length") => Value::from(items.len()),
        (Value::String(s), "length") => Value::from(s.chars().count()),
        (Value::Object(map), "length") => Value::from(map.len()),
        _ => Value::Null,
    }
}

fn index_value(target: &Value, index: &Value) -> Value {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn negate(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        return i.checked_neg().map(Value::from).unwrap_or(Value::Null);
    }
    n.as_f64()
        .and_then(|f| Number::from_f64(-f))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_eq(left, right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => match compare(left, right) {
            Some(ord) => Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }),
            None => Value::Null,
        },
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Or | BinaryOp::And => Value::Null,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Value::String(format!("{}{}", render_value(left), render_value(right)))
        }
        _ => arithmetic(left, right, i64::checked_add, |a, b| a + b),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Value::Null;
    };
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(result) = int_op(x, y) {
            return Value::from(result);
        }
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Number::from_f64(float_op(x, y))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// `null`, `false`, `0`, `""`, `[]` and `{}` are false; everything else true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a value as written to output.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Escape `&`, `<`, `>`, `"` and `'` for HTML text and attribute values.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Items visited by `<for each>`: array elements, or `{key, value}` pairs
/// for an object. Anything else iterates zero times.
pub fn iteration_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_expression;
    use rstest::rstest;
    use serde_json::json;

    fn eval_with(src: &str, model: &Value, locals: &Locals) -> Value {
        let expr = parse_expression(src).expect("parse");
        let mut sink = Vec::new();
        let ctx = RenderContext::new(model, &mut sink);
        evaluate(&expr, locals, &ctx)
    }

    fn eval(src: &str) -> Value {
        let model = json!({
            "name": "Ada",
            "age": 36,
            "items": [10, 20, 30],
            "user": {"email": "ada@example.com", "tags": []},
            "ratio": 0.5
        });
        eval_with(src, &model, &Locals::new())
    }

    #[rstest]
    #[case("name", json!("Ada"))]
    #[case("user.email", json!("ada@example.com"))]
    #[case("items[1]", json!(20))]
    #[case("items.length", json!(3))]
    #[case("name.length", json!(3))]
    #[case("user['email']", json!("ada@example.com"))]
    #[case("age + 1", json!(37))]
    #[case("age - 40", json!(-4))]
    #[case("ratio + 1", json!(1.5))]
    #[case("'n=' + age", json!("n=36"))]
    #[case("age >= 36 and name == 'Ada'", json!(true))]
    #[case("age == 36.0", json!(true))]
    #[case("missing or 'fallback'", json!("fallback"))]
    #[case("not user.tags", json!(true))]
    #[case("-age", json!(-36))]
    fn evaluates(#[case] src: &str, #[case] expected: Value) {
        assert_eq!(eval(src), expected);
    }

    #[rstest]
    #[case("missing")]
    #[case("missing.deeper.still")]
    #[case("items[99]")]
    #[case("items['x']")]
    #[case("name - 1")]
    #[case("user < 3")]
    #[case("-name")]
    fn mismatches_are_null(#[case] src: &str) {
        assert_eq!(eval(src), Value::Null);
    }

    #[test]
    fn locals_shadow_model_fields() {
        let model = json!({"name": "model"});
        let mut locals = Locals::new();
        locals.set("name", json!("outer"));
        locals.push();
        locals.set("name", json!("inner"));
        assert_eq!(eval_with("name", &model, &locals), json!("inner"));
        locals.pop();
        assert_eq!(eval_with("name", &model, &locals), json!("outer"));
    }

    #[test]
    fn truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy_value in [json!(true), json!(1), json!("x"), json!([0]), json!({"a": 1})] {
            assert!(truthy(&truthy_value), "{truthy_value} should be truthy");
        }
    }

    #[test]
    fn rendering_and_escaping() {
        assert_eq!(render_value(&json!(null)), "");
        assert_eq!(render_value(&json!("x")), "x");
        assert_eq!(render_value(&json!([1, 2])), "[1,2]");
        assert_eq!(html_escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn object_iteration_yields_pairs() {
        let items = iteration_items(json!({"a": 1}));
        assert_eq!(items, vec![json!({"key": "a", "value": 1})]);
        assert!(iteration_items(json!(5)).is_empty());
    }
}
