//! The conditional filter DSL: `{"field": ..., "operator": ..., "value": ...}`.
//!
//! Pure logic, no database access. Evaluation never fails: a path that does
//! not resolve, or operands of the wrong shape, simply do not match.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MatchError;
use crate::event::Event;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "in" => Some(Operator::In),
            "contains" => Some(Operator::Contains),
            _ => None,
        }
    }
}

/// A single field comparison against an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dot-path into the event (see [`Event::resolve_path`]).
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// Parse the stored JSON form.
    ///
    /// A missing `value` is read as `null`. An unrecognised operator is
    /// reported separately from a structurally invalid condition.
    pub fn from_value(dsl: &Value) -> Result<Self, MatchError> {
        let obj = dsl
            .as_object()
            .ok_or_else(|| MatchError::InvalidCondition("condition must be an object".into()))?;

        let field = obj
            .get("field")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| MatchError::InvalidCondition("missing \"field\"".into()))?;

        let op_name = obj
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| MatchError::InvalidCondition("missing \"operator\"".into()))?;
        let operator =
            Operator::parse(op_name).ok_or_else(|| MatchError::UnknownOperator(op_name.into()))?;

        Ok(Self {
            field: field.to_string(),
            operator,
            value: obj.get("value").cloned().unwrap_or(Value::Null),
        })
    }

    pub fn evaluate(&self, event: &Event) -> bool {
        match event.resolve_path(&self.field) {
            Some(actual) => compare(self.operator, &actual, &self.value),
            None => false,
        }
    }
}

/// Apply `op` to `actual` (resolved from the event) and `expected` (from
/// the rule).
pub fn compare(op: Operator, actual: &Value, expected: &Value) -> bool {
    match op {
        Operator::Eq => values_equal(actual, expected),
        Operator::Ne => !values_equal(actual, expected),
        Operator::Gt => numeric(actual, expected).is_some_and(|(a, b)| a > b),
        Operator::Gte => numeric(actual, expected).is_some_and(|(a, b)| a >= b),
        Operator::Lt => numeric(actual, expected).is_some_and(|(a, b)| a < b),
        Operator::Lte => numeric(actual, expected).is_some_and(|(a, b)| a <= b),
        Operator::In => match expected {
            Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
        Operator::Contains => match actual {
            Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
            Value::String(haystack) => expected
                .as_str()
                .is_some_and(|needle| haystack.contains(needle)),
            Value::Object(map) => expected.as_str().is_some_and(|key| map.contains_key(key)),
            _ => false,
        },
    }
}

/// Equality with numeric normalisation, so `3` equals `3.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Both operands as numbers. Numeric strings are coerced; anything else
/// makes the comparison fail.
fn numeric(a: &Value, b: &Value) -> Option<(f64, f64)> {
    Some((as_number(a)?, as_number(b)?))
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
