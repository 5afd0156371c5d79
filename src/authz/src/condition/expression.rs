//! Expression-condition operators and operand coercion
//!
//! Expression conditions compare a scalar extracted from a semi-structured
//! document field against a configured value. Both operands are coerced to
//! the condition's declared value type before the comparison; anything that
//! cannot be coerced makes the condition unsatisfied rather than an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of an expression condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Contains,
}

/// Type both operands are coerced to before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
}

/// A coerced scalar operand
///
/// Comparisons only ever happen between operands coerced to the same
/// [`ValueType`], so cross-variant ordering never occurs.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum Operand {
    Boolean(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

fn coerce(value: &Value, value_type: ValueType) -> Option<Operand> {
    match value_type {
        ValueType::String => match value {
            Value::String(s) => Some(Operand::Text(s.clone())),
            Value::Number(n) => Some(Operand::Text(n.to_string())),
            Value::Bool(b) => Some(Operand::Text(b.to_string())),
            _ => None,
        },
        ValueType::Number => match value {
            Value::Number(n) => n.as_f64().map(Operand::Number),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Operand::Number),
            _ => None,
        },
        ValueType::Boolean => match value {
            Value::Bool(b) => Some(Operand::Boolean(*b)),
            Value::String(s) => match s.as_str() {
                "true" => Some(Operand::Boolean(true)),
                "false" => Some(Operand::Boolean(false)),
                _ => None,
            },
            _ => None,
        },
        ValueType::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(Operand::Date),
            _ => None,
        },
    }
}

/// Extract a sub-value from a document via a `$.a.b` path
///
/// `$` denotes the document root; each following segment selects an object
/// key, or an element when the current value is an array and the segment
/// parses as an index. Returns `None` when any segment is missing.
pub fn extract<'a>(document: &'a Value, sub_expression: &str) -> Option<&'a Value> {
    let path = sub_expression.strip_prefix('$').unwrap_or(sub_expression);
    let path = path.strip_prefix('.').unwrap_or(path);

    if path.is_empty() {
        return Some(document);
    }

    let mut current = document;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Compare a document value against an expected value
///
/// Returns false (never an error) when either operand cannot be coerced to
/// `value_type`. `Contains` accepts an array on the left (element equality
/// after coercion) or, for string operands, a substring test.
pub fn compare(document_value: &Value, operator: Operator, expected: &Value, value_type: ValueType) -> bool {
    if operator == Operator::Contains {
        return contains(document_value, expected, value_type);
    }

    let (left, right) = match (coerce(document_value, value_type), coerce(expected, value_type)) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };

    match operator {
        Operator::Equal => left == right,
        Operator::NotEqual => left != right,
        Operator::LessThan => left < right,
        Operator::LessThanOrEqual => left <= right,
        Operator::GreaterThan => left > right,
        Operator::GreaterThanOrEqual => left >= right,
        // Contains returned above
        Operator::Contains => false,
    }
}

fn contains(document_value: &Value, expected: &Value, value_type: ValueType) -> bool {
    match document_value {
        Value::Array(items) => {
            let Some(needle) = coerce(expected, value_type) else {
                return false;
            };
            items
                .iter()
                .any(|item| coerce(item, value_type).as_ref() == Some(&needle))
        }
        Value::String(haystack) => match expected {
            Value::String(needle) => haystack.contains(needle.as_str()),
            _ => false,
        },
        _ => false,
    }
}
