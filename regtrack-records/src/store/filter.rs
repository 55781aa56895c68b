//! Match-fragment evaluator
//!
//! Evaluates the Mongo-style filter subset produced by the query
//! compiler (and used internally by the engines) against JSON
//! documents. Supported: implicit AND over object keys, `$or`, `$nor`,
//! `$and`, `$ne`, `$gte`, `$lt`, `$in`, `$size`, `$not`, `$exists`,
//! dotted field paths, and Mongo array-contains equality (a filter of
//! `{_flavourRecords: id}` matches when the array contains the id).
//!
//! Ordered comparisons on strings first try RFC 3339 datetimes so that
//! sub-second timestamps order correctly against whole-second bounds.

use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;

/// Whether a document matches a filter. The empty filter `{}` matches
/// every document.
pub fn matches(doc: &Value, filter: &Value) -> bool {
    let Some(obj) = filter.as_object() else {
        return false;
    };

    obj.iter().all(|(key, expected)| match key.as_str() {
        "$or" => expected
            .as_array()
            .is_some_and(|fs| fs.iter().any(|f| matches(doc, f))),
        "$nor" => expected
            .as_array()
            .is_some_and(|fs| !fs.iter().any(|f| matches(doc, f))),
        "$and" => expected
            .as_array()
            .is_some_and(|fs| fs.iter().all(|f| matches(doc, f))),
        field => field_matches(lookup_path(doc, field), expected),
    })
}

/// Resolve a dotted field path against a document
fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    if let Some(ops) = operator_object(expected) {
        return ops.iter().all(|(op, arg)| apply_op(actual, op, arg));
    }
    eq_or_contains(actual, expected)
}

/// An object whose keys all start with `$` is an operator expression;
/// anything else is a literal to compare against
fn operator_object(expected: &Value) -> Option<&serde_json::Map<String, Value>> {
    let obj = expected.as_object()?;
    if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) {
        Some(obj)
    } else {
        None
    }
}

fn apply_op(actual: Option<&Value>, op: &str, arg: &Value) -> bool {
    match op {
        "$ne" => !eq_or_contains(actual, arg),
        "$gte" => compare(actual, arg).is_some_and(|o| o != Ordering::Less),
        "$lt" => compare(actual, arg) == Some(Ordering::Less),
        "$in" => arg
            .as_array()
            .is_some_and(|vs| vs.iter().any(|v| eq_or_contains(actual, v))),
        "$size" => actual
            .and_then(Value::as_array)
            .zip(arg.as_u64())
            .is_some_and(|(a, n)| a.len() as u64 == n),
        "$not" => {
            let inner = match operator_object(arg) {
                Some(ops) => ops,
                None => return false,
            };
            !inner.iter().all(|(op, arg)| apply_op(actual, op, arg))
        }
        "$exists" => {
            let present = actual.is_some_and(|v| !v.is_null());
            arg.as_bool().is_some_and(|want| present == want)
        }
        // Unknown operator never matches
        _ => false,
    }
}

/// Equality with Mongo array-contains semantics and loose numeric
/// comparison (integer 5 equals float 5.0)
fn eq_or_contains(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        // Absent field equals an explicit null
        return expected.is_null();
    };

    if values_equal(actual, expected) {
        return true;
    }

    if !expected.is_array() {
        if let Some(elements) = actual.as_array() {
            return elements.iter().any(|e| values_equal(e, expected));
        }
    }

    false
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn compare(actual: Option<&Value>, bound: &Value) -> Option<Ordering> {
    let actual = actual?;
    match (actual, bound) {
        (Value::String(a), Value::String(b)) => {
            if let (Ok(da), Ok(db)) =
                (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b))
            {
                Some(da.cmp(&db))
            } else {
                Some(a.as_str().cmp(b.as_str()))
            }
        }
        _ => {
            let (x, y) = (actual.as_f64()?, bound.as_f64()?);
            x.partial_cmp(&y)
        }
    }
}
