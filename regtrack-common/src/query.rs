//! Search query compiler
//!
//! Translates a flat mapping of query-string keys to values into
//! Mongo-style match fragments (`serde_json::Value` objects) that the
//! record store's filter evaluator understands. Pure functions: no I/O,
//! no clock.
//!
//! Unknown keys and prefixes compile to an empty fragment `{}` rather
//! than erroring, so forward-compatible UI filters never break the API.

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// One query parameter value; multi-value parameters arrive already
/// split on commas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

/// Flat mapping of query keys to values
pub type QueryFields = BTreeMap<String, QueryValue>;

const DATE_RANGE_FROM_PREFIX: &str = "dateRangeFromFilter";
const DATE_RANGE_TO_PREFIX: &str = "dateRangeToFilter";
const NOR_PREFIX: &str = "(nor)";
const NE_PREFIX: &str = "(ne)";
const HAS_DOCUMENTS_KEY: &str = "hasDocuments";

/// Convert a single scalar query value into a match fragment
///
/// Number-like strings become numeric equality; `"true"`/`"false"`
/// become boolean equality, with `true` additionally carrying an
/// `active: true` companion clause (the soft-delete filter baked into
/// every boolean-true match); a `(ne)` prefix produces a not-equal
/// clause; anything else (including UUID strings) is plain string
/// equality.
pub fn get_converted_value(field: &str, value: &str) -> Value {
    if let Ok(n) = value.parse::<i64>() {
        return json!({ field: n });
    }
    if let Ok(x) = value.parse::<f64>() {
        return json!({ field: x });
    }
    match value {
        "true" => return json!({ field: true, "active": true }),
        "false" => return json!({ field: false }),
        _ => {}
    }
    if let Some(rest) = value.strip_prefix(NE_PREFIX) {
        return json!({ field: { "$ne": rest } });
    }
    json!({ field: value })
}

/// Compile a field mapping into an array of match fragments
///
/// Returns `None` for a missing mapping (not an empty array); callers
/// must check before spreading the fragments into an aggregation
/// pipeline. Each key contributes exactly one fragment; unrecognized
/// keys contribute `{}`.
pub fn generate_exp_array(fields: Option<&QueryFields>) -> Option<Vec<Value>> {
    let fields = fields?;

    let fragments = fields
        .iter()
        .map(|(key, value)| compile_field(key, value))
        .collect();

    Some(fragments)
}

fn compile_field(key: &str, value: &QueryValue) -> Value {
    if let Some(field) = key.strip_prefix(DATE_RANGE_FROM_PREFIX) {
        return compile_date_bound(field, value, DateBound::From);
    }
    if let Some(field) = key.strip_prefix(DATE_RANGE_TO_PREFIX) {
        return compile_date_bound(field, value, DateBound::To);
    }
    if key == HAS_DOCUMENTS_KEY {
        return compile_has_documents(value);
    }

    match value {
        QueryValue::Many(values) => {
            if let Some(field) = key.strip_prefix(NOR_PREFIX) {
                json!({ "$nor": per_element(field, values) })
            } else {
                json!({ "$or": per_element(key, values) })
            }
        }
        QueryValue::One(v) => {
            if key.starts_with('(') {
                // Unrecognized prefix on a scalar key: silently dropped
                Value::Object(Map::new())
            } else {
                get_converted_value(key, v)
            }
        }
    }
}

fn per_element(field: &str, values: &[String]) -> Vec<Value> {
    values
        .iter()
        .map(|v| get_converted_value(field, v))
        .collect()
}

enum DateBound {
    From,
    To,
}

/// Date-range bounds operate at one calendar day granularity regardless
/// of the time-of-day component supplied: `From` is the start of the
/// UTC day (inclusive), `To` is the start of the next UTC day
/// (exclusive).
fn compile_date_bound(field: &str, value: &QueryValue, bound: DateBound) -> Value {
    let raw = match value {
        QueryValue::One(v) => v,
        // A date filter never carries multiple values
        QueryValue::Many(_) => return Value::Object(Map::new()),
    };

    let Some(day) = parse_utc_day(raw) else {
        return Value::Object(Map::new());
    };

    match bound {
        DateBound::From => json!({ field: { "$gte": day_to_rfc3339(day) } }),
        DateBound::To => {
            // Unrepresentable next day only occurs at NaiveDate::MAX
            let Some(next) = day.checked_add_days(Days::new(1)) else {
                return Value::Object(Map::new());
            };
            json!({ field: { "$lt": day_to_rfc3339(next) } })
        }
    }
}

fn compile_has_documents(value: &QueryValue) -> Value {
    match value {
        QueryValue::One(v) if v == "true" => json!({ "documents": { "$not": { "$size": 0 } } }),
        QueryValue::One(v) if v == "false" => json!({ "documents": { "$size": 0 } }),
        _ => Value::Object(Map::new()),
    }
}

/// Parse an ISO date or datetime and truncate to its UTC calendar day
fn parse_utc_day(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    raw.parse::<NaiveDate>().ok()
}

fn day_to_rfc3339(day: NaiveDate) -> String {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
