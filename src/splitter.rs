//! The key-decomposition and stateful-diff engine.
//!
//! [`KeyMetricSplitter`] consumes event records one at a time, expands each
//! field whose name matches the dotted `priority.instance.period` pattern
//! into a [`DerivedRecord`], and accumulates the results in an internal
//! buffer released only by [`drain`](KeyMetricSplitter::drain). When a
//! period filter is configured it additionally computes a running diff per
//! (priority, instance) pair.

use std::collections::HashMap;

use serde_json::Value;

use crate::record::{DerivedRecord, EventRecord, MetricKey};

/// Splits dotted metric fields out of event records.
///
/// The splitter is single-threaded and call-by-call: the host invokes
/// [`process`](Self::process) once per input record and periodically calls
/// [`drain`](Self::drain) to collect the derived records produced so far.
/// An input record handed to `process` is consumed - the host must not
/// forward it downstream.
///
/// State lives for the splitter's lifetime only; nothing is persisted.
///
/// # Example
///
/// ```
/// use metricsplit::{EventRecord, KeyMetricSplitter};
///
/// let mut splitter = KeyMetricSplitter::with_field("cpu");
///
/// let record: EventRecord =
///     serde_json::from_str(r#"{"10.app1.cpu": "5"}"#).unwrap();
/// splitter.process(&record);
///
/// let derived = splitter.drain();
/// assert_eq!(derived.len(), 1);
/// assert_eq!(derived[0].diff, Some(5));
/// ```
#[derive(Debug, Default)]
pub struct KeyMetricSplitter {
    /// Optional period filter. When set, only fields whose third key
    /// segment equals it are expanded, and diffing is active.
    field: Option<String>,

    /// Last observed value per (priority, instance) pair. Written only
    /// when a field passes the period filter; never cleared.
    last_values: HashMap<(String, String), i64>,

    /// Derived records awaiting the next drain, in emission order.
    pending: Vec<DerivedRecord>,
}

impl KeyMetricSplitter {
    /// Create a splitter with no period filter.
    ///
    /// Every matching field is expanded; no diff attribute is computed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a splitter filtered to one period value.
    ///
    /// Only fields whose third key segment equals `field` are expanded,
    /// and each derived record carries a running diff keyed by the
    /// (priority, instance) pair.
    pub fn with_field(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::default()
        }
    }

    /// The configured period filter, if any.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Number of derived records awaiting the next drain.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Expand every matching field of `record` into the pending buffer.
    ///
    /// Fields are visited in the record's insertion order. Names with
    /// fewer than two dots are skipped silently; two names decomposing to
    /// the same key are expanded independently, each seeing the diff state
    /// left by the one before it. The record itself is read-only and is
    /// considered consumed once this returns.
    pub fn process(&mut self, record: &EventRecord) {
        for (name, value) in record {
            let Some(key) = MetricKey::decompose(name) else {
                continue;
            };

            match &self.field {
                Some(field) => {
                    if key.period != *field {
                        continue;
                    }
                    let current = leading_int(value);
                    let pair = (key.priority.clone(), key.instance.clone());
                    let diff = match self.last_values.get(&pair) {
                        Some(previous) => current - previous,
                        None => current,
                    };
                    self.last_values.insert(pair, current);
                    self.pending.push(DerivedRecord::with_diff(key, value.clone(), diff));
                }
                None => {
                    self.pending.push(DerivedRecord::new(key, value.clone()));
                }
            }
        }
    }

    /// Remove and return all pending derived records, in emission order.
    ///
    /// Draining with nothing pending returns an empty vector; two
    /// consecutive drains return the accumulated records then nothing.
    pub fn drain(&mut self) -> Vec<DerivedRecord> {
        std::mem::take(&mut self.pending)
    }
}

/// Coerce a field value to an integer by the leading-numeric-prefix rule.
///
/// Text values parse as an optional run of leading whitespace, an optional
/// sign, then the longest run of ASCII digits; an empty digit run yields 0
/// and accumulation saturates at the i64 bounds. JSON numbers are taken
/// directly, truncating non-integral floats toward zero. Anything else
/// coerces to 0.
fn leading_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(v) => v,
            None => n.as_f64().map_or(0, |f| f as i64),
        },
        Value::String(s) => leading_int_str(s),
        _ => 0,
    }
}

fn leading_int_str(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let mut value: i64 = 0;
    for c in digits.chars() {
        let Some(d) = c.to_digit(10) else {
            break;
        };
        value = value.saturating_mul(10).saturating_add(d as i64);
    }

    if negative {
        -value
    } else {
        value
    }
}
