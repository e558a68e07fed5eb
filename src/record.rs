//! Shared types for event records and derived metric records.
//!
//! Input records are flat name/value maps; any field whose name carries the
//! three-segment dotted pattern `priority.instance.period` can be expanded
//! into a [`DerivedRecord`] by the splitter.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag carried by every derived record so downstream consumers can
/// recognize expanded metric fields.
pub const PARSED_METRIC_TAG: &str = "parsedMetric";

/// A single input event record: an insertion-ordered mapping from field
/// name to field value.
///
/// Values are carried verbatim (text or number-like text). Field iteration
/// order is insertion order, which for JSON-lines input is document order.
pub type EventRecord = IndexMap<String, Value>;

/// Greedy, non-anchored match for the first three dot-delimited runs of a
/// field name. Segments may be empty; trailing content after the third
/// segment (including further dots) is ignored.
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^.]*)\.([^.]*)\.([^.]*)").expect("invalid regex"));

/// The decomposed parts of a dotted metric field name.
///
/// A field name decomposes when it contains at least two dots; the first
/// three dot-delimited runs become `priority`, `instance`, and `period`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricKey {
    pub priority: String,
    pub instance: String,
    pub period: String,
}

impl MetricKey {
    /// Decompose a field name into its three segments.
    ///
    /// Returns `None` for names with fewer than two dots. Matching is
    /// greedy left-to-right: `"10.app1.cpu.5min"` decomposes to
    /// `("10", "app1", "cpu")`.
    pub fn decompose(name: &str) -> Option<Self> {
        let captures = KEY_PATTERN.captures(name)?;
        Some(Self {
            priority: captures[1].to_string(),
            instance: captures[2].to_string(),
            period: captures[3].to_string(),
        })
    }
}

/// A record derived from one matching field of an input record.
///
/// Carries the decomposed key segments, the field's original value, and an
/// optional running diff (present only when the splitter was configured
/// with a period filter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub priority: String,
    pub instance: String,
    pub period: String,

    /// The original field value, verbatim.
    pub value: Value,

    /// Difference against the previous value observed for this
    /// (priority, instance) pair. On the pair's first sighting this equals
    /// the coerced value itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<i64>,

    /// Always [`PARSED_METRIC_TAG`].
    pub tag: String,
}

impl DerivedRecord {
    /// Create a derived record with no diff attribute.
    pub fn new(key: MetricKey, value: Value) -> Self {
        Self {
            priority: key.priority,
            instance: key.instance,
            period: key.period,
            value,
            diff: None,
            tag: PARSED_METRIC_TAG.to_string(),
        }
    }

    /// Create a derived record carrying a computed diff.
    pub fn with_diff(key: MetricKey, value: Value, diff: i64) -> Self {
        Self {
            diff: Some(diff),
            ..Self::new(key, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decompose_three_segments() {
        let key = MetricKey::decompose("10.app1.cpu").unwrap();
        assert_eq!(key.priority, "10");
        assert_eq!(key.instance, "app1");
        assert_eq!(key.period, "cpu");
    }

    #[test]
    fn decompose_ignores_trailing_segments() {
        let key = MetricKey::decompose("10.app1.cpu.5min").unwrap();
        assert_eq!(key.priority, "10");
        assert_eq!(key.instance, "app1");
        assert_eq!(key.period, "cpu");
    }

    #[test]
    fn decompose_allows_empty_segments() {
        let key = MetricKey::decompose("..").unwrap();
        assert_eq!(key.priority, "");
        assert_eq!(key.instance, "");
        assert_eq!(key.period, "");

        let key = MetricKey::decompose("a..b").unwrap();
        assert_eq!(key.priority, "a");
        assert_eq!(key.instance, "");
        assert_eq!(key.period, "b");
    }

    #[test]
    fn decompose_rejects_fewer_than_two_dots() {
        assert!(MetricKey::decompose("metric").is_none());
        assert!(MetricKey::decompose("metric.cpu").is_none());
        assert!(MetricKey::decompose("").is_none());
    }

    #[test]
    fn event_record_preserves_document_order() {
        let json = r#"{"z.z.z": "1", "a.a.a": "2", "plain": "3"}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["z.z.z", "a.a.a", "plain"]);
    }

    #[test]
    fn derived_record_serializes_without_diff() {
        let record = DerivedRecord::new(
            MetricKey::decompose("10.app1.cpu").unwrap(),
            json!("5"),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["priority"], "10");
        assert_eq!(value["instance"], "app1");
        assert_eq!(value["period"], "cpu");
        assert_eq!(value["value"], "5");
        assert_eq!(value["tag"], "parsedMetric");
        assert!(value.get("diff").is_none());
    }

    #[test]
    fn derived_record_serializes_with_diff() {
        let record = DerivedRecord::with_diff(
            MetricKey::decompose("10.app1.cpu").unwrap(),
            json!("8"),
            3,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["diff"], 3);
        assert_eq!(value["tag"], "parsedMetric");
    }
}
