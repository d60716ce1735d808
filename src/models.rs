//! Core Data Models
//!
//! Data flows through these models in sequence:
//!
//! 1. **Raw data**: [`DaySample`] / [`RawReport`] - one day's capped sample
//!    exactly as the search API returned it, cached for the session
//! 2. **Normalization**: [`Annotation`] / [`Condition`] - the parsed
//!    annotation blob, with legacy bare-string conditions rewritten into
//!    the canonical `{name}` shape at decode time
//! 3. **Derived records**: [`NormalizedReport`] - parsed date, parsed
//!    annotation, derived signature, plus the originating raw report
//!
//! Raw data is immutable once fetched; normalized records are rebuilt on
//! every run and shared downstream behind `Arc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The report field carrying the annotation blob (a JSON string), and
/// the search parameter used to exclude reports without one.
pub const ANNOTATION_FIELD: &str = "async_shutdown_timeout";

/// One record as returned by the server. Unrecognized fields are kept
/// in `extra` so nothing is lost between fetch and cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    pub product: String,
    pub version: String,
    /// ISO date string, parsed during normalization.
    pub date: String,
    pub build_id: String,
    pub release_channel: String,
    pub uuid: String,
    /// The annotation blob, JSON encoded as a string.
    #[serde(rename = "async_shutdown_timeout")]
    pub annotation_json: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One day's sample. `total` is the server's unfiltered count before
/// capping, always >= `hits.len()`, and is what the extrapolation
/// factor is derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySample {
    pub total: u64,
    pub hits: Vec<RawReport>,
}

/// One named fault-indicating entry inside an annotation, optionally
/// carrying a call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConditionRepr")]
pub struct Condition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

/// Wire shape of a condition. Older annotations encode a condition as
/// a bare string; both forms decode into the canonical [`Condition`].
#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionRepr {
    Full {
        name: String,
        #[serde(default)]
        stack: Option<Vec<String>>,
    },
    Legacy(String),
}

impl From<ConditionRepr> for Condition {
    fn from(repr: ConditionRepr) -> Self {
        match repr {
            ConditionRepr::Full { name, stack } => Condition { name, stack },
            ConditionRepr::Legacy(name) => Condition { name, stack: None },
        }
    }
}

/// The parsed annotation blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A raw report after normalization: parsed date, parsed annotation,
/// derived signature. Read-only downstream.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedReport {
    pub date: DateTime<Utc>,
    pub annotation: Annotation,
    /// Sorted condition names joined with `" | "`. Never empty.
    pub signature: String,
    pub product: String,
    pub version: String,
    pub build_id: String,
    pub release_channel: String,
    pub uuid: String,
    /// The originating server record.
    #[serde(skip)]
    pub raw: RawReport,
}

impl NormalizedReport {
    /// The `"product version"` key used for per-version grouping.
    pub fn version_key(&self) -> String {
        format!("{} {}", self.product, self.version)
    }

    pub fn is_nightly(&self) -> bool {
        self.release_channel == "nightly"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_object_form() {
        let condition: Condition =
            serde_json::from_str(r#"{"name": "profile-before-change", "stack": ["a", "b"]}"#)
                .unwrap();
        assert_eq!(condition.name, "profile-before-change");
        assert_eq!(condition.stack, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_condition_legacy_string_form() {
        let condition: Condition = serde_json::from_str(r#""quit-application""#).unwrap();
        assert_eq!(condition.name, "quit-application");
        assert_eq!(condition.stack, None);
    }

    #[test]
    fn test_raw_report_keeps_unknown_fields() {
        let report: RawReport = serde_json::from_str(
            r#"{
                "product": "Firefox",
                "version": "41.0a1",
                "date": "2015-06-01T12:00:00+00:00",
                "build_id": "20150601030203",
                "release_channel": "nightly",
                "uuid": "abc-123",
                "async_shutdown_timeout": "{\"conditions\":[\"x\"]}",
                "signature": "shutdownhang"
            }"#,
        )
        .unwrap();
        assert_eq!(report.product, "Firefox");
        assert_eq!(
            report.annotation_json.as_deref(),
            Some("{\"conditions\":[\"x\"]}")
        );
        assert!(report.extra.contains_key("signature"));
    }

    #[test]
    fn test_day_sample_round_trip() {
        let sample: DaySample = serde_json::from_str(r#"{"total": 450, "hits": []}"#).unwrap();
        assert_eq!(sample.total, 450);
        assert!(sample.hits.is_empty());
    }
}
