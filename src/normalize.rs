//! Record normalization
//!
//! Converts one day's raw sample into structured records: parsed date,
//! parsed annotation, derived signature. A pure function; the only side
//! effect is logging.
//!
//! One bad record fails the whole batch. Retrying cannot fix a parse
//! error, and silently skipping would hide data-format regressions, so
//! the error carries the offending raw string and reaches the top of
//! the run.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::DataError;
use crate::models::{Annotation, DaySample, NormalizedReport};

/// Normalize a day's sample. Output is stable-sorted by
/// (version ascending, date ascending); ties keep fetch order.
pub fn normalize(sample: &DaySample) -> Result<Vec<NormalizedReport>, DataError> {
    let mut reports = Vec::with_capacity(sample.hits.len());
    for hit in &sample.hits {
        let raw_annotation =
            hit.annotation_json
                .as_deref()
                .ok_or_else(|| DataError::MalformedAnnotation {
                    uuid: hit.uuid.clone(),
                    raw: "<missing annotation field>".to_string(),
                })?;
        let annotation: Annotation =
            serde_json::from_str(raw_annotation).map_err(|err| {
                tracing::error!(uuid = %hit.uuid, %err, "annotation failed to parse");
                DataError::MalformedAnnotation {
                    uuid: hit.uuid.clone(),
                    raw: raw_annotation.to_string(),
                }
            })?;
        let signature = signature_of(&annotation).ok_or_else(|| {
            tracing::error!(uuid = %hit.uuid, raw = raw_annotation, "annotation yields an empty signature");
            DataError::EmptySignature {
                uuid: hit.uuid.clone(),
            }
        })?;
        let date = parse_report_date(&hit.date).ok_or_else(|| DataError::MalformedDate {
            uuid: hit.uuid.clone(),
            date: hit.date.clone(),
        })?;

        reports.push(NormalizedReport {
            date,
            annotation,
            signature,
            product: hit.product.clone(),
            version: hit.version.clone(),
            build_id: hit.build_id.clone(),
            release_channel: hit.release_channel.clone(),
            uuid: hit.uuid.clone(),
            raw: hit.clone(),
        });
    }

    // sort_by is stable, so equal keys keep fetch order
    reports.sort_by(|a, b| a.version.cmp(&b.version).then(a.date.cmp(&b.date)));
    tracing::debug!(count = reports.len(), total = sample.total, "normalized day sample");
    Ok(reports)
}

/// Derive the signature key: condition names sorted lexicographically,
/// joined with `" | "`. `None` when there is no usable name.
pub fn signature_of(annotation: &Annotation) -> Option<String> {
    let mut names: Vec<&str> = annotation
        .conditions
        .iter()
        .map(|condition| condition.name.as_str())
        .collect();
    if names.is_empty() || names.iter().all(|name| name.is_empty()) {
        return None;
    }
    names.sort_unstable();
    Some(names.join(" | "))
}

/// Report dates arrive as RFC 3339 with offset, or occasionally as a
/// bare datetime assumed UTC.
fn parse_report_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawReport;

    fn report(uuid: &str, version: &str, date: &str, annotation: &str) -> RawReport {
        RawReport {
            product: "Firefox".to_string(),
            version: version.to_string(),
            date: date.to_string(),
            build_id: "20150601030203".to_string(),
            release_channel: "nightly".to_string(),
            uuid: uuid.to_string(),
            annotation_json: Some(annotation.to_string()),
            extra: serde_json::Map::new(),
        }
    }

    const GOOD: &str = r#"{"phase":"profile-before-change","conditions":[{"name":"B"},{"name":"A"}]}"#;

    #[test]
    fn test_normalize_all_good() {
        let sample = DaySample {
            total: 100,
            hits: vec![
                report("u1", "41.0a1", "2015-06-01T12:00:00+00:00", GOOD),
                report("u2", "41.0a1", "2015-06-01T13:00:00+00:00", GOOD),
            ],
        };
        let reports = normalize(&sample).unwrap();
        assert_eq!(reports.len(), sample.hits.len());
        assert_eq!(reports[0].signature, "A | B");
    }

    #[test]
    fn test_normalize_fails_whole_batch_on_bad_record() {
        let sample = DaySample {
            total: 100,
            hits: vec![
                report("u1", "41.0a1", "2015-06-01T12:00:00+00:00", GOOD),
                report("u2", "41.0a1", "2015-06-01T13:00:00+00:00", "{not json"),
            ],
        };
        match normalize(&sample) {
            Err(DataError::MalformedAnnotation { uuid, raw }) => {
                assert_eq!(uuid, "u2");
                assert_eq!(raw, "{not json");
            }
            other => panic!("expected MalformedAnnotation, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_legacy_string_conditions() {
        let annotation = r#"{"conditions":["quit-application","web-workers"]}"#;
        let sample = DaySample {
            total: 1,
            hits: vec![report("u1", "41.0a1", "2015-06-01T12:00:00+00:00", annotation)],
        };
        let reports = normalize(&sample).unwrap();
        assert_eq!(reports[0].signature, "quit-application | web-workers");
        assert_eq!(reports[0].annotation.conditions[0].name, "quit-application");
        assert!(reports[0].annotation.conditions[0].stack.is_none());
    }

    #[test]
    fn test_normalize_empty_signature_is_fatal() {
        let sample = DaySample {
            total: 1,
            hits: vec![report("u1", "41.0a1", "2015-06-01T12:00:00+00:00", r#"{"conditions":[]}"#)],
        };
        assert!(matches!(
            normalize(&sample),
            Err(DataError::EmptySignature { .. })
        ));
    }

    #[test]
    fn test_normalize_sort_order() {
        let sample = DaySample {
            total: 3,
            hits: vec![
                report("u1", "42.0", "2015-06-01T12:00:00+00:00", GOOD),
                report("u2", "41.0a1", "2015-06-01T13:00:00+00:00", GOOD),
                report("u3", "41.0a1", "2015-06-01T11:00:00+00:00", GOOD),
            ],
        };
        let reports = normalize(&sample).unwrap();
        let uuids: Vec<_> = reports.iter().map(|r| r.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["u3", "u2", "u1"]);
    }

    #[test]
    fn test_parse_report_date_variants() {
        assert!(parse_report_date("2015-06-01T12:00:00.000000+00:00").is_some());
        assert!(parse_report_date("2015-06-01 12:00:00").is_some());
        assert!(parse_report_date("2015-06-01T12:00:00").is_some());
        assert!(parse_report_date("yesterday").is_none());
    }
}
