//! Search query construction
//!
//! Builds the GET parameter list for one day's sample against a
//! SuperSearch-style endpoint: the non-null-annotation filter, the
//! result cap, the half-open day range, OR'd version constraints, and
//! annotation containment restrictions.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};

use crate::error::DataError;
use crate::models::ANNOTATION_FIELD;

/// Initial restriction list, supplied once at startup (CLI flags).
#[derive(Debug, Clone, Default)]
pub struct Restriction {
    /// `"product version"` pairs; the server ORs version constraints.
    pub versions: Vec<String>,
    /// `~text` annotation containment restrictions.
    pub signatures: Vec<String>,
}

/// An ordered parameter list for one GET request. Keys repeat: the two
/// `date` bounds and each OR'd `version` are separate pairs.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    params: Vec<(String, String)>,
}

impl SearchQuery {
    /// Query for the day `age` days before today (age 0 = today).
    pub fn for_day(age: u32, sample_size: usize, restrict: &Restriction) -> Result<Self, DataError> {
        Self::for_named_day(
            Utc::now().date_naive() - Duration::days(i64::from(age)),
            sample_size,
            restrict,
        )
    }

    /// Query for a specific calendar day, `[day, day+1)`.
    pub fn for_named_day(
        day: NaiveDate,
        sample_size: usize,
        restrict: &Restriction,
    ) -> Result<Self, DataError> {
        let next_day = day + Duration::days(1);
        let mut params = vec![
            (ANNOTATION_FIELD.to_string(), "!__null__".to_string()),
            ("_results_number".to_string(), sample_size.to_string()),
            ("date".to_string(), format!(">={}", day.format("%Y-%m-%d"))),
            ("date".to_string(), format!("<{}", next_day.format("%Y-%m-%d"))),
        ];

        for pair in &restrict.versions {
            let mut parts = pair.splitn(2, ' ');
            let product = parts.next().unwrap_or("");
            let version = parts.next().unwrap_or("");
            if !product.is_empty() && !version.is_empty() {
                params.push(("version".to_string(), version.to_string()));
            }
        }

        for sig in &restrict.signatures {
            if sig.is_empty() {
                continue;
            }
            if sig.starts_with("~!") {
                return Err(DataError::InvalidArgument(
                    "negative signature matches are not supported by the server".to_string(),
                ));
            }
            match sig.strip_prefix('~') {
                Some(content) => {
                    params.push((ANNOTATION_FIELD.to_string(), content.to_string()));
                }
                None => {
                    return Err(DataError::InvalidArgument(format!(
                        "unsupported signature operator: {sig}"
                    )));
                }
            }
        }

        Ok(Self { params })
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Render the query against a base endpoint.
    pub fn url(&self, base: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(base)
            .with_context(|| format!("invalid search endpoint: {base}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2015, 6, 1).unwrap()
    }

    #[test]
    fn test_day_range_params() {
        let query = SearchQuery::for_named_day(day(), 200, &Restriction::default()).unwrap();
        let params = query.params();
        assert!(params.contains(&(ANNOTATION_FIELD.to_string(), "!__null__".to_string())));
        assert!(params.contains(&("_results_number".to_string(), "200".to_string())));
        assert!(params.contains(&("date".to_string(), ">=2015-06-01".to_string())));
        assert!(params.contains(&("date".to_string(), "<2015-06-02".to_string())));
    }

    #[test]
    fn test_versions_are_orred() {
        let restrict = Restriction {
            versions: vec!["Firefox 41.0a1".to_string(), "Fennec 40.0".to_string()],
            signatures: Vec::new(),
        };
        let query = SearchQuery::for_named_day(day(), 10, &restrict).unwrap();
        let versions: Vec<_> = query
            .params()
            .iter()
            .filter(|(k, _)| k == "version")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(versions, vec!["41.0a1", "40.0"]);
    }

    #[test]
    fn test_malformed_version_pair_is_ignored() {
        let restrict = Restriction {
            versions: vec!["Firefox".to_string()],
            signatures: Vec::new(),
        };
        let query = SearchQuery::for_named_day(day(), 10, &restrict).unwrap();
        assert!(!query.params().iter().any(|(k, _)| k == "version"));
    }

    #[test]
    fn test_signature_containment() {
        let restrict = Restriction {
            versions: Vec::new(),
            signatures: vec!["~profile-before-change".to_string()],
        };
        let query = SearchQuery::for_named_day(day(), 10, &restrict).unwrap();
        let restrictions: Vec<_> = query
            .params()
            .iter()
            .filter(|(k, v)| k == ANNOTATION_FIELD && v != "!__null__")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(restrictions, vec!["profile-before-change"]);
    }

    #[test]
    fn test_negative_signature_rejected() {
        let restrict = Restriction {
            versions: Vec::new(),
            signatures: vec!["~!foo".to_string()],
        };
        assert!(SearchQuery::for_named_day(day(), 10, &restrict).is_err());
    }

    #[test]
    fn test_url_rendering() {
        let query = SearchQuery::for_named_day(day(), 1, &Restriction::default()).unwrap();
        let url = query.url("https://crash-stats.example.org/api/SuperSearch/").unwrap();
        assert!(url.contains("_results_number=1"));
        assert!(url.contains("date=%3E%3D2015-06-01"));
    }
}
