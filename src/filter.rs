//! Client-side version filter
//!
//! A mutable accept/reject predicate over `(product, version)` pairs.
//! Absence of an entry means "accept". Filter changes always build a
//! brand-new filter and hand it to a fresh run; an in-flight run never
//! observes a partially rebuilt filter.

use std::collections::HashMap;

use crate::error::DataError;
use crate::models::DaySample;

#[derive(Debug, Clone, Default)]
pub struct VersionFilter {
    by_pair: HashMap<(String, String), bool>,
}

impl VersionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an accept/reject decision for one pair.
    pub fn set(&mut self, product: &str, version: &str, accept: bool) -> Result<(), DataError> {
        if product.is_empty() {
            return Err(DataError::InvalidArgument("expected a product".to_string()));
        }
        if version.is_empty() {
            return Err(DataError::InvalidArgument("expected a version".to_string()));
        }
        tracing::debug!(product, version, accept, "installing a filter entry");
        self.by_pair
            .insert((product.to_string(), version.to_string()), accept);
        Ok(())
    }

    /// Look up a pair; unset pairs default to accept.
    pub fn get(&self, product: &str, version: &str) -> Result<bool, DataError> {
        if product.is_empty() {
            return Err(DataError::InvalidArgument("expected a product".to_string()));
        }
        if version.is_empty() {
            return Err(DataError::InvalidArgument("expected a version".to_string()));
        }
        Ok(self.allows(product, version))
    }

    /// Unvalidated lookup used on server data, where an odd empty field
    /// should pass through rather than abort the day.
    pub(crate) fn allows(&self, product: &str, version: &str) -> bool {
        self.by_pair
            .get(&(product.to_string(), version.to_string()))
            .copied()
            .unwrap_or(true)
    }

    pub fn accepts(&self) -> Vec<(String, String)> {
        self.enumerate(true)
    }

    pub fn rejects(&self) -> Vec<(String, String)> {
        self.enumerate(false)
    }

    fn enumerate(&self, accept: bool) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .by_pair
            .iter()
            .filter(|(_, v)| **v == accept)
            .map(|(k, _)| k.clone())
            .collect();
        pairs.sort();
        pairs
    }

    /// Drop rejected hits from a day's sample. The server-side `total`
    /// is left untouched; it feeds the extrapolation factor.
    pub fn apply(&self, sample: &DaySample) -> DaySample {
        DaySample {
            total: sample.total,
            hits: sample
                .hits
                .iter()
                .filter(|hit| self.allows(&hit.product, &hit.version))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow() {
        let filter = VersionFilter::new();
        assert!(filter.get("Firefox", "41.0a1").unwrap());
    }

    #[test]
    fn test_set_then_get() {
        let mut filter = VersionFilter::new();
        filter.set("Firefox", "41.0a1", false).unwrap();
        filter.set("Firefox", "40.0", true).unwrap();
        assert!(!filter.get("Firefox", "41.0a1").unwrap());
        assert!(filter.get("Firefox", "40.0").unwrap());
        assert!(filter.get("Fennec", "40.0").unwrap());
    }

    #[test]
    fn test_empty_arguments_fail_fast() {
        let mut filter = VersionFilter::new();
        assert!(filter.set("", "41.0a1", true).is_err());
        assert!(filter.set("Firefox", "", true).is_err());
        assert!(filter.get("", "41.0a1").is_err());
        assert!(filter.get("Firefox", "").is_err());
    }

    #[test]
    fn test_accepts_rejects_partition() {
        let mut filter = VersionFilter::new();
        filter.set("Firefox", "41.0a1", true).unwrap();
        filter.set("Firefox", "40.0", false).unwrap();
        filter.set("Fennec", "40.0", false).unwrap();

        let accepts = filter.accepts();
        let rejects = filter.rejects();
        assert_eq!(accepts, vec![("Firefox".to_string(), "41.0a1".to_string())]);
        assert_eq!(
            rejects,
            vec![
                ("Fennec".to_string(), "40.0".to_string()),
                ("Firefox".to_string(), "40.0".to_string()),
            ]
        );
        for pair in &accepts {
            assert!(!rejects.contains(pair));
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut filter = VersionFilter::new();
        filter.set("Firefox", "40.0", false).unwrap();
        filter.set("Firefox", "40.0", true).unwrap();
        assert!(filter.get("Firefox", "40.0").unwrap());
        assert!(filter.rejects().is_empty());
    }
}
