//! Aggregation engine
//!
//! Builds the nested signature -> day -> product+version index and the
//! derived statistics the views are rendered from. The index is owned
//! by the pipeline and only ever mutated inside scheduled tasks; a
//! filter change throws it away and rebuilds from the cached samples,
//! because filtered membership can both gain and lose entries.
//!
//! Estimation: each day's extrapolation factor is
//! `server total / normalized count` for that day, and the estimated
//! true crash count for a signature is the sum over days of
//! `ceil(observed * factor)`. This is sample-based extrapolation, not
//! an exact count.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::filter::VersionFilter;
use crate::models::NormalizedReport;

/// Min/max build-id range, widened as reports and days fold in, never
/// narrowed. Build ids compare lexicographically (fixed-width numeral).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRange {
    pub min_build_id: String,
    pub max_build_id: String,
}

impl BuildRange {
    fn new(build_id: &str) -> Self {
        Self {
            min_build_id: build_id.to_string(),
            max_build_id: build_id.to_string(),
        }
    }

    fn widen(&mut self, build_id: &str) {
        if build_id < self.min_build_id.as_str() {
            self.min_build_id = build_id.to_string();
        }
        if build_id > self.max_build_id.as_str() {
            self.max_build_id = build_id.to_string();
        }
    }

    fn merge(&mut self, other: &BuildRange) {
        self.widen(&other.min_build_id);
        self.widen(&other.max_build_id);
    }
}

/// All reports for one signature, one day, one `"product version"`.
#[derive(Debug, Default)]
pub struct VersionBucket {
    pub reports: Vec<Arc<NormalizedReport>>,
    build_range: Option<BuildRange>,
}

impl VersionBucket {
    fn push(&mut self, report: Arc<NormalizedReport>) {
        match &mut self.build_range {
            Some(range) => range.widen(&report.build_id),
            None => self.build_range = Some(BuildRange::new(&report.build_id)),
        }
        self.reports.push(report);
    }

    pub fn count(&self) -> usize {
        self.reports.len()
    }

    pub fn build_range(&self) -> Option<&BuildRange> {
        self.build_range.as_ref()
    }
}

/// One day's slice of a signature.
#[derive(Debug, Default)]
pub struct DayBucket {
    pub count: usize,
    pub by_version: BTreeMap<String, VersionBucket>,
}

/// Everything known about one signature across the fetched days.
#[derive(Debug, Default)]
pub struct SignatureNode {
    /// Every report with this signature, across all folded days.
    pub all: Vec<Arc<NormalizedReport>>,
    /// Indexed by age; `None` where the signature had no hits that day.
    pub by_day: Vec<Option<DayBucket>>,
}

impl SignatureNode {
    pub fn day(&self, age: u32) -> Option<&DayBucket> {
        self.by_day.get(age as usize).and_then(|slot| slot.as_ref())
    }
}

/// The running multi-day index.
#[derive(Debug, Default)]
pub struct AggregateIndex {
    by_signature: BTreeMap<String, SignatureNode>,
    day_factors: Vec<Option<f64>>,
}

impl AggregateIndex {
    pub fn new(days_back: u32) -> Self {
        Self {
            by_signature: BTreeMap::new(),
            day_factors: vec![None; days_back as usize],
        }
    }

    /// Fold one normalized day into the index. The filter is applied
    /// before anything is counted, so a record rejected client-side
    /// never contributes to counts, ranges, or factors.
    pub fn fold_day(
        &mut self,
        reports: Vec<NormalizedReport>,
        age: u32,
        day_total: u64,
        filter: &VersionFilter,
    ) {
        let surviving: Vec<Arc<NormalizedReport>> = reports
            .into_iter()
            .filter(|report| filter.allows(&report.product, &report.version))
            .map(Arc::new)
            .collect();

        let slot = age as usize;
        if slot >= self.day_factors.len() {
            self.day_factors.resize(slot + 1, None);
        }
        if !surviving.is_empty() {
            self.day_factors[slot] = Some(day_total as f64 / surviving.len() as f64);
        }

        tracing::debug!(age, count = surviving.len(), day_total, "folding day into index");

        for report in surviving {
            let node = self
                .by_signature
                .entry(report.signature.clone())
                .or_default();
            node.all.push(Arc::clone(&report));
            if node.by_day.len() <= slot {
                node.by_day.resize_with(slot + 1, || None);
            }
            let bucket = node.by_day[slot].get_or_insert_with(DayBucket::default);
            bucket.count += 1;
            bucket
                .by_version
                .entry(report.version_key())
                .or_default()
                .push(report);
        }
    }

    pub fn signature(&self, key: &str) -> Option<&SignatureNode> {
        self.by_signature.get(key)
    }

    /// Signatures ordered by observed sample volume, largest first.
    pub fn signatures_by_volume(&self) -> Vec<(&str, &SignatureNode)> {
        let mut nodes: Vec<_> = self
            .by_signature
            .iter()
            .map(|(key, node)| (key.as_str(), node))
            .collect();
        nodes.sort_by(|a, b| b.1.all.len().cmp(&a.1.all.len()).then(a.0.cmp(b.0)));
        nodes
    }

    /// The day's extrapolation factor, when the day has been folded.
    pub fn factor(&self, age: u32) -> Option<f64> {
        self.day_factors.get(age as usize).copied().flatten()
    }

    pub fn days_back(&self) -> u32 {
        self.day_factors.len() as u32
    }

    /// Estimated true crash count for a signature: per-day factor
    /// applied to per-day observed counts, summed across days.
    pub fn estimated_total(&self, signature: &str) -> u64 {
        let Some(node) = self.by_signature.get(signature) else {
            return 0;
        };
        node.by_day
            .iter()
            .enumerate()
            .filter_map(|(age, slot)| {
                let bucket = slot.as_ref()?;
                let factor = self.factor(age as u32)?;
                Some((bucket.count as f64 * factor).ceil() as u64)
            })
            .sum()
    }

    /// Cross-day build ranges for a signature, merged over every folded
    /// day; per-version minimum only ever decreases, maximum only ever
    /// increases.
    pub fn build_ranges(&self, signature: &str) -> BTreeMap<String, BuildRange> {
        let mut ranges: BTreeMap<String, BuildRange> = BTreeMap::new();
        let Some(node) = self.by_signature.get(signature) else {
            return ranges;
        };
        for bucket in node.by_day.iter().flatten() {
            for (version_key, versions) in &bucket.by_version {
                let Some(day_range) = versions.build_range() else {
                    continue;
                };
                match ranges.get_mut(version_key) {
                    Some(range) => range.merge(day_range),
                    None => {
                        ranges.insert(version_key.clone(), day_range.clone());
                    }
                }
            }
        }
        ranges
    }

    /// Every `(product, version)` pair observed across all folded days,
    /// sorted. Feeds the filter UI.
    pub fn versions_involved(&self) -> Vec<(String, String)> {
        let mut pairs = BTreeSet::new();
        for node in self.by_signature.values() {
            for report in &node.all {
                pairs.insert((report.product.clone(), report.version.clone()));
            }
        }
        pairs.into_iter().collect()
    }

    /// Observed sample size across all signatures and days.
    pub fn total_sample_size(&self) -> usize {
        self.by_signature.values().map(|node| node.all.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }
}
