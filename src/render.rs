//! Render and status sinks
//!
//! The pipeline hands the outside world two narrow interfaces: a
//! [`StatusSink`] receiving one human-readable line before each task
//! and wait, and a [`RenderSink`] receiving plain-data
//! [`SignatureView`] structures after each day folds in. Terminal
//! implementations live here too; anything fancier (canvas, HTML) can
//! implement the same traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use colored::{Color, Colorize};
use serde::Serialize;

use crate::aggregate::AggregateIndex;
use crate::build_id::BuildId;

/// Single string-valued status line, updated before each scheduled
/// task and each backoff wait. Purely observational.
pub trait StatusSink: Send + Sync {
    fn publish(&self, message: &str);
}

/// Consumes aggregate views. `render` is called with the full current
/// multi-day view each time a day completes, so partial results are
/// visible while the run is still fetching.
pub trait RenderSink: Send + Sync {
    fn render(&self, views: &[SignatureView]);
    fn set_loading(&self, loading: bool);
}

/// Everything the UI needs for one signature, as plain data.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureView {
    pub signature: String,
    /// Observed reports for this signature across fetched days.
    pub sample_count: usize,
    /// Share of the whole observed sample, in percent (rounded up).
    pub sample_share_pct: u64,
    /// Extrapolated true crash count; see `AggregateIndex::estimated_total`.
    pub estimated_total: u64,
    pub estimate_text: String,
    pub histogram: Vec<DayColumn>,
    pub build_ranges: Vec<BuildRangeEntry>,
    pub links: Vec<DayLinks>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayColumn {
    pub age: u32,
    pub total: usize,
    pub bars: Vec<VersionBar>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionBar {
    pub version_key: String,
    /// Bar height is the observed hit count.
    pub height: usize,
    pub tooltip: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildRangeEntry {
    pub version_key: String,
    pub min_build_id: String,
    pub max_build_id: String,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayLinks {
    pub age: u32,
    pub links: Vec<SampleLink>,
    /// How many samples past the per-day cap were left out.
    pub omitted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleLink {
    pub uuid: String,
    /// `"product version"`, with the build id appended for nightlies.
    pub label: String,
    pub url: String,
    pub annotation_json: String,
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub links_per_day: usize,
    pub report_base_url: String,
}

/// Build the per-signature views from the current index, largest
/// signature first.
pub fn build_views(index: &AggregateIndex, options: &ViewOptions) -> Vec<SignatureView> {
    let total_samples = index.total_sample_size();
    let days_back = index.days_back();

    index
        .signatures_by_volume()
        .into_iter()
        .map(|(signature, node)| {
            let sample_count = node.all.len();
            let sample_share_pct = if total_samples > 0 {
                ((sample_count * 100).div_ceil(total_samples)) as u64
            } else {
                0
            };
            let estimated_total = index.estimated_total(signature);
            let estimate_text = format!(
                "Crashes: {sample_share_pct}% of {total_samples} samples \
                 (~{estimated_total} total crashes over {days_back} days)"
            );

            let mut histogram = Vec::new();
            let mut links = Vec::new();
            for age in 0..days_back {
                let Some(bucket) = node.day(age) else {
                    continue;
                };
                let factor = index.factor(age).unwrap_or(1.0);
                let bars = bucket
                    .by_version
                    .iter()
                    .map(|(version_key, versions)| {
                        let height = versions.count();
                        let estimate = (height as f64 * factor).ceil() as u64;
                        VersionBar {
                            version_key: version_key.clone(),
                            height,
                            tooltip: format!("{version_key} (est. {estimate} crashes)"),
                        }
                    })
                    .collect();
                histogram.push(DayColumn {
                    age,
                    total: bucket.count,
                    bars,
                });

                let mut day_links = Vec::new();
                let mut omitted = 0;
                for report in bucket.by_version.values().flat_map(|v| v.reports.iter()) {
                    if day_links.len() >= options.links_per_day {
                        omitted += 1;
                        continue;
                    }
                    let mut label = report.version_key();
                    if report.is_nightly() {
                        label.push(' ');
                        label.push_str(&report.build_id);
                    }
                    day_links.push(SampleLink {
                        uuid: report.uuid.clone(),
                        label,
                        url: format!("{}{}", options.report_base_url, report.uuid),
                        annotation_json: serde_json::to_string_pretty(&report.annotation)
                            .unwrap_or_default(),
                    });
                }
                links.push(DayLinks {
                    age,
                    links: day_links,
                    omitted,
                });
            }

            let build_ranges = index
                .build_ranges(signature)
                .into_iter()
                .map(|(version_key, range)| BuildRangeEntry {
                    min_date: BuildId::display_date(&range.min_build_id),
                    max_date: BuildId::display_date(&range.max_build_id),
                    min_build_id: range.min_build_id,
                    max_build_id: range.max_build_id,
                    version_key,
                })
                .collect();

            SignatureView {
                signature: signature.to_string(),
                sample_count,
                sample_share_pct,
                estimated_total,
                estimate_text,
                histogram,
                build_ranges,
                links,
            }
        })
        .collect()
}

/// Status sink that logs through `tracing` and mirrors the line to
/// stderr so the "status line" is visible during a terminal run.
pub struct ConsoleStatus {
    quiet: bool,
}

impl ConsoleStatus {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl StatusSink for ConsoleStatus {
    fn publish(&self, message: &str) {
        tracing::info!(status = message);
        if !self.quiet {
            eprintln!("{}", message.dimmed());
        }
    }
}

/// Render sink for terminal runs: a one-line progress update per day;
/// the full report is printed once at the end via [`print_report`].
pub struct TerminalRenderer {
    quiet: bool,
    loading: AtomicBool,
}

impl TerminalRenderer {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            loading: AtomicBool::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}

impl RenderSink for TerminalRenderer {
    fn render(&self, views: &[SignatureView]) {
        if self.quiet {
            return;
        }
        let samples: usize = views.iter().map(|v| v.sample_count).sum();
        eprintln!(
            "{}",
            format!("{} signatures across {} samples so far", views.len(), samples).dimmed()
        );
    }

    fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }
}

const PALETTE: [Color; 6] = [
    Color::Red,
    Color::Yellow,
    Color::Green,
    Color::Cyan,
    Color::Blue,
    Color::Magenta,
];

fn palette_color(version_key: &str, order: &mut Vec<String>) -> Color {
    let position = match order.iter().position(|known| known == version_key) {
        Some(position) => position,
        None => {
            order.push(version_key.to_string());
            order.len() - 1
        }
    };
    PALETTE[position % PALETTE.len()]
}

/// Print the full report for a finished run.
pub fn print_report(views: &[SignatureView], limit: Option<usize>) {
    let shown = limit.unwrap_or(views.len()).min(views.len());
    let mut version_order: Vec<String> = Vec::new();

    for view in &views[..shown] {
        println!();
        println!("{}", view.signature.bold());
        println!("  {}", view.estimate_text);

        for column in &view.histogram {
            for bar in &column.bars {
                let color = palette_color(&bar.version_key, &mut version_order);
                let width = bar.height.min(40);
                println!(
                    "  -{}d  {:<24} {} {}",
                    column.age,
                    bar.version_key.color(color),
                    "█".repeat(width).color(color),
                    bar.tooltip.dimmed(),
                );
            }
        }

        if !view.build_ranges.is_empty() {
            println!("  Spotted in builds:");
            for range in &view.build_ranges {
                let color = palette_color(&range.version_key, &mut version_order);
                let min = range.min_date.as_deref().unwrap_or(&range.min_build_id);
                let max = range.max_date.as_deref().unwrap_or(&range.max_build_id);
                if min == max {
                    println!("    {} {}", range.version_key.color(color), min);
                } else {
                    println!("    {} {} to {}", range.version_key.color(color), min, max);
                }
            }
        }

        for day in &view.links {
            println!("  {} days ago:", day.age);
            for link in &day.links {
                println!("    {} ({})", link.url.underline(), link.label);
            }
            if day.omitted > 0 {
                println!("    [...] (omitted {})", day.omitted);
            }
        }
    }

    if shown < views.len() {
        println!();
        println!("({} more signatures not shown)", views.len() - shown);
    }
}

/// Collects status lines in memory. Useful for tests and embedders
/// that present the status line themselves.
#[derive(Default)]
pub struct RecordingStatus {
    lines: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StatusSink for RecordingStatus {
    fn publish(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}

/// Keeps every rendered snapshot. Useful for tests and embedders.
#[derive(Default)]
pub struct RecordingRender {
    snapshots: Mutex<Vec<Vec<SignatureView>>>,
    loading: AtomicBool,
}

impl RecordingRender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Vec<SignatureView>> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_snapshot(&self) -> Option<Vec<SignatureView>> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}

impl RenderSink for RecordingRender {
    fn render(&self, views: &[SignatureView]) {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(views.to_vec());
    }

    fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateIndex;
    use crate::filter::VersionFilter;
    use crate::models::{Annotation, Condition, NormalizedReport, RawReport};
    use chrono::Utc;

    fn mk_report(signature: &str, version: &str, channel: &str, n: usize) -> NormalizedReport {
        NormalizedReport {
            date: Utc::now(),
            annotation: Annotation {
                conditions: vec![Condition {
                    name: signature.to_string(),
                    stack: None,
                }],
                extra: serde_json::Map::new(),
            },
            signature: signature.to_string(),
            product: "Firefox".to_string(),
            version: version.to_string(),
            build_id: "20150601030203".to_string(),
            release_channel: channel.to_string(),
            uuid: format!("uuid-{n}"),
            raw: RawReport {
                product: "Firefox".to_string(),
                version: version.to_string(),
                date: "2015-06-01T12:00:00+00:00".to_string(),
                build_id: "20150601030203".to_string(),
                release_channel: channel.to_string(),
                uuid: format!("uuid-{n}"),
                annotation_json: None,
                extra: serde_json::Map::new(),
            },
        }
    }

    fn options(links_per_day: usize) -> ViewOptions {
        ViewOptions {
            links_per_day,
            report_base_url: "https://crash-stats.example.org/report/index/".to_string(),
        }
    }

    #[test]
    fn test_build_views_estimates_and_histogram() {
        let mut index = AggregateIndex::new(7);
        let day: Vec<_> = (0..4).map(|n| mk_report("A", "41.0a1", "release", n)).collect();
        index.fold_day(day, 0, 40, &VersionFilter::new());

        let views = build_views(&index, &options(20));
        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.signature, "A");
        assert_eq!(view.sample_count, 4);
        assert_eq!(view.sample_share_pct, 100);
        assert_eq!(view.estimated_total, 40);
        assert_eq!(view.histogram.len(), 1);
        assert_eq!(view.histogram[0].bars[0].height, 4);
        assert!(view.histogram[0].bars[0].tooltip.contains("est. 40 crashes"));
    }

    #[test]
    fn test_link_cap_and_omitted_marker() {
        let mut index = AggregateIndex::new(1);
        let day: Vec<_> = (0..25).map(|n| mk_report("A", "41.0a1", "release", n)).collect();
        index.fold_day(day, 0, 25, &VersionFilter::new());

        let views = build_views(&index, &options(20));
        let day_links = &views[0].links[0];
        assert_eq!(day_links.links.len(), 20);
        assert_eq!(day_links.omitted, 5);
    }

    #[test]
    fn test_nightly_links_carry_build_id() {
        let mut index = AggregateIndex::new(1);
        index.fold_day(
            vec![mk_report("A", "41.0a1", "nightly", 0)],
            0,
            1,
            &VersionFilter::new(),
        );

        let views = build_views(&index, &options(20));
        let link = &views[0].links[0].links[0];
        assert_eq!(link.label, "Firefox 41.0a1 20150601030203");
        assert!(link.url.ends_with("uuid-0"));
    }

    #[test]
    fn test_build_range_dates() {
        let mut index = AggregateIndex::new(1);
        index.fold_day(
            vec![mk_report("A", "41.0a1", "nightly", 0)],
            0,
            1,
            &VersionFilter::new(),
        );
        let views = build_views(&index, &options(20));
        let range = &views[0].build_ranges[0];
        assert_eq!(range.version_key, "Firefox 41.0a1");
        assert_eq!(range.min_date.as_deref(), Some("Mon Jun 01 2015"));
    }
}
