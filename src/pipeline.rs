//! Run orchestration
//!
//! A run walks the configured day range newest-first, and for each day
//! schedules fetch (or cache hit), store, normalize, aggregate, and
//! display-update as separate serialized tasks. Separate tasks mean a
//! superseding run cancels between steps: a stale run's fetched sample
//! is dropped before the store step, so the cache never holds data a
//! newer run did not ask for.
//!
//! Every run works against a snapshot of the filter taken when the run
//! starts; a flip landing mid-run only takes effect in the debounced
//! rebuild it schedules, so one run never mixes two filters. Filter
//! changes are debounced, then rebuild the whole index from the cached
//! samples under a fresh run token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::aggregate::AggregateIndex;
use crate::fetch::{BackoffFetcher, Transport};
use crate::filter::VersionFilter;
use crate::models::DaySample;
use crate::normalize::normalize;
use crate::query::Restriction;
use crate::render::{build_views, RenderSink, SignatureView, StatusSink, ViewOptions};
use crate::scheduler::{RunToken, TaskScheduler};
use crate::store::SampleStore;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// How many days to cover, newest first (day 0 = today).
    pub days_back: u32,
    /// Per-day sample cap passed to the server.
    pub sample_size: usize,
    /// Per-day report link cap in the rendered views.
    pub link_cap: usize,
    pub endpoint: String,
    pub report_base_url: String,
    pub initial_delay: Duration,
    pub max_attempts: u32,
    /// Quiet time after a filter flip before the rebuild starts.
    pub debounce: Duration,
    pub restrict: Restriction,
}

struct PipelineState {
    index: AggregateIndex,
    filter: VersionFilter,
}

pub struct Pipeline {
    options: PipelineOptions,
    scheduler: TaskScheduler,
    status: Arc<dyn StatusSink>,
    render: Arc<dyn RenderSink>,
    store: tokio::sync::Mutex<SampleStore>,
    state: tokio::sync::Mutex<PipelineState>,
    pending_filter_epoch: AtomicU64,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        transport: Arc<dyn Transport>,
        status: Arc<dyn StatusSink>,
        render: Arc<dyn RenderSink>,
    ) -> Self {
        let fetcher = BackoffFetcher::new(transport, Arc::clone(&status));
        let store = SampleStore::new(
            fetcher,
            Arc::clone(&status),
            options.endpoint.clone(),
            options.sample_size,
            options.restrict.clone(),
            options.initial_delay,
            options.max_attempts,
        );
        Self {
            scheduler: TaskScheduler::new(Arc::clone(&status)),
            status,
            render,
            store: tokio::sync::Mutex::new(store),
            state: tokio::sync::Mutex::new(PipelineState {
                index: AggregateIndex::new(options.days_back),
                filter: VersionFilter::new(),
            }),
            pending_filter_epoch: AtomicU64::new(0),
            options,
        }
    }

    fn view_options(&self) -> ViewOptions {
        ViewOptions {
            links_per_day: self.options.link_cap,
            report_base_url: self.options.report_base_url.clone(),
        }
    }

    /// Run the full pipeline over the configured day range. Returns the
    /// final views, or an empty list when a newer run superseded this
    /// one (the newer run owns the display from that point).
    pub async fn run(&self) -> Result<Vec<SignatureView>> {
        let token = self.scheduler.start_run();
        self.render.set_loading(true);
        match self.run_days(token).await {
            Ok(Some(views)) => {
                self.status.publish("Done");
                self.render.set_loading(false);
                Ok(views)
            }
            Ok(None) => Ok(Vec::new()),
            Err(error) => {
                self.status.publish(&format!("Failed: {error:#}"));
                self.render.set_loading(false);
                Err(error)
            }
        }
    }

    async fn run_days(&self, token: RunToken) -> Result<Option<Vec<SignatureView>>> {
        let prepared = self
            .scheduler
            .submit(token, "Preparing run", async {
                let mut state = self.state.lock().await;
                state.index = AggregateIndex::new(self.options.days_back);
                // The run keeps this snapshot; a flip landing later only
                // affects the rebuild it schedules.
                Ok(state.filter.clone())
            })
            .await?;
        let Some(filter) = prepared else {
            return Ok(None);
        };

        let mut views = Vec::new();
        for age in 0..self.options.days_back {
            let fetched = self
                .scheduler
                .submit(token, &format!("Getting sample for day {age}"), async {
                    let store = self.store.lock().await;
                    match store.cached(age) {
                        Some(sample) => {
                            self.status.publish("Getting sample from in-memory cache");
                            Ok((sample.clone(), true))
                        }
                        None => Ok((store.fetch_day(age).await?, false)),
                    }
                })
                .await?;
            let Some((sample, was_cached)) = fetched else {
                return Ok(None);
            };

            if !was_cached {
                let stored = self
                    .scheduler
                    .submit(token, "Storing sample", async {
                        self.store.lock().await.insert(age, sample.clone());
                        Ok(())
                    })
                    .await?;
                if stored.is_none() {
                    return Ok(None);
                }
            }

            let normalized = self
                .scheduler
                .submit(token, &format!("Normalizing sample for day {age}"), async {
                    let filtered: DaySample = filter.apply(&sample);
                    Ok(normalize(&filtered)?)
                })
                .await?;
            let Some(reports) = normalized else {
                return Ok(None);
            };

            let aggregated = self
                .scheduler
                .submit(token, "Aggregating", async {
                    let mut state = self.state.lock().await;
                    state.index.fold_day(reports, age, sample.total, &filter);
                    Ok(())
                })
                .await?;
            if aggregated.is_none() {
                return Ok(None);
            }

            let rendered = self
                .scheduler
                .submit(token, "Updating display", async {
                    let state = self.state.lock().await;
                    let views = build_views(&state.index, &self.view_options());
                    self.render.render(&views);
                    Ok(views)
                })
                .await?;
            match rendered {
                Some(current) => views = current,
                None => return Ok(None),
            }
        }
        Ok(Some(views))
    }

    /// Seed a filter entry before the first run, without triggering a
    /// rebuild.
    pub async fn seed_filter(
        &self,
        product: &str,
        version: &str,
        allowed: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.filter.set(product, version, allowed)?;
        Ok(())
    }

    /// Flip one `(product, version)` filter entry and rebuild from the
    /// cached samples after the configured debounce of quiet time. A
    /// burst of flips triggers one rebuild; all but the last call
    /// return early with an empty view list. An in-flight run is
    /// unaffected until the rebuild supersedes it: runs snapshot the
    /// filter when they start.
    pub async fn set_version_filter(
        &self,
        product: &str,
        version: &str,
        allowed: bool,
    ) -> Result<Vec<SignatureView>> {
        {
            let mut state = self.state.lock().await;
            state.filter.set(product, version, allowed)?;
        }
        let epoch = self.pending_filter_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.options.debounce).await;
        if self.pending_filter_epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(product, version, "filter change coalesced");
            return Ok(Vec::new());
        }
        self.run().await
    }

    /// Drop every cached sample and run again from the server.
    pub async fn restart(&self) -> Result<Vec<SignatureView>> {
        self.store.lock().await.restart();
        self.run().await
    }

    /// Every `(product, version)` pair in the current index, for
    /// building a filter UI.
    pub async fn versions_involved(&self) -> Vec<(String, String)> {
        self.state.lock().await.index.versions_involved()
    }
}
