//! Per-day sample cache
//!
//! Samples are keyed by day age (0 = today) and fetched at most once
//! per session: a filter change replays cached days instead of hitting
//! the server again. Fetching and storing are separate steps so a run
//! cancelled between them leaves no partial state behind; `restart`
//! empties the cache for an explicit refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::error::FetchError;
use crate::fetch::BackoffFetcher;
use crate::models::DaySample;
use crate::query::{Restriction, SearchQuery};
use crate::render::StatusSink;

pub struct SampleStore {
    fetcher: BackoffFetcher,
    status: Arc<dyn StatusSink>,
    endpoint: String,
    sample_size: usize,
    restrict: Restriction,
    initial_delay: Duration,
    max_attempts: u32,
    cache: HashMap<u32, DaySample>,
}

impl SampleStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: BackoffFetcher,
        status: Arc<dyn StatusSink>,
        endpoint: String,
        sample_size: usize,
        restrict: Restriction,
        initial_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            fetcher,
            status,
            endpoint,
            sample_size,
            restrict,
            initial_delay,
            max_attempts,
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self, age: u32) -> Option<&DaySample> {
        self.cache.get(&age)
    }

    /// Fetch one day from the server without touching the cache, so
    /// the caller can decide separately whether to keep the result.
    pub async fn fetch_day(&self, age: u32) -> Result<DaySample> {
        let query = SearchQuery::for_day(age, self.sample_size, &self.restrict)?;
        let url = query.url(&self.endpoint)?;
        let day = chrono::Utc::now().date_naive() - chrono::Duration::days(i64::from(age));
        self.status.publish(&format!("Fetching data for {day}"));

        let value = self
            .fetcher
            .fetch_json(&url, self.initial_delay, self.max_attempts)
            .await?;
        let sample: DaySample =
            serde_json::from_value(value.clone()).map_err(|_| FetchError::MalformedResponse {
                body: value.to_string(),
            })?;
        tracing::debug!(age, total = sample.total, hits = sample.hits.len(), "fetched day");
        Ok(sample)
    }

    pub fn insert(&mut self, age: u32, sample: DaySample) {
        self.cache.insert(age, sample);
    }

    /// Cached sample if present, otherwise fetch and cache. Runs that
    /// can be cancelled mid-day should use `fetch_day` + `insert`
    /// instead, to keep the store step separate.
    pub async fn get_day(&mut self, age: u32) -> Result<DaySample> {
        if let Some(sample) = self.cache.get(&age) {
            self.status.publish("Getting sample from in-memory cache");
            return Ok(sample.clone());
        }
        let sample = self.fetch_day(age).await?;
        self.cache.insert(age, sample.clone());
        Ok(sample)
    }

    /// Forget everything; the next run refetches every day.
    pub fn restart(&mut self) {
        self.cache.clear();
    }
}
