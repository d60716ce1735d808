//! Crash Triage Library
//!
//! Builds multi-day crash-report triage views from a SuperSearch-style
//! crash-stats endpoint. The pipeline fetches one capped sample per
//! day (with exponential backoff against rate limiting), parses the
//! shutdown-hang annotation each report carries, derives a stable
//! signature from the annotation's condition names, and aggregates the
//! reports into a signature -> day -> product+version index with
//! extrapolated crash-count estimates and per-version build ranges.
//!
//! ## Architecture Overview
//!
//! - [`models`] - Raw samples, parsed annotations, normalized reports
//! - [`fetch`] - HTTP transport and 429 backoff retry loop
//! - [`query`] - Search parameter construction for one day's sample
//! - [`store`] - Per-day in-memory sample cache
//! - [`normalize`] - Annotation parsing and signature derivation
//! - [`aggregate`] - The nested index and its derived statistics
//! - [`filter`] - Client-side product+version include/exclude set
//! - [`scheduler`] - Serialized tasks with stale-run cancellation
//! - [`pipeline`] - Run orchestration, debounced filter rebuilds
//! - [`render`] - Status/render sink traits and terminal output
//! - [`config`] - Configuration management with env overrides
//! - [`logging`] - Structured logging with JSON and pretty formats
//!
//! ## Main Entry Point
//!
//! The primary interface is [`Pipeline`]:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use crash_triage::fetch::HttpTransport;
//! use crash_triage::query::Restriction;
//! use crash_triage::render::{ConsoleStatus, TerminalRenderer};
//! use crash_triage::{Pipeline, PipelineOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let options = PipelineOptions {
//!     days_back: 7,
//!     sample_size: 200,
//!     link_cap: 20,
//!     endpoint: "https://crash-stats.allizom.org/api/SuperSearch/".to_string(),
//!     report_base_url: "https://crash-stats.mozilla.com/report/index/".to_string(),
//!     initial_delay: Duration::from_millis(1000),
//!     max_attempts: 5,
//!     debounce: Duration::from_millis(500),
//!     restrict: Restriction::default(),
//! };
//! let pipeline = Pipeline::new(
//!     options,
//!     Arc::new(HttpTransport::new()),
//!     Arc::new(ConsoleStatus::new(false)),
//!     Arc::new(TerminalRenderer::new(false)),
//! );
//! let views = pipeline.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod build_id;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod render;
pub mod scheduler;
pub mod store;

pub use error::{DataError, FetchError};
pub use models::{Annotation, Condition, DaySample, NormalizedReport, RawReport};
pub use pipeline::{Pipeline, PipelineOptions};
pub use render::SignatureView;
