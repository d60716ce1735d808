//! Error taxonomy for the triage pipeline
//!
//! Two families: [`FetchError`] for everything the transport/backoff
//! layer can produce, and [`DataError`] for structural problems in the
//! data itself. Transient rate limiting is retried inside the fetcher
//! and only surfaces as `TooManyAttempts` once the budget is gone;
//! data errors are never retried and propagate to the top of the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The retry budget was exhausted while the server kept rate limiting.
    #[error("still rate limited after {attempts} attempts, giving up")]
    TooManyAttempts { attempts: u32 },

    /// Any non-429 status >= 400 is a hard failure.
    #[error("server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body did not parse as JSON. Carries the raw body
    /// for diagnosis.
    #[error("response body is not valid JSON: {body}")]
    MalformedResponse { body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    /// The per-report annotation blob did not parse as JSON. Fatal for
    /// the whole batch so data-quality regressions surface early.
    #[error("report {uuid}: annotation is not valid JSON: {raw}")]
    MalformedAnnotation { uuid: String, raw: String },

    /// An annotation with no usable condition names would produce an
    /// empty signature key.
    #[error("report {uuid}: annotation has no conditions, signature would be empty")]
    EmptySignature { uuid: String },

    #[error("report {uuid}: unparseable date: {date}")]
    MalformedDate { uuid: String, date: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
