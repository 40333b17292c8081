//! Query cache telemetry
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the host
//! installs a recorder.
//!
//! # Metrics
//!
//! - `query_cache_hits_total`: fresh value served without a request
//! - `query_cache_misses_total`: no value, caller waited for a fetch
//! - `query_stale_served_total`: stale value served while revalidating
//! - `query_fetch_duration_seconds`: histogram of fetch time, by outcome
//! - `query_retries_total`: retry attempts
//! - `query_invalidations_total`: entries marked stale
//!
//! Every metric carries a `kind` label.

use metrics::{histogram, increment_counter};
use tokio::time::Instant;

use super::key::ResourceKind;
use crate::error::ApiError;

pub(crate) fn record_hit(kind: ResourceKind) {
    increment_counter!("query_cache_hits_total", "kind" => kind.as_str());
}

pub(crate) fn record_miss(kind: ResourceKind) {
    increment_counter!("query_cache_misses_total", "kind" => kind.as_str());
}

pub(crate) fn record_stale(kind: ResourceKind) {
    increment_counter!("query_stale_served_total", "kind" => kind.as_str());
}

pub(crate) fn record_retry(kind: ResourceKind) {
    increment_counter!("query_retries_total", "kind" => kind.as_str());
}

pub(crate) fn record_invalidation(kind: ResourceKind) {
    increment_counter!("query_invalidations_total", "kind" => kind.as_str());
}

/// Times one fetch, from first attempt to final outcome including retries.
#[derive(Debug)]
pub(crate) struct FetchTimer {
    kind: ResourceKind,
    start: Instant,
}

impl FetchTimer {
    pub(crate) fn start(kind: ResourceKind) -> Self {
        Self {
            kind,
            start: Instant::now(),
        }
    }

    /// Records the duration with an `outcome` label of `success` or the
    /// error kind.
    pub(crate) fn finish(self, error: Option<&ApiError>) {
        let outcome = error.map_or("success", |e| e.kind().as_str());
        histogram!(
            "query_fetch_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "kind" => self.kind.as_str(),
            "outcome" => outcome
        );
    }
}
