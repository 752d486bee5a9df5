//! Metric names and recording helpers.
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use std::fmt;

/// All metric names used by the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Cache
    CacheHits,
    CacheMisses,
    CacheWrites,
    CacheEventsStored,

    // Fetcher
    FetchRequestsSuccess,
    FetchRequestsError,
    FetchDuration,
    FetchEventsReceived,
    FetchRecordsSkipped,
    SubmitRequestsSuccess,
    SubmitRequestsError,

    // Map
    MapMarkersProjected,
    MapRecordsUnplottable,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CacheHits => "events_cache_hits_total",
            MetricName::CacheMisses => "events_cache_misses_total",
            MetricName::CacheWrites => "events_cache_writes_total",
            MetricName::CacheEventsStored => "events_cache_events_stored",
            MetricName::FetchRequestsSuccess => "events_fetch_requests_success_total",
            MetricName::FetchRequestsError => "events_fetch_requests_error_total",
            MetricName::FetchDuration => "events_fetch_duration_seconds",
            MetricName::FetchEventsReceived => "events_fetch_events_received",
            MetricName::FetchRecordsSkipped => "events_fetch_records_skipped_total",
            MetricName::SubmitRequestsSuccess => "events_submit_requests_success_total",
            MetricName::SubmitRequestsError => "events_submit_requests_error_total",
            MetricName::MapMarkersProjected => "events_map_markers_projected",
            MetricName::MapRecordsUnplottable => "events_map_records_unplottable_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn record_cache_hit() {
    ::metrics::counter!(MetricName::CacheHits.as_str()).increment(1);
}

/// `reason` is one of `absent`, `expired`, `filters`
pub fn record_cache_miss(reason: &'static str) {
    ::metrics::counter!(MetricName::CacheMisses.as_str(), "reason" => reason).increment(1);
}

pub fn record_cache_write(events: usize) {
    ::metrics::counter!(MetricName::CacheWrites.as_str()).increment(1);
    ::metrics::gauge!(MetricName::CacheEventsStored.as_str()).set(events as f64);
}

pub fn record_fetch_success(duration_secs: f64, events: usize, skipped: usize) {
    ::metrics::counter!(MetricName::FetchRequestsSuccess.as_str()).increment(1);
    ::metrics::histogram!(MetricName::FetchDuration.as_str()).record(duration_secs);
    ::metrics::histogram!(MetricName::FetchEventsReceived.as_str()).record(events as f64);
    if skipped > 0 {
        ::metrics::counter!(MetricName::FetchRecordsSkipped.as_str()).increment(skipped as u64);
    }
}

/// `kind` is one of `timeout`, `status`, `http`, `envelope`, `superseded`
pub fn record_fetch_error(kind: &'static str) {
    ::metrics::counter!(MetricName::FetchRequestsError.as_str(), "kind" => kind).increment(1);
}

pub fn record_submit(success: bool) {
    let name = if success {
        MetricName::SubmitRequestsSuccess
    } else {
        MetricName::SubmitRequestsError
    };
    ::metrics::counter!(name.as_str()).increment(1);
}

pub fn record_projection(markers: usize, unplottable: usize) {
    ::metrics::histogram!(MetricName::MapMarkersProjected.as_str()).record(markers as f64);
    if unplottable > 0 {
        ::metrics::counter!(MetricName::MapRecordsUnplottable.as_str()).increment(unplottable as u64);
    }
}
