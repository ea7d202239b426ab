//! Metric names recorded when the `metrics` feature is enabled.

/// Event pipeline metrics
pub mod events {
    /// Raw events handed to the normalizer
    pub const RECEIVED_TOTAL: &str = "slackbridge_events_received_total";
    /// Canonical messages delivered to the receiver
    pub const DISPATCHED_TOTAL: &str = "slackbridge_events_dispatched_total";
    /// Events dropped, labelled by `reason`
    pub const DROPPED_TOTAL: &str = "slackbridge_events_dropped_total";
}

/// Directory API metrics
pub mod directory {
    /// Web API calls, labelled by `method`
    pub const CALLS_TOTAL: &str = "slackbridge_directory_calls_total";
    /// Web API calls that failed, labelled by `method`
    pub const ERRORS_TOTAL: &str = "slackbridge_directory_errors_total";
    /// Users written by a completed directory sync
    pub const SYNCED_USERS_TOTAL: &str = "slackbridge_directory_synced_users_total";
}

/// Cache metrics, labelled by `cache`
pub mod cache {
    pub const HITS_TOTAL: &str = "slackbridge_cache_hits_total";
    pub const MISSES_TOTAL: &str = "slackbridge_cache_misses_total";
}
