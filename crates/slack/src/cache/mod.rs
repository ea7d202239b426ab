//! In-memory caches in front of the directory.
//!
//! Every fetch-through read reports whether it was served locally or fetched,
//! so callers and tests can tell the two apart. Failed fetches are plain
//! `Err` values and never populate a cache.

pub mod bot;
pub mod conversation;
pub mod entity;

pub use {
    bot::{BotCache, BotIdentity},
    conversation::ConversationCache,
    entity::EntityCache,
};

/// Outcome of a successful fetch-through read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Served from the cache without touching the network.
    Cached(T),
    /// Fetched live and written back to the cache.
    Fetched(T),
}

impl<T> Lookup<T> {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Cached(value) | Self::Fetched(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Cached(value) | Self::Fetched(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Cached(value) => Lookup::Cached(f(value)),
            Self::Fetched(value) => Lookup::Fetched(f(value)),
        }
    }
}

#[cfg(feature = "metrics")]
pub(crate) fn record<T>(cache: &'static str, lookup: &Lookup<T>) {
    use crate::telemetry::cache as cache_metrics;
    if lookup.is_cached() {
        metrics::counter!(cache_metrics::HITS_TOTAL, "cache" => cache).increment(1);
    } else {
        metrics::counter!(cache_metrics::MISSES_TOTAL, "cache" => cache).increment(1);
    }
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn record<T>(_cache: &'static str, _lookup: &Lookup<T>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_accessors() {
        let cached = Lookup::Cached(1);
        let fetched = Lookup::Fetched(2).map(|v| v * 10);
        assert!(cached.is_cached());
        assert!(!fetched.is_cached());
        assert_eq!(*cached.value(), 1);
        assert_eq!(fetched.into_inner(), 20);
    }
}
