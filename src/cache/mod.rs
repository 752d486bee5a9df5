//! Single-slot, filter-keyed cache of the last fetched event list.
//!
//! The slot lives under one well-known key of a [`KeyValueStore`] as
//! `{ events, timestamp, filters }`. Every successful write replaces it. Reads
//! are best-effort and never fail: absence, expiry, a filter mismatch and a
//! corrupt payload are all plain misses.

pub mod clock;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{FileStore, KeyValueStore, MemoryStore, UnavailableStore};

use crate::constants::{CACHE_KEY, CACHE_TTL_MS};
use crate::metrics;
use crate::types::{EventRecord, FilterState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// What is persisted in the cache slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub events: Vec<EventRecord>,
    /// Epoch milliseconds at which the entry was stored
    pub timestamp: i64,
    #[serde(default)]
    pub filters: FilterState,
}

impl CacheEntry {
    /// True when `query` agrees with the stored fingerprint on every key it
    /// sets. Keys the query leaves unset are not compared.
    pub fn matches(&self, query: &FilterState) -> bool {
        let stored = self.filters.entries();
        query.entries().into_iter().all(|(key, value)| {
            stored
                .iter()
                .any(|(stored_key, stored_value)| *stored_key == key && *stored_value == value)
        })
    }
}

pub struct EventCache<S: KeyValueStore, C: Clock = SystemClock> {
    store: S,
    clock: C,
    ttl_ms: i64,
}

impl<S: KeyValueStore> EventCache<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> EventCache<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            ttl_ms: CACHE_TTL_MS,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.max(0) as u64)
    }

    /// Replace the slot with `events` fetched under `filters`.
    pub fn set(&self, events: &[EventRecord], filters: &FilterState) {
        let entry = CacheEntry {
            events: events.to_vec(),
            timestamp: self.clock.now_millis(),
            filters: filters.clone(),
        };

        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize events for caching: {}", e);
                return;
            }
        };

        match self.store.set_item(CACHE_KEY, &payload) {
            Ok(()) => {
                metrics::record_cache_write(events.len());
                debug!("Cached {} events", events.len());
            }
            Err(e) => warn!("Failed to cache events: {}", e),
        }
    }

    /// Cached events for `filters`, if a fresh matching entry exists.
    pub fn get(&self, filters: &FilterState) -> Option<Vec<EventRecord>> {
        let Some(entry) = self.load() else {
            metrics::record_cache_miss("absent");
            return None;
        };

        if self.is_entry_expired(&entry) {
            debug!("Cache entry expired");
            metrics::record_cache_miss("expired");
            return None;
        }

        if !entry.matches(filters) {
            debug!("Cache entry filters do not match query");
            metrics::record_cache_miss("filters");
            return None;
        }

        metrics::record_cache_hit();
        debug!("Cache hit with {} events", entry.events.len());
        Some(entry.events)
    }

    pub fn clear(&self) {
        self.store.remove_item(CACHE_KEY);
    }

    /// Whether there is no entry fresh enough to serve.
    pub fn is_expired(&self) -> bool {
        self.load().map_or(true, |entry| self.is_entry_expired(&entry))
    }

    /// Age of the current entry, when one can be read.
    pub fn age(&self) -> Option<Duration> {
        let entry = self.load()?;
        let age = self.clock.now_millis().saturating_sub(entry.timestamp).max(0);
        Some(Duration::from_millis(age as u64))
    }

    /// The raw stored entry, regardless of freshness.
    pub fn peek(&self) -> Option<CacheEntry> {
        self.load()
    }

    fn is_entry_expired(&self, entry: &CacheEntry) -> bool {
        self.clock.now_millis().saturating_sub(entry.timestamp) > self.ttl_ms
    }

    fn load(&self) -> Option<CacheEntry> {
        let raw = self.store.get_item(CACHE_KEY)?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Failed to retrieve cached events: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn event(id: &str) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            name: "Show".to_string(),
            description: String::new(),
            start_time: "2024-06-20T19:00:00Z".to_string(),
            end_time: None,
            location: Location::new("Golden Gate Park, SF", 37.77, -122.45),
            dress_code: None,
            category: "Music".to_string(),
            image_url: None,
        }
    }

    fn cache() -> (EventCache<MemoryStore, ManualClock>, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_700_000_000_000);
        (EventCache::with_clock(store.clone(), clock.clone()), store, clock)
    }

    #[test]
    fn test_set_then_get_same_filters() {
        let (cache, _, _) = cache();
        let filters = FilterState::default().with_location("sf");
        cache.set(&[event("1"), event("2")], &filters);

        let got = cache.get(&filters).unwrap();
        assert_eq!(got.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
        assert!(!cache.is_expired());
    }

    #[test]
    fn test_different_filter_value_misses() {
        let (cache, _, _) = cache();
        cache.set(&[event("1")], &FilterState::default().with_location("sf"));
        assert!(cache.get(&FilterState::default().with_location("oakland")).is_none());
        // Values are compared verbatim.
        assert!(cache.get(&FilterState::default().with_location("SF")).is_none());
    }

    #[test]
    fn test_query_keys_absent_are_not_required() {
        let (cache, _, _) = cache();
        let stored = FilterState::default().with_location("sf").with_category("Music");
        cache.set(&[event("1")], &stored);

        assert!(cache.get(&FilterState::default()).is_some());
        assert!(cache.get(&FilterState::default().with_category("Music")).is_some());
        assert!(cache.get(&FilterState::default().with_start_date("2024-01-01")).is_none());
    }

    #[test]
    fn test_expires_after_ttl() {
        let (cache, _, clock) = cache();
        let filters = FilterState::default();
        cache.set(&[event("1")], &filters);

        clock.advance(CACHE_TTL_MS);
        assert!(cache.get(&filters).is_some(), "exactly at TTL is still fresh");

        clock.advance(1);
        assert!(cache.get(&filters).is_none());
        assert!(cache.is_expired());
    }

    #[test]
    fn test_set_overwrites_previous_entry() {
        let (cache, _, _) = cache();
        cache.set(&[event("1")], &FilterState::default().with_category("Music"));
        cache.set(&[event("2")], &FilterState::default().with_category("Art"));

        assert!(cache.get(&FilterState::default().with_category("Music")).is_none());
        let got = cache.get(&FilterState::default().with_category("Art")).unwrap();
        assert_eq!(got[0].id, "2");
    }

    #[test]
    fn test_corrupt_payload_is_a_miss() {
        let (cache, store, _) = cache();
        store.set_item(CACHE_KEY, "{not json").unwrap();
        assert!(cache.get(&FilterState::default()).is_none());
        assert!(cache.is_expired());
        assert!(cache.age().is_none());
    }

    #[test]
    fn test_clear_removes_entry() {
        let (cache, _, _) = cache();
        cache.set(&[event("1")], &FilterState::default());
        cache.clear();
        assert!(cache.get(&FilterState::default()).is_none());
        assert!(cache.is_expired());
    }

    #[test]
    fn test_unavailable_storage_is_silent() {
        let cache = EventCache::new(UnavailableStore);
        cache.set(&[event("1")], &FilterState::default());
        assert!(cache.get(&FilterState::default()).is_none());
        assert!(cache.is_expired());
        cache.clear();
    }

    #[test]
    fn test_custom_ttl_and_age() {
        let (cache, _, clock) = cache();
        let cache = cache.with_ttl(Duration::from_secs(10));
        cache.set(&[event("1")], &FilterState::default());
        clock.advance(4_000);
        assert_eq!(cache.age(), Some(Duration::from_secs(4)));
        clock.advance(6_001);
        assert!(cache.is_expired());
    }

    #[test]
    fn test_stored_payload_shape() {
        let (cache, store, _) = cache();
        cache.set(&[event("1")], &FilterState::default().with_start_date("2024-01-01"));
        let raw: serde_json::Value = serde_json::from_str(&store.get_item(CACHE_KEY).unwrap()).unwrap();
        assert!(raw["events"].is_array());
        assert_eq!(raw["timestamp"], 1_700_000_000_000i64);
        assert_eq!(raw["filters"]["startDate"], "2024-01-01");
    }
}
