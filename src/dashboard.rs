//! Dashboard service: fetch → cache → filter → map layout.

use crate::cache::{Clock, EventCache, KeyValueStore, SystemClock};
use crate::error::Result;
use crate::filter;
use crate::map::{MapProjector, MarkerPosition};
use crate::types::{EventRecord, EventSource, FilterState};
use serde::Serialize;
use tracing::{debug, info};

/// One rendered state of the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub events: Vec<EventRecord>,
    pub markers: Vec<MarkerPosition>,
    /// Served from the cache without a network round trip
    pub from_cache: bool,
    /// Any filter predicate was active
    pub filtered: bool,
}

impl Snapshot {
    pub fn count_label(&self) -> String {
        match self.events.len() {
            1 => "1 event found".to_string(),
            n => format!("{} events found", n),
        }
    }
}

pub struct Dashboard<F: EventSource, S: KeyValueStore, C: Clock = SystemClock> {
    source: F,
    cache: EventCache<S, C>,
    projector: MapProjector,
    filters: FilterState,
    selected: Option<String>,
}

impl<F: EventSource, S: KeyValueStore, C: Clock> Dashboard<F, S, C> {
    pub fn new(source: F, cache: EventCache<S, C>, projector: MapProjector) -> Self {
        Self {
            source,
            cache,
            projector,
            filters: FilterState::default().normalized(),
            selected: None,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn cache(&self) -> &EventCache<S, C> {
        &self.cache
    }

    /// Replace the active filters. Changing them drops the selection.
    ///
    /// Stored as a full snapshot so cache lookups compare every key.
    pub fn set_filters(&mut self, filters: FilterState) {
        let filters = filters.normalized();
        if filters != self.filters {
            self.selected = None;
        }
        self.filters = filters;
    }

    pub fn select(&mut self, event_id: impl Into<String>) {
        self.selected = Some(event_id.into());
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Load events for the active filters, consulting the cache first when
    /// `use_cache` is set. Fetch failures propagate; the cache is left
    /// untouched by them.
    pub async fn load(&mut self, use_cache: bool) -> Result<Snapshot> {
        let filters = self.filters.clone();

        let cached = if use_cache { self.cache.get(&filters) } else { None };
        let from_cache = cached.is_some();
        let raw = match cached {
            Some(events) => events,
            None => {
                debug!("Fetching from {}", self.source.source_name());
                let events = self.source.fetch_events(&filters).await?;
                self.cache.set(&events, &filters);
                events
            }
        };

        let events = filter::apply(&raw, &filters);
        let markers = self.projector.project(&events);

        if let Some(id) = &self.selected {
            if !events.iter().any(|e| &e.id == id) {
                debug!("Selected event {} no longer in results", id);
                self.selected = None;
            }
        }

        info!(
            "Loaded {} events ({} on map, from_cache={})",
            events.len(),
            markers.len(),
            from_cache
        );

        Ok(Snapshot {
            events,
            markers,
            from_cache,
            filtered: filters.is_active(),
        })
    }

    /// Bypass the cache and refetch.
    pub async fn refresh(&mut self) -> Result<Snapshot> {
        self.load(false).await
    }
}
