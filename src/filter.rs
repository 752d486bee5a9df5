//! Client-side event filtering.
//!
//! Location, category and date-range predicates are applied independently and
//! AND-combined. Filtering is stable: surviving events keep their relative
//! order. Nothing here fails; malformed inputs either disable a predicate
//! (filter side) or exclude a record (record side).

use crate::constants::ALL_CATEGORIES;
use crate::types::{parse_timestamp, EventRecord, FilterState};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use tracing::debug;

/// Filter inputs resolved once per call: trimmed, case folded and parsed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActiveFilters {
    pub location: Option<String>,
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ActiveFilters {
    pub fn from_state(filters: &FilterState) -> Self {
        let location = filters
            .location
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let category = filters
            .category
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != ALL_CATEGORIES);

        let start = filters.start_date.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() && !raw.trim().is_empty() {
                debug!("Ignoring unparseable start date filter: {}", raw);
            }
            parsed
        });

        let end = filters.end_date.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw).and_then(end_of_day);
            if parsed.is_none() && !raw.trim().is_empty() {
                debug!("Ignoring unparseable end date filter: {}", raw);
            }
            parsed
        });

        Self {
            location,
            category,
            start,
            end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.category.is_none() && self.start.is_none() && self.end.is_none()
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        if let Some(location) = &self.location {
            if !event.location.address.to_lowercase().contains(location.as_str()) {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if event.category.to_lowercase() != *category {
                return false;
            }
        }

        if self.start.is_none() && self.end.is_none() {
            return true;
        }

        // Any date predicate requires a readable record start.
        let Some(start_time) = event.start() else {
            return false;
        };
        if let Some(start) = self.start {
            if start_time < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if start_time > end {
                return false;
            }
        }
        true
    }
}

/// Move a timestamp to the last millisecond of its (UTC) calendar day.
fn end_of_day(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    Some(Utc.from_utc_datetime(&ts.date_naive().and_time(last)))
}

/// Whether a single event passes every active predicate in `filters`.
pub fn matches(event: &EventRecord, filters: &FilterState) -> bool {
    ActiveFilters::from_state(filters).matches(event)
}

/// Stable filter of `events` by `filters`.
pub fn apply(events: &[EventRecord], filters: &FilterState) -> Vec<EventRecord> {
    let active = ActiveFilters::from_state(filters);
    if active.is_empty() {
        return events.to_vec();
    }

    let kept: Vec<EventRecord> = events.iter().filter(|e| active.matches(e)).cloned().collect();
    debug!("Filtered {} events down to {}", events.len(), kept.len());
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn event(id: &str, address: &str, category: &str, start: &str) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            name: format!("Event {}", id),
            description: String::new(),
            start_time: start.to_string(),
            end_time: None,
            location: Location {
                address: address.to_string(),
                latitude: None,
                longitude: None,
            },
            dress_code: None,
            category: category.to_string(),
            image_url: None,
        }
    }

    fn sample() -> Vec<EventRecord> {
        vec![
            event("1", "123 Main St, Springfield", "Music", "2024-03-15T09:00:00Z"),
            event("2", "Innovation Hub, Palo Alto", "Business", "2024-04-10"),
            event("3", "Pier 39, San Francisco", "music", "2024-06-20T18:00:00Z"),
        ]
    }

    #[test]
    fn test_empty_input_stays_empty() {
        let filters = FilterState::default().with_location("x").with_category("Music");
        assert!(apply(&[], &filters).is_empty());
    }

    #[test]
    fn test_no_filters_is_identity() {
        let events = sample();
        assert_eq!(apply(&events, &FilterState::default()), events);
    }

    #[test]
    fn test_all_category_is_no_filter() {
        let events = sample();
        let all = FilterState::default().with_category("ALL");
        assert_eq!(apply(&events, &all), apply(&events, &FilterState::default()));
    }

    #[test]
    fn test_location_is_case_insensitive_substring() {
        let events = sample();
        for needle in ["springfield", "MAIN", "  main st "] {
            let got = apply(&events, &FilterState::default().with_location(needle));
            assert_eq!(got.len(), 1, "needle {:?}", needle);
            assert_eq!(got[0].id, "1");
        }
    }

    #[test]
    fn test_blank_location_is_ignored() {
        let events = sample();
        assert_eq!(apply(&events, &FilterState::default().with_location("   ")).len(), 3);
    }

    #[test]
    fn test_category_exact_case_insensitive() {
        let events = sample();
        let got = apply(&events, &FilterState::default().with_category(" MUSIC "));
        let ids: Vec<_> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        // Substrings do not count for category.
        assert!(apply(&events, &FilterState::default().with_category("Mus")).is_empty());
    }

    #[test]
    fn test_end_date_is_inclusive_of_whole_day() {
        let events = vec![event("1", "a", "x", "2024-03-15T09:00:00Z")];
        assert_eq!(apply(&events, &FilterState::default().with_end_date("2024-03-15")).len(), 1);
        assert!(apply(&events, &FilterState::default().with_end_date("2024-03-14")).is_empty());
    }

    #[test]
    fn test_start_date_lower_bound() {
        let events = sample();
        let got = apply(&events, &FilterState::default().with_start_date("2024-04-10"));
        let ids: Vec<_> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_unparseable_filter_date_fails_open() {
        let events = sample();
        let filters = FilterState::default()
            .with_start_date("someday")
            .with_end_date("13/45/2024");
        assert_eq!(apply(&events, &filters).len(), 3);
    }

    #[test]
    fn test_unparseable_record_date_fails_closed() {
        let mut events = sample();
        events.push(event("4", "a", "x", "soon"));
        let got = apply(&events, &FilterState::default().with_start_date("2000-01-01"));
        assert!(got.iter().all(|e| e.id != "4"));
        assert_eq!(got.len(), 3);

        // Without date predicates the record is kept.
        assert_eq!(apply(&events, &FilterState::default()).len(), 4);
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let events = sample();
        let filters = FilterState::default()
            .with_category("music")
            .with_start_date("2024-05-01")
            .with_end_date("2024-12-31");
        let got = apply(&events, &filters);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "3");
        assert!(matches(&events[2], &filters));
        assert!(!matches(&events[0], &filters));
    }

    #[test]
    fn test_missing_fields_match_as_empty() {
        let events = vec![event("1", "", "", "2024-01-01")];
        assert!(apply(&events, &FilterState::default().with_location("x")).is_empty());
        assert!(apply(&events, &FilterState::default().with_category("music")).is_empty());
    }
}
