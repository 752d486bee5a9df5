//! Lightweight pseudo-map layout.
//!
//! Events are placed on a percentage canvas by linear interpolation inside the
//! (padded) bounding box of their coordinates. Longitude grows to the right,
//! latitude grows upward, so y is inverted.

use crate::constants::{
    CANVAS_CENTER, DEFAULT_CENTER_LAT, DEFAULT_CENTER_LNG, DEFAULT_MAP_INSET_MAX,
    DEFAULT_MAP_INSET_MIN, DEFAULT_MAP_PADDING, MAPS_SEARCH_URL,
};
use crate::error::{EventsError, Result};
use crate::metrics;
use crate::types::EventRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Fraction of the raw extent added beyond each edge of the bounding box
    pub padding: f64,
    /// Lowest coordinate a marker may take, in percent
    pub inset_min: f64,
    /// Highest coordinate a marker may take, in percent
    pub inset_max: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_MAP_PADDING,
            inset_min: DEFAULT_MAP_INSET_MIN,
            inset_max: DEFAULT_MAP_INSET_MAX,
        }
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(EventsError::Config(format!(
                "map padding must be a non-negative number, got {}",
                self.padding
            )));
        }
        let in_canvas = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_canvas(self.inset_min) || !in_canvas(self.inset_max) || self.inset_min > self.inset_max {
            return Err(EventsError::Config(format!(
                "map inset must satisfy 0 <= min <= max <= 100, got [{}, {}]",
                self.inset_min, self.inset_max
            )));
        }
        Ok(())
    }
}

/// Bounding box in latitude/longitude space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    /// Smallest box containing every point, `None` for no points.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, (lat, lng)| {
            Some(match acc {
                None => GeoBounds {
                    min_lat: lat,
                    max_lat: lat,
                    min_lng: lng,
                    max_lng: lng,
                },
                Some(b) => GeoBounds {
                    min_lat: b.min_lat.min(lat),
                    max_lat: b.max_lat.max(lat),
                    min_lng: b.min_lng.min(lng),
                    max_lng: b.max_lng.max(lng),
                },
            })
        })
    }

    pub fn lat_range(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_range(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    /// Zero extent on either axis
    pub fn is_degenerate(&self) -> bool {
        self.lat_range() == 0.0 || self.lng_range() == 0.0
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Canvas placement of one event, in percent of width/height
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerPosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MapProjector {
    config: ProjectionConfig,
}

impl MapProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Bounding box over the events that have usable coordinates.
    pub fn bounds(&self, events: &[EventRecord]) -> Option<GeoBounds> {
        GeoBounds::from_points(events.iter().filter_map(|e| e.location.coordinates()))
    }

    /// Where the map should be centered; a fixed default when nothing plots.
    pub fn center(&self, events: &[EventRecord]) -> (f64, f64) {
        self.bounds(events)
            .map(|b| b.center())
            .unwrap_or((DEFAULT_CENTER_LAT, DEFAULT_CENTER_LNG))
    }

    /// Marker positions for every plottable event, in input order.
    pub fn project(&self, events: &[EventRecord]) -> Vec<MarkerPosition> {
        let plottable: Vec<(&EventRecord, (f64, f64))> = events
            .iter()
            .filter_map(|e| e.location.coordinates().map(|c| (e, c)))
            .collect();

        let Some(bounds) = GeoBounds::from_points(plottable.iter().map(|(_, c)| *c)) else {
            metrics::record_projection(0, events.len());
            return Vec::new();
        };

        let markers: Vec<MarkerPosition> = plottable
            .into_iter()
            .map(|(event, (lat, lng))| {
                let (x, y) = self.position(&bounds, lat, lng);
                MarkerPosition {
                    id: event.id.clone(),
                    x,
                    y,
                }
            })
            .collect();

        metrics::record_projection(markers.len(), events.len() - markers.len());
        markers
    }

    fn position(&self, bounds: &GeoBounds, lat: f64, lng: f64) -> (f64, f64) {
        if bounds.is_degenerate() {
            return (CANVAS_CENTER, CANVAS_CENTER);
        }

        let padding = self.config.padding;
        let lat_range = bounds.lat_range();
        let lng_range = bounds.lng_range();
        let padded_lat_range = lat_range * (1.0 + padding * 2.0);
        let padded_lng_range = lng_range * (1.0 + padding * 2.0);

        let x = (lng - (bounds.min_lng - lng_range * padding)) / padded_lng_range * 100.0;
        let y = (bounds.max_lat + lat_range * padding - lat) / padded_lat_range * 100.0;

        (self.clamp(x), self.clamp(y))
    }

    fn clamp(&self, v: f64) -> f64 {
        v.max(self.config.inset_min).min(self.config.inset_max)
    }
}

/// External "open in maps" link for an event with coordinates.
pub fn maps_search_url(event: &EventRecord) -> Option<String> {
    let (lat, lng) = event.location.coordinates()?;
    Some(format!("{}{},{}", MAPS_SEARCH_URL, lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn at(id: &str, lat: Option<f64>, lng: Option<f64>) -> EventRecord {
        EventRecord {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            start_time: "2024-01-01".to_string(),
            end_time: None,
            location: Location {
                address: "somewhere".to_string(),
                latitude: lat,
                longitude: lng,
            },
            dress_code: None,
            category: "Art".to_string(),
            image_url: None,
        }
    }

    #[test]
    fn test_single_event_is_centered() {
        let markers = MapProjector::default().project(&[at("a", Some(37.7), Some(-122.4))]);
        assert_eq!(markers, vec![MarkerPosition { id: "a".into(), x: 50.0, y: 50.0 }]);
    }

    #[test]
    fn test_identical_coordinates_are_centered() {
        let events = [at("a", Some(10.0), Some(20.0)), at("b", Some(10.0), Some(20.0))];
        for m in MapProjector::default().project(&events) {
            assert_eq!((m.x, m.y), (50.0, 50.0));
        }
    }

    #[test]
    fn test_zero_extent_on_one_axis_is_centered() {
        let events = [at("a", Some(10.0), Some(20.0)), at("b", Some(10.0), Some(25.0))];
        for m in MapProjector::default().project(&events) {
            assert_eq!((m.x, m.y), (50.0, 50.0));
        }
    }

    #[test]
    fn test_extremes_stay_inside_inset() {
        let events = [
            at("sw", Some(37.0), Some(-123.0)),
            at("ne", Some(38.0), Some(-122.0)),
            at("mid", Some(37.5), Some(-122.5)),
        ];
        let markers = MapProjector::default().project(&events);
        let ne = &markers[1];
        let sw = &markers[0];

        // North-east: right and top.
        assert!(ne.x > 50.0 && ne.x < 100.0 && ne.x <= 92.0);
        assert!(ne.y < 50.0 && ne.y > 0.0 && ne.y >= 8.0);
        // South-west: left and bottom.
        assert!(sw.x < 50.0 && sw.x >= 8.0);
        assert!(sw.y > 50.0 && sw.y <= 92.0);

        let mid = &markers[2];
        assert!((mid.x - 50.0).abs() < 1e-9);
        assert!((mid.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_padding_math() {
        let events = [at("a", Some(0.0), Some(0.0)), at("b", Some(10.0), Some(10.0))];
        let markers = MapProjector::new(ProjectionConfig {
            padding: 0.15,
            inset_min: 0.0,
            inset_max: 100.0,
        })
        .project(&events);
        let expected = 0.15 / 1.3 * 100.0;
        assert!((markers[0].x - expected).abs() < 1e-9);
        assert!((markers[1].y - expected).abs() < 1e-9);
    }

    #[test]
    fn test_inset_clamps_without_padding() {
        let events = [at("a", Some(0.0), Some(0.0)), at("b", Some(10.0), Some(10.0))];
        let markers = MapProjector::new(ProjectionConfig {
            padding: 0.0,
            inset_min: 5.0,
            inset_max: 95.0,
        })
        .project(&events);
        assert_eq!((markers[0].x, markers[0].y), (5.0, 95.0));
        assert_eq!((markers[1].x, markers[1].y), (95.0, 5.0));
    }

    #[test]
    fn test_unplottable_records_are_excluded() {
        let events = [
            at("a", Some(0.0), Some(0.0)),
            at("missing", None, Some(5.0)),
            at("bad", Some(120.0), Some(5.0)),
            at("b", Some(10.0), Some(10.0)),
        ];
        let projector = MapProjector::default();
        let ids: Vec<_> = projector.project(&events).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let bounds = projector.bounds(&events).unwrap();
        assert_eq!(bounds.max_lat, 10.0);
        assert_eq!(projector.center(&events), (5.0, 5.0));
    }

    #[test]
    fn test_nothing_plottable() {
        let projector = MapProjector::default();
        assert!(projector.project(&[at("x", None, None)]).is_empty());
        assert!(projector.project(&[]).is_empty());
        assert_eq!(projector.center(&[]), (DEFAULT_CENTER_LAT, DEFAULT_CENTER_LNG));
    }

    #[test]
    fn test_config_validation() {
        assert!(ProjectionConfig::default().validate().is_ok());
        let bad = ProjectionConfig { padding: -0.1, ..ProjectionConfig::default() };
        assert!(bad.validate().is_err());
        let inverted = ProjectionConfig { padding: 0.1, inset_min: 60.0, inset_max: 40.0 };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_maps_search_url() {
        let url = maps_search_url(&at("a", Some(37.5), Some(-122.25))).unwrap();
        assert_eq!(url, "https://www.google.com/maps/search/?api=1&query=37.5,-122.25");
        assert!(maps_search_url(&at("b", None, None)).is_none());
    }
}
