use crate::error::{EventsError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Parse an event or filter timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM[:SS[.fff]]` (space separator
/// also accepted) and bare `YYYY-MM-DD`. Naive values are read as UTC; a
/// bare date is midnight of that day.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Geographic placement of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub address: String,
    #[serde(default, alias = "lat", deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon", deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(address: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            address: address.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// `(latitude, longitude)` when both are present, finite and in range.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.filter(|v| v.is_finite() && (-90.0..=90.0).contains(v))?;
        let lng = self.longitude.filter(|v| v.is_finite() && (-180.0..=180.0).contains(v))?;
        Some((lat, lng))
    }
}

/// A single event as consumed by filtering, caching and map layout.
///
/// Serializes with one canonical set of camelCase keys. Deserialization is
/// lenient about the shapes backends actually send: `eventname`/`title` for
/// the name, numeric ids, `image_url`/`image`, snake_case keys, and split
/// `startDate` + `startTime` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEvent", rename_all = "camelCase")]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub location: Location,
    pub dress_code: Option<String>,
    pub category: String,
    pub image_url: Option<String>,
}

impl EventRecord {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.start_time)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end_time.as_deref().and_then(parse_timestamp)
    }

    /// False only when both ends parse and the end precedes the start.
    pub fn has_valid_time_range(&self) -> bool {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default, deserialize_with = "lenient_id")]
    id: String,
    #[serde(default, alias = "eventname", alias = "event_name", alias = "title")]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "start_time")]
    start_time: Option<String>,
    #[serde(default, alias = "end_time")]
    end_time: Option<String>,
    #[serde(default, alias = "start_date")]
    start_date: Option<String>,
    #[serde(default, alias = "end_date")]
    end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_location")]
    location: Location,
    #[serde(default, alias = "dress_code")]
    dress_code: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "image_url", alias = "image")]
    image_url: Option<String>,
}

impl From<WireEvent> for EventRecord {
    fn from(wire: WireEvent) -> Self {
        Self {
            id: wire.id,
            name: wire.name.unwrap_or_default(),
            description: wire.description.unwrap_or_default(),
            start_time: merge_date_time(wire.start_date, wire.start_time).unwrap_or_default(),
            end_time: merge_date_time(wire.end_date, wire.end_time),
            location: wire.location,
            dress_code: wire.dress_code.filter(|s| !s.is_empty()),
            category: wire.category.unwrap_or_default(),
            image_url: wire.image_url.filter(|s| !s.is_empty()),
        }
    }
}

/// Join a split `date` + `time-of-day` pair into one timestamp string.
fn merge_date_time(date: Option<String>, time: Option<String>) -> Option<String> {
    let date = date.filter(|d| !d.trim().is_empty());
    let time = time.filter(|t| !t.trim().is_empty());
    match (date, time) {
        // A time without a date component, e.g. "18:30" or "19:00:00-07:00"
        (Some(d), Some(t)) if !has_date_prefix(&t) => Some(format!("{}T{}", d.trim(), t.trim())),
        (_, Some(t)) => Some(t),
        (Some(d), None) => Some(d),
        (None, None) => None,
    }
}

fn has_date_prefix(s: &str) -> bool {
    s.trim()
        .get(..10)
        .map_or(false, |prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok())
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn string_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_location<'de, D>(deserializer: D) -> std::result::Result<Location, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(address)) => Ok(Location {
            address,
            ..Location::default()
        }),
        Some(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(serde::de::Error::custom)
        }
        _ => Ok(Location::default()),
    }
}

/// The four independently optional filter inputs.
///
/// A `None` field means the predicate is not applied. Values are kept
/// exactly as entered; trimming and case folding happen at match time so the
/// cache can compare stored filters verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl FilterState {
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_start_date(mut self, date: impl Into<String>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn with_end_date(mut self, date: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    /// `(key, value)` pairs in wire-key form, for the fields that are set.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("location", self.location.as_deref()),
            ("category", self.category.as_deref()),
            ("startDate", self.start_date.as_deref()),
            ("endDate", self.end_date.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect()
    }

    /// Query parameters worth sending upstream: trimmed, non-blank, and
    /// without the "all" category sentinel.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        self.entries()
            .into_iter()
            .map(|(k, v)| (k, v.trim().to_string()))
            .filter(|(k, v)| {
                !v.is_empty()
                    && !(*k == "category"
                        && v.eq_ignore_ascii_case(crate::constants::ALL_CATEGORIES))
            })
            .collect()
    }

    /// Every field set, unset ones as `""`. Two normalized states carry the
    /// same keys, so a cache fingerprint comparison covers all of them.
    pub fn normalized(self) -> Self {
        Self {
            location: Some(self.location.unwrap_or_default()),
            category: Some(self.category.unwrap_or_default()),
            start_date: Some(self.start_date.unwrap_or_default()),
            end_date: Some(self.end_date.unwrap_or_default()),
        }
    }

    /// Whether any predicate would actually narrow a result set.
    pub fn is_active(&self) -> bool {
        !self.to_query_pairs().is_empty()
    }
}

/// Payload for creating an event on the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dress_code: String,
    pub start_date: String,
    pub start_time: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub end_time: String,
    pub location: Option<Location>,
    pub image: String,
}

impl NewEvent {
    /// Check required fields and that the end does not precede the start.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("name", self.name.as_str()),
            ("startDate", self.start_date.as_str()),
            ("startTime", self.start_time.as_str()),
            ("image", self.image.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(EventsError::MissingField(field.to_string()));
            }
        }
        if self.location.is_none() {
            return Err(EventsError::MissingField("location".to_string()));
        }

        let start = merge_date_time(Some(self.start_date.clone()), Some(self.start_time.clone()))
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| EventsError::Config(format!(
                "invalid start: {} {}",
                self.start_date, self.start_time
            )))?;

        // Without an end time there is nothing to order against.
        if self.end_time.trim().is_empty() {
            return Ok(());
        }
        let end_date = if self.end_date.trim().is_empty() {
            self.start_date.clone()
        } else {
            self.end_date.clone()
        };
        if let Some(end) = merge_date_time(Some(end_date), Some(self.end_time.clone()))
            .as_deref()
            .and_then(parse_timestamp)
        {
            if end < start {
                return Err(EventsError::Config("event ends before it starts".to_string()));
            }
        }
        Ok(())
    }
}

/// Anything that can produce the event list for a filter snapshot
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Short name used in logs
    fn source_name(&self) -> &'static str;

    /// Fetch events, letting the source narrow by `filters` where it can
    async fn fetch_events(&self, filters: &FilterState) -> Result<Vec<EventRecord>>;
}
