/// Storage key under which the single cached payload lives
pub const CACHE_KEY: &str = "events_cache";

/// How long a cached payload stays valid (5 minutes)
pub const CACHE_TTL_MS: i64 = 5 * 60 * 1000;

/// Category value meaning "no category filter"
pub const ALL_CATEGORIES: &str = "all";

// Backend endpoints
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const EVENTS_PATH: &str = "/api/events/";
pub const CREATE_EVENT_PATH: &str = "/api/events/create/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

// Map layout defaults
pub const DEFAULT_MAP_PADDING: f64 = 0.15;
pub const DEFAULT_MAP_INSET_MIN: f64 = 8.0;
pub const DEFAULT_MAP_INSET_MAX: f64 = 92.0;
pub const CANVAS_CENTER: f64 = 50.0;

/// Map center used when nothing can be plotted (San Francisco)
pub const DEFAULT_CENTER_LAT: f64 = 37.7749;
pub const DEFAULT_CENTER_LNG: f64 = -122.4194;

pub const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

// Local paths
pub const DEFAULT_CACHE_DIR: &str = ".event_cache";
pub const CONFIG_PATH: &str = "config.toml";
