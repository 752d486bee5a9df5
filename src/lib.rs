pub mod apis;
pub mod cache;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod logging;
pub mod map;
pub mod metrics;
pub mod types;

pub use cache::EventCache;
pub use dashboard::{Dashboard, Snapshot};
pub use error::{EventsError, Result};
pub use map::{MapProjector, MarkerPosition, ProjectionConfig};
pub use types::{EventRecord, EventSource, FilterState, Location, NewEvent};
