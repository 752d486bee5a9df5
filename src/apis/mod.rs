pub mod envelope;
pub mod events_api;

pub use events_api::{EventsApiClient, LatestRequest};
