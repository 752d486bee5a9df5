use crate::apis::envelope::unwrap_events;
use crate::config::ApiConfig;
use crate::constants::{CREATE_EVENT_PATH, EVENTS_PATH};
use crate::error::{EventsError, Result};
use crate::metrics;
use crate::types::{EventRecord, EventSource, FilterState, NewEvent};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

/// HTTP client for the events backend
#[derive(Clone)]
pub struct EventsApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl EventsApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_seconds,
        })
    }

    pub fn events_url(&self) -> String {
        format!("{}{}", self.base_url, EVENTS_PATH)
    }

    pub fn create_url(&self) -> String {
        format!("{}{}", self.base_url, CREATE_EVENT_PATH)
    }

    /// GET the event list, sending the active filters as query parameters.
    #[instrument(skip(self, filters), fields(url = %self.events_url()))]
    pub async fn fetch_events(&self, filters: &FilterState) -> Result<Vec<EventRecord>> {
        let started = Instant::now();
        let query = filters.to_query_pairs();
        debug!("Fetching events with {} query params", query.len());

        let result = self.fetch_inner(&query).await;
        match &result {
            Ok((events, skipped)) => {
                let elapsed = started.elapsed().as_secs_f64();
                metrics::record_fetch_success(elapsed, events.len(), *skipped);
                info!("Fetched {} events in {:.2}s", events.len(), elapsed);
            }
            Err(e) => {
                metrics::record_fetch_error(error_kind(e));
                warn!("Error fetching events: {}", e);
            }
        }
        result.map(|(events, _)| events)
    }

    async fn fetch_inner(&self, query: &[(&'static str, String)]) -> Result<(Vec<EventRecord>, usize)> {
        let response = self
            .client
            .get(self.events_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let response = check_status(response).await?;
        let text = response.text().await.map_err(|e| self.classify(e))?;
        let body: Value = serde_json::from_str(&text)?;
        let unwrapped = unwrap_events(&body)?;
        debug!("Unwrapped events using {:?}", unwrapped.strategy);
        Ok((unwrapped.events, unwrapped.skipped))
    }

    /// Fetch through `latest`, aborting whatever fetch it was running.
    pub async fn fetch_latest(
        &self,
        latest: &LatestRequest,
        filters: FilterState,
    ) -> Result<Vec<EventRecord>> {
        let client = self.clone();
        latest
            .run(async move { client.fetch_events(&filters).await })
            .await
    }

    /// POST a new event to the backend.
    #[instrument(skip(self, event), fields(name = %event.name))]
    pub async fn submit_event(&self, event: &NewEvent) -> Result<()> {
        event.validate()?;

        let result: Result<()> = async {
            let response = self
                .client
                .post(self.create_url())
                .json(event)
                .send()
                .await
                .map_err(|e| self.classify(e))?;
            check_status(response).await?;
            Ok(())
        }
        .await;

        metrics::record_submit(result.is_ok());
        match &result {
            Ok(()) => info!("Event created"),
            Err(e) => warn!("Failed to create event: {}", e),
        }
        result
    }

    fn classify(&self, e: reqwest::Error) -> EventsError {
        if e.is_timeout() {
            EventsError::Timeout(self.timeout_secs)
        } else {
            EventsError::Http(e)
        }
    }
}

#[async_trait::async_trait]
impl EventSource for EventsApiClient {
    fn source_name(&self) -> &'static str {
        "events_api"
    }

    async fn fetch_events(&self, filters: &FilterState) -> Result<Vec<EventRecord>> {
        EventsApiClient::fetch_events(self, filters).await
    }
}

/// Turn a non-success response into `EventsError::Status`, preferring the
/// backend's own message.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EventsError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            format!(
                "Request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string()
        })
}

fn error_kind(e: &EventsError) -> &'static str {
    match e {
        EventsError::Timeout(_) => "timeout",
        EventsError::Status { .. } => "status",
        EventsError::Envelope(_) | EventsError::Json(_) => "envelope",
        EventsError::Superseded => "superseded",
        _ => "http",
    }
}

/// Keeps at most one request in flight: starting a new one aborts the
/// previous, which then resolves to [`EventsError::Superseded`].
#[derive(Default)]
pub struct LatestRequest {
    current: Mutex<Option<AbortHandle>>,
}

impl LatestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(fut);
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = current.replace(handle.abort_handle()) {
                previous.abort();
            }
        }

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                debug!("Request superseded");
                metrics::record_fetch_error("superseded");
                Err(EventsError::Superseded)
            }
            Err(e) => Err(EventsError::Task(e.to_string())),
        }
    }

    /// Abort the in-flight request, if any.
    pub fn cancel(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = current.take() {
            handle.abort();
        }
    }
}
