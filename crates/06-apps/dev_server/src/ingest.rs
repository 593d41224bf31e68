//! Wire-contract endpoints: pageview ingestion plus the dashboard listing.
//!
//! Accepted pageviews are kept in a bounded in-memory inbox so a developer can
//! watch what the agent emits. Nothing is persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use updog_agent::record::{RefHost, PAGEVIEWS_PATH};
use updog_agent::{PageviewEvent, PageviewRecord};

/// 1x1 transparent GIF returned by the pixel endpoint.
pub const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

/// Pageview as it arrives in a POST body or pixel query string.
#[derive(Debug, Default, Deserialize)]
struct WirePageview {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    path: String,
    #[serde(rename = "ref", default)]
    referrer: String,
}

impl WirePageview {
    fn into_event(self) -> Option<PageviewEvent> {
        if self.domain.is_empty() || self.path.is_empty() {
            return None;
        }
        Some(PageviewEvent::new(self.domain, self.path, self.referrer))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    domain_id: Option<i64>,
}

struct Inbox {
    retain: usize,
    /// Newest last; each entry carries its domain id.
    records: VecDeque<(i64, PageviewRecord)>,
    /// Domains with at least one retained record.
    domains: HashMap<String, DomainSlot>,
    next_id: i64,
}

struct DomainSlot {
    id: i64,
    live: usize,
}

impl Inbox {
    /// Ids are handed out in first-seen order and never reused, even after a
    /// domain's last record is evicted.
    fn admit(&mut self, domain: &str) -> i64 {
        if let Some(slot) = self.domains.get_mut(domain) {
            slot.live += 1;
            return slot.id;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.domains.insert(domain.to_owned(), DomainSlot { id, live: 1 });
        id
    }

    fn evict_oldest(&mut self) {
        let Some((_, record)) = self.records.pop_front() else {
            return;
        };
        let domain = record.domain.unwrap_or_default();
        if let Some(slot) = self.domains.get_mut(&domain) {
            slot.live -= 1;
            if slot.live == 0 {
                self.domains.remove(&domain);
            }
        }
    }
}

/// Shared handle to the in-memory inbox.
#[derive(Clone)]
pub struct AppState {
    inbox: Arc<Mutex<Inbox>>,
}

impl AppState {
    pub fn new(retain: usize) -> Self {
        Self {
            inbox: Arc::new(Mutex::new(Inbox {
                retain: retain.max(1),
                records: VecDeque::new(),
                domains: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Stores `event`, evicting the oldest record past the retention limit.
    /// Returns the domain id assigned to the event's domain.
    pub fn record(&self, event: PageviewEvent) -> i64 {
        let mut record = PageviewRecord::new(Utc::now(), event.path);
        record.referrer = referrer_host(&event.referrer).map(|host| RefHost { host });
        record.domain = Some(event.domain);

        let mut inbox = self.inbox.lock();
        let id = inbox.admit(record.domain.as_deref().unwrap_or_default());
        inbox.records.push_back((id, record));
        while inbox.records.len() > inbox.retain {
            inbox.evict_oldest();
        }
        id
    }

    /// Records newest first, optionally limited to one domain.
    pub fn list(&self, domain_id: Option<i64>) -> Vec<PageviewRecord> {
        let inbox = self.inbox.lock();
        inbox
            .records
            .iter()
            .rev()
            .filter(|(id, _)| domain_id.map_or(true, |wanted| *id == wanted))
            .map(|(_, record)| record.clone())
            .collect()
    }
}

/// Ingestion and dashboard routes.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/view", post(ingest_body))
        .route("/view.gif", get(ingest_pixel))
        .route(PAGEVIEWS_PATH, get(list_pageviews))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn ingest_body(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let wire: WirePageview = match serde_json::from_slice(&body) {
        Ok(wire) => wire,
        Err(err) => {
            debug!(%err, "rejecting pageview body");
            return json_error(StatusCode::BAD_REQUEST, "invalid JSON");
        }
    };
    match accept(&state, &headers, wire) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

async fn ingest_pixel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(wire): Query<WirePageview>,
) -> Response {
    match accept(&state, &headers, wire) {
        Ok(()) => (
            [
                (header::CONTENT_TYPE, "image/gif"),
                (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            ],
            TRANSPARENT_GIF,
        )
            .into_response(),
        Err(response) => response,
    }
}

async fn list_pageviews(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<PageviewRecord>> {
    Json(state.list(query.domain_id))
}

async fn healthz() -> &'static str {
    "OK\n"
}

fn accept(state: &AppState, headers: &HeaderMap, wire: WirePageview) -> Result<(), Response> {
    let event = wire
        .into_event()
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "missing required parameters"))?;
    check_origin(headers, &event.domain);
    info!(domain = %event.domain, path = %event.path, referrer = %event.referrer, "pageview");
    state.record(event);
    Ok(())
}

/// Warns when the request's Origin (or Referer) host differs from the domain
/// the event claims. Local hosts are exempt.
fn check_origin(headers: &HeaderMap, claimed: &str) {
    let source = headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|value| value.to_str().ok());
    let Some(host) = source.and_then(url_host) else {
        return;
    };
    if host != claimed && !is_local(&host) {
        warn!(%claimed, origin = %host, "request origin does not match claimed domain");
    }
}

fn is_local(host: &str) -> bool {
    host == "127.0.0.1" || host.ends_with("localhost")
}

fn url_host(value: &str) -> Option<String> {
    url::Url::parse(value)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
}

/// Reduces a referrer URL to its host; unparsable non-empty values are kept.
fn referrer_host(referrer: &str) -> Option<String> {
    if referrer.is_empty() {
        return None;
    }
    Some(url_host(referrer).unwrap_or_else(|| referrer.to_owned()))
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
