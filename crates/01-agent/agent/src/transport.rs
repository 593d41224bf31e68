//! Transport selection with ordered fallback.
//!
//! Strategies are tried in the fixed order Beacon, Request, Pixel. The first
//! one that accepts the event wins; nothing is retried and a fully exhausted
//! chain drops the event. Config may disable strategies but never reorders them.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{HostResult, TransportError};
use crate::event::PageviewEvent;

/// Content type sent by the Request transport.
pub const REQUEST_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

const VIEW_SUFFIX: &str = "/view";
const PIXEL_SUFFIX: &str = "/view.gif";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Beacon,
    Request,
    Pixel,
}

impl TransportKind {
    /// All strategies, highest priority first.
    pub const PRIORITY: [TransportKind; 3] = [
        TransportKind::Beacon,
        TransportKind::Request,
        TransportKind::Pixel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Beacon => "beacon",
            TransportKind::Request => "request",
            TransportKind::Pixel => "pixel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beacon" => Some(TransportKind::Beacon),
            "request" => Some(TransportKind::Request),
            "pixel" => Some(TransportKind::Pixel),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network primitives offered by the host environment.
///
/// None of these wait for a response. `supports` reports whether the
/// underlying capability exists at all; the send methods report synchronous
/// rejection only.
pub trait TransportHost {
    fn supports(&self, kind: TransportKind) -> bool;

    /// Queues a background POST. `Ok(false)` means the host refused to queue it.
    fn send_beacon(&self, url: &str, body: &str) -> HostResult<bool>;

    fn post_text(&self, url: &str, body: &str, content_type: &str) -> HostResult<()>;

    /// Issues a GET by loading `url` as an image resource.
    fn request_image(&self, url: &str) -> HostResult<()>;
}

/// Builds the GET URL used by the Pixel transport.
///
/// A trailing `/view` on the endpoint becomes `/view.gif`; other endpoints are
/// used unchanged.
pub fn pixel_url(endpoint: &str, event: &PageviewEvent) -> String {
    let base = match endpoint.strip_suffix(VIEW_SUFFIX) {
        Some(prefix) => format!("{prefix}{PIXEL_SUFFIX}"),
        None => endpoint.to_owned(),
    };
    format!(
        "{base}?domain={}&path={}&ref={}",
        urlencoding::encode(&event.domain),
        urlencoding::encode(&event.path),
        urlencoding::encode(&event.referrer),
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(TransportKind),
    Failed,
}

impl DeliveryOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, DeliveryOutcome::Delivered(_))
    }
}

/// Result of one `deliver` call plus every strategy that was skipped on the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    pub failures: SmallVec<[TransportError; 3]>,
}

/// Ordered set of enabled strategies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportChain {
    enabled: SmallVec<[TransportKind; 3]>,
}

impl Default for TransportChain {
    fn default() -> Self {
        Self::all()
    }
}

impl TransportChain {
    pub fn all() -> Self {
        Self {
            enabled: SmallVec::from_slice(&TransportKind::PRIORITY),
        }
    }

    /// Enables only `kinds`. Order and duplicates in `kinds` are ignored.
    pub fn only(kinds: &[TransportKind]) -> Self {
        let enabled = TransportKind::PRIORITY
            .iter()
            .copied()
            .filter(|kind| kinds.contains(kind))
            .collect();
        Self { enabled }
    }

    pub fn is_enabled(&self, kind: TransportKind) -> bool {
        self.enabled.contains(&kind)
    }

    pub fn enabled(&self) -> &[TransportKind] {
        &self.enabled
    }

    /// Tries each strategy once, in priority order, until one accepts `event`.
    pub fn deliver<H: TransportHost + ?Sized>(
        &self,
        host: &H,
        endpoint: &str,
        event: &PageviewEvent,
    ) -> DeliveryReport {
        let mut failures = SmallVec::new();
        let mut body: Option<Result<String, TransportError>> = None;

        for kind in TransportKind::PRIORITY {
            if !self.is_enabled(kind) {
                failures.push(TransportError::Disabled(kind));
                continue;
            }
            if !host.supports(kind) {
                log::trace!("transport {kind} unavailable, falling through");
                failures.push(TransportError::Unavailable(kind));
                continue;
            }

            let attempt = match kind {
                TransportKind::Pixel => send_pixel(host, endpoint, event),
                TransportKind::Beacon => body
                    .get_or_insert_with(|| event.to_json())
                    .clone()
                    .and_then(|json| send_beacon(host, endpoint, &json)),
                TransportKind::Request => body
                    .get_or_insert_with(|| event.to_json())
                    .clone()
                    .and_then(|json| send_request(host, endpoint, &json)),
            };

            match attempt {
                Ok(()) => {
                    log::debug!("pageview {} delivered via {kind}", event.path);
                    return DeliveryReport {
                        outcome: DeliveryOutcome::Delivered(kind),
                        failures,
                    };
                }
                Err(err) => {
                    log::debug!("transport {kind} failed: {err}");
                    failures.push(err);
                }
            }
        }

        DeliveryReport {
            outcome: DeliveryOutcome::Failed,
            failures,
        }
    }
}

fn send_beacon<H: TransportHost + ?Sized>(
    host: &H,
    endpoint: &str,
    body: &str,
) -> Result<(), TransportError> {
    match host.send_beacon(endpoint, body) {
        Ok(true) => Ok(()),
        Ok(false) => Err(TransportError::rejected(
            TransportKind::Beacon,
            "beacon not queued",
        )),
        Err(err) => Err(TransportError::rejected(
            TransportKind::Beacon,
            err.to_string(),
        )),
    }
}

fn send_request<H: TransportHost + ?Sized>(
    host: &H,
    endpoint: &str,
    body: &str,
) -> Result<(), TransportError> {
    host.post_text(endpoint, body, REQUEST_CONTENT_TYPE)
        .map_err(|err| TransportError::rejected(TransportKind::Request, err.to_string()))
}

fn send_pixel<H: TransportHost + ?Sized>(
    host: &H,
    endpoint: &str,
    event: &PageviewEvent,
) -> Result<(), TransportError> {
    host.request_image(&pixel_url(endpoint, event))
        .map_err(|err| TransportError::rejected(TransportKind::Pixel, err.to_string()))
}
