//! Pageview records and the live page reads they are built from.

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Document loading phase as reported by `document.readyState`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// Parses the DOM string form. Unknown values are treated as still loading.
    pub fn parse(value: &str) -> Self {
        match value {
            "complete" => ReadyState::Complete,
            "interactive" => ReadyState::Interactive,
            _ => ReadyState::Loading,
        }
    }

    pub fn is_complete(self) -> bool {
        self == ReadyState::Complete
    }
}

/// Live view of the page the agent is embedded in.
///
/// Every read happens at call time; implementations must not cache values
/// because SPA navigations change the pathname underneath the agent.
pub trait PageContext {
    fn hostname(&self) -> String;
    fn pathname(&self) -> String;
    /// Referrer as recorded by the document; empty for direct visits.
    fn referrer(&self) -> String;
    fn ready_state(&self) -> ReadyState;
}

/// One pageview as emitted on the wire: `{domain, path, ref}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageviewEvent {
    pub domain: String,
    pub path: String,
    #[serde(rename = "ref", default)]
    pub referrer: String,
}

impl PageviewEvent {
    pub fn new(
        domain: impl Into<String>,
        path: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            path: path.into(),
            referrer: referrer.into(),
        }
    }

    /// Reads hostname, pathname and referrer from the page right now.
    pub fn capture<P: PageContext + ?Sized>(page: &P) -> Self {
        Self {
            domain: page.hostname(),
            path: page.pathname(),
            referrer: page.referrer(),
        }
    }

    /// JSON body used by the POST transports.
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|err| TransportError::Encode(err.to_string()))
    }
}

/// Partial pageview supplied by page-author code through the command queue.
///
/// Absent fields are filled from the live page when the command is dispatched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageviewOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl PageviewOverrides {
    /// Builds the event, reading the page only for fields that were not supplied.
    pub fn resolve<P: PageContext + ?Sized>(self, page: &P) -> PageviewEvent {
        PageviewEvent {
            domain: self.domain.unwrap_or_else(|| page.hostname()),
            path: self.path.unwrap_or_else(|| page.pathname()),
            referrer: self.referrer.unwrap_or_else(|| page.referrer()),
        }
    }
}
