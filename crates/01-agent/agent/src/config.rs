//! Page-lifetime agent configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::transport::{TransportChain, TransportKind};

/// Ingestion endpoint compiled into the agent.
pub const DEFAULT_ENDPOINT: &str = "https://updog.bartel.com/view";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub endpoint: String,
    /// Enables console diagnostics in the browser runtime.
    #[serde(default)]
    pub debug: bool,
    /// Strategies allowed to deliver; `None` means all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<TransportKind>>,
    /// Keys the agent does not interpret, kept so page code can read them back.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            debug: false,
            transports: None,
            extra: Map::new(),
        }
    }
}

impl Config {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn transport_chain(&self) -> TransportChain {
        match &self.transports {
            Some(kinds) => TransportChain::only(kinds),
            None => TransportChain::all(),
        }
    }

    /// Merges a `config` command payload key by key.
    ///
    /// Valid keys are applied even when others are rejected; the first
    /// rejection is returned.
    pub fn merge(&mut self, patch: &Map<String, Value>) -> ConfigResult<()> {
        let mut first_err = None;
        for (key, value) in patch {
            if let Err(err) = self.apply(key, value) {
                log::warn!("ignoring config key `{key}`: {err}");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(&mut self, key: &str, value: &Value) -> ConfigResult<()> {
        match key {
            "endpoint" => {
                let endpoint = value
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid(key, "a non-empty string"))?;
                self.endpoint = endpoint.to_owned();
            }
            "debug" => {
                self.debug = value.as_bool().ok_or_else(|| invalid(key, "a boolean"))?;
            }
            "transports" => {
                self.transports = Some(parse_transports(value)?);
            }
            _ => {
                self.extra.insert(key.to_owned(), value.clone());
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        expected,
    }
}

fn parse_transports(value: &Value) -> ConfigResult<Vec<TransportKind>> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("transports", "an array of transport names"))?;
    items
        .iter()
        .map(|item| {
            let name = item
                .as_str()
                .ok_or_else(|| invalid("transports", "an array of transport names"))?;
            TransportKind::parse(name).ok_or_else(|| ConfigError::UnknownTransport(name.to_owned()))
        })
        .collect()
}
