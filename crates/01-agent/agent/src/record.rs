//! Pageview records served to the dashboard by `GET /api/v1/pageviews`.
//!
//! The canonical form is snake_case with nested descriptors. Older payloads
//! used capitalized keys (`Timestamp`, `Country.Name`, `Referrer.Host`) or flat
//! strings; both are accepted on input and normalized on output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const PAGEVIEWS_PATH: &str = "/api/v1/pageviews";

/// Dashboard query path, optionally scoped to one domain.
pub fn pageviews_path(domain_id: Option<i64>) -> String {
    match domain_id {
        Some(id) => format!("{PAGEVIEWS_PATH}?domain_id={id}"),
        None => PAGEVIEWS_PATH.to_owned(),
    }
}

/// Named dimension such as a country, browser, OS or device type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Named {
    pub name: String,
}

impl Named {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Referring site, reduced to its host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefHost {
    pub host: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageviewRecord {
    #[serde(alias = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, alias = "Domain", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, alias = "Path")]
    pub path: String,
    #[serde(
        default,
        alias = "Country",
        deserialize_with = "named",
        skip_serializing_if = "Option::is_none"
    )]
    pub country: Option<Named>,
    #[serde(
        default,
        alias = "Browser",
        deserialize_with = "named",
        skip_serializing_if = "Option::is_none"
    )]
    pub browser: Option<Named>,
    #[serde(
        default,
        alias = "OS",
        deserialize_with = "named",
        skip_serializing_if = "Option::is_none"
    )]
    pub os: Option<Named>,
    #[serde(
        default,
        alias = "DeviceType",
        alias = "device",
        deserialize_with = "named",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_type: Option<Named>,
    #[serde(
        default,
        alias = "Referrer",
        deserialize_with = "ref_host",
        skip_serializing_if = "Option::is_none"
    )]
    pub referrer: Option<RefHost>,
}

impl PageviewRecord {
    pub fn new(timestamp: DateTime<Utc>, path: impl Into<String>) -> Self {
        Self {
            timestamp,
            domain: None,
            path: path.into(),
            country: None,
            browser: None,
            os: None,
            device_type: None,
            referrer: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Descriptor {
    Flat(String),
    Nested {
        #[serde(default, alias = "Name", alias = "Host", alias = "host")]
        name: Option<String>,
    },
}

impl Descriptor {
    fn into_value(self) -> Option<String> {
        let value = match self {
            Descriptor::Flat(value) => Some(value),
            Descriptor::Nested { name } => name,
        };
        value.filter(|v| !v.is_empty())
    }
}

fn descriptor<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let raw: Option<Descriptor> = Option::deserialize(de)?;
    Ok(raw.and_then(Descriptor::into_value))
}

fn named<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Named>, D::Error> {
    Ok(descriptor(de)?.map(Named::new))
}

fn ref_host<'de, D: Deserializer<'de>>(de: D) -> Result<Option<RefHost>, D::Error> {
    Ok(descriptor(de)?.map(|host| RefHost { host }))
}
