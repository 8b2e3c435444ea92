//! Dashboard configuration loading.

#![allow(missing_docs)]

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use sensordash_core::{DashboardConfig, TopicClassifier};
use serde::Deserialize;
use smol_str::SmolStr;

use crate::connection::DEFAULT_RECONNECT_DELAY;
use crate::error::DashError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP origin serving the history endpoints, without any path.
    pub base_url: SmolStr,
    /// Live stream endpoint, derived from `base_url`.
    pub ws_url: SmolStr,
    pub reconnect_delay: Duration,
    pub history_timeout: Duration,
}

impl ServerConfig {
    pub fn new(base_url: &str) -> Result<Self, DashError> {
        let authority = origin_authority(base_url)?;
        Ok(Self {
            base_url: format!("http://{authority}").into(),
            ws_url: format!("ws://{authority}/ws").into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashConfig {
    pub server: ServerConfig,
    pub dashboard: DashboardConfig,
    pub log_level: SmolStr,
    /// Extra location labels, layered over the built-in table.
    pub location_labels: IndexMap<SmolStr, SmolStr>,
    /// Extra ignore-list entries, appended to the built-in list.
    pub ignore: Vec<SmolStr>,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: SmolStr::new_static(DEFAULT_BASE_URL),
                ws_url: SmolStr::new_static("ws://localhost:8000/ws"),
                reconnect_delay: DEFAULT_RECONNECT_DELAY,
                history_timeout: DEFAULT_HISTORY_TIMEOUT,
            },
            dashboard: DashboardConfig::default(),
            log_level: SmolStr::new_static(DEFAULT_LOG_LEVEL),
            location_labels: IndexMap::new(),
            ignore: Vec::new(),
        }
    }
}

impl DashConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DashError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| DashError::InvalidConfig(format!("dashboard.toml: {err}").into()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, DashError> {
        let raw: DashToml = toml::from_str(text)
            .map_err(|err| DashError::InvalidConfig(format!("dashboard.toml: {err}").into()))?;
        raw.into_config()
    }

    /// Replaces the server origin, re-deriving the stream endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, DashError> {
        let server = ServerConfig::new(base_url)?;
        self.server.base_url = server.base_url;
        self.server.ws_url = server.ws_url;
        Ok(self)
    }

    /// Builds the topic classifier with the configured labels and ignores.
    #[must_use]
    pub fn classifier(&self) -> TopicClassifier {
        let classifier = self
            .location_labels
            .iter()
            .fold(TopicClassifier::new(), |classifier, (location, label)| {
                classifier.with_label(location.clone(), label.clone())
            });
        self.ignore
            .iter()
            .fold(classifier, |classifier, entry| classifier.with_ignored(entry.clone()))
    }
}

/// Host and port of an `http://` origin. Any path is dropped: the stream
/// lives at `/ws` and history at `/api/*` on the same origin. `https` is
/// rejected because the stream client has no TLS support.
fn origin_authority(base_url: &str) -> Result<&str, DashError> {
    let base_url = base_url.trim();
    let Some(rest) = base_url.strip_prefix("http://") else {
        let hint = if base_url.starts_with("https://") {
            " (TLS is not supported)"
        } else {
            ""
        };
        return Err(DashError::InvalidConfig(
            format!("server.url must start with http:// (got '{base_url}'){hint}").into(),
        ));
    };
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(DashError::InvalidConfig(
            format!("server.url has no host '{base_url}'").into(),
        ));
    }
    Ok(authority)
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DashToml {
    server: Option<ServerSection>,
    dashboard: Option<DashboardSection>,
    log: Option<LogSection>,
    topics: Option<TopicsSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    url: Option<String>,
    reconnect_delay_ms: Option<u64>,
    history_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DashboardSection {
    series_capacity: Option<usize>,
    interval_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopicsSection {
    ignore: Option<Vec<String>>,
    labels: Option<IndexMap<String, String>>,
}

impl DashToml {
    fn into_config(self) -> Result<DashConfig, DashError> {
        let defaults = DashConfig::default();

        let server = match self.server {
            Some(section) => {
                let mut server =
                    ServerConfig::new(section.url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;
                if let Some(ms) = section.reconnect_delay_ms {
                    if ms == 0 {
                        return Err(DashError::InvalidConfig(
                            "server.reconnect_delay_ms must be greater than zero".into(),
                        ));
                    }
                    server.reconnect_delay = Duration::from_millis(ms);
                }
                if let Some(ms) = section.history_timeout_ms {
                    if ms == 0 {
                        return Err(DashError::InvalidConfig(
                            "server.history_timeout_ms must be greater than zero".into(),
                        ));
                    }
                    server.history_timeout = Duration::from_millis(ms);
                }
                server
            }
            None => defaults.server,
        };

        let mut dashboard = defaults.dashboard;
        if let Some(section) = self.dashboard {
            if let Some(capacity) = section.series_capacity {
                if capacity == 0 {
                    return Err(DashError::InvalidConfig(
                        "dashboard.series_capacity must be greater than zero".into(),
                    ));
                }
                dashboard.series_capacity = capacity;
            }
            if let Some(limit) = section.interval_limit {
                if limit == 0 {
                    return Err(DashError::InvalidConfig(
                        "dashboard.interval_limit must be greater than zero".into(),
                    ));
                }
                dashboard.interval_limit = limit;
            }
        }

        let log_level = match self.log {
            Some(section) => parse_log_level(&section.level)?,
            None => defaults.log_level,
        };

        let (ignore, location_labels) = match self.topics {
            Some(section) => (
                section
                    .ignore
                    .unwrap_or_default()
                    .into_iter()
                    .map(SmolStr::new)
                    .collect(),
                section
                    .labels
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(location, label)| (SmolStr::new(location), SmolStr::new(label)))
                    .collect(),
            ),
            None => (Vec::new(), IndexMap::new()),
        };

        Ok(DashConfig {
            server,
            dashboard,
            log_level,
            location_labels,
            ignore,
        })
    }
}

fn parse_log_level(text: &str) -> Result<SmolStr, DashError> {
    let level = text.trim().to_ascii_lowercase();
    match level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => Ok(level.into()),
        _ => Err(DashError::InvalidConfig(
            format!("invalid log.level '{text}'").into(),
        )),
    }
}
