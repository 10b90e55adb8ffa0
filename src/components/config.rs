// Application properties and bridge configuration

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{PushError, PushResult};

/// Application property holding the default sender id
pub const DEFAULT_SENDER_ID_PROPERTY: &str = "GCM_sender_id";

/// String-keyed application-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppProperties(HashMap<String, String>);

impl AppProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Property value, or `default` when absent
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn from_json_str(json: &str) -> PushResult<Self> {
        serde_json::from_str(json).map_err(|e| PushError::Config {
            message: format!("application properties: {e}"),
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AppProperties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Presentation settings for backends that surface background messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub app_name: String,
    /// Icon resource name passed to the notification server
    pub app_icon: String,
    /// Payload key used as the notification summary
    pub title_key: String,
    /// Payload key used as the notification body
    pub body_key: String,
    /// `None` lets the notification server decide
    pub expire_timeout_ms: Option<i32>,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            app_name: "kodegen".to_string(),
            app_icon: "appicon".to_string(),
            title_key: "title".to_string(),
            body_key: "message".to_string(),
            expire_timeout_ms: None,
        }
    }
}

/// Bridge-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Application property consulted for the default sender id
    pub sender_id_property: String,
    /// Buffered events per broadcast subscriber before lagging
    pub broadcast_capacity: usize,
    pub handoff: HandoffConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sender_id_property: DEFAULT_SENDER_ID_PROPERTY.to_string(),
            broadcast_capacity: 64,
            handoff: HandoffConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> PushResult<Self> {
        serde_json::from_str(json).map_err(|e| PushError::Config {
            message: format!("bridge config: {e}"),
        })
    }

    /// Default sender id from `properties`, if set and non-empty
    pub fn default_sender_id(&self, properties: &AppProperties) -> Option<String> {
        let id = properties.get_string(&self.sender_id_property, "");
        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}
