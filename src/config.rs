use crate::error::SnapshotError;
use crate::model::ViewLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// What happens when a newly created field never shows up in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExhaustionPolicy {
    /// Stop silently; the operator attaches the field by hand.
    #[default]
    Abandon,
    /// Remember the attachment so `retry_pending` can finish it on request.
    Park,
}

/// Tunables for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub exhaustion_policy: ExhaustionPolicy,
    /// Route parameter consulted when no view in scope carries an object id.
    pub object_route_param: String,
    /// Read a view from storage before writing a new field list to it.
    pub refresh_before_write: bool,
    pub default_layout: ViewLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 300,
            max_poll_attempts: 10,
            exhaustion_policy: ExhaustionPolicy::Abandon,
            object_route_param: "objectId".to_string(),
            refresh_before_write: true,
            default_layout: ViewLayout::default(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Json(e.to_string()))
    }

    /// Load configuration from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: &str) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path).map_err(|e| SnapshotError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "maxPollAttempts": 3, "exhaustionPolicy": "park" }"#)
                .unwrap();
        assert_eq!(config.max_poll_attempts, 3);
        assert_eq!(config.exhaustion_policy, ExhaustionPolicy::Park);
        assert_eq!(config.poll_interval_ms, 300);
        assert_eq!(config.object_route_param, "objectId");
    }
}
