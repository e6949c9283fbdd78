//! Playback Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MediaError;
use crate::types::MediaTime;
use fos_ipc::RoutingId;

/// Per-player tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Re-sampling period of the on-screen rectangle while it is moving
    pub geometry_update_interval_ms: u64,

    /// Value carried in the `Init` payload's `node_id`
    pub node_id: i32,

    /// Content up to this length is reported as one-shot
    pub one_shot_max_duration_secs: f64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            geometry_update_interval_ms: 50,
            node_id: 10,
            one_shot_max_duration_secs: 5.0,
        }
    }
}

impl ProxyConfig {
    /// Parse from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn geometry_update_interval(&self) -> Duration {
        Duration::from_millis(self.geometry_update_interval_ms)
    }

    pub fn one_shot_max_duration(&self) -> MediaTime {
        MediaTime::from_seconds(self.one_shot_max_duration_secs)
    }
}

/// Per-frame manager settings
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Route every message of this manager is scoped under
    pub routing_id: RoutingId,

    /// Upper 16 bits of every player id allocated here
    pub owner_discriminator: u16,
}

impl ManagerConfig {
    /// Discriminator derived from the current OS process id
    pub fn for_route(routing_id: RoutingId) -> Self {
        Self {
            routing_id,
            owner_discriminator: (std::process::id() & 0xFFFF) as u16,
        }
    }
}
