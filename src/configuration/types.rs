use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::preset_management::settings::PresetSettings;

/// Settings of the orchestrator driving preset lifecycles.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Docker-compatible CLI used to run containers.
    pub runtime_binary: String,
    /// Host address published container ports are bound to.
    pub host: String,
    /// Overall budget for a container to pass its health check.
    pub health_timeout_secs: u64,
    /// Pause between two health check attempts.
    pub health_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            runtime_binary: "docker".to_string(),
            host: "127.0.0.1".to_string(),
            health_timeout_secs: 60,
            health_interval_ms: 250,
        }
    }
}

impl OrchestratorConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }
}

/// `[preset]` section: which preset to start and how to configure it.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct PresetSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub settings: PresetSettings,
}
