//! Core types used by the container management subsystem.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error_handling::types::ContainerError;
use crate::preset_management::types::{NamedPorts, DEFAULT_PORT};

/// Aggregate counters describing the current and historical container state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// Number of containers currently tracked as active.
    pub active_count: usize,
    /// Total number of containers created since manager init.
    pub total_created: u64,
    /// Number of start-ups or stops that failed.
    pub failed_count: u64,
}

/// What the runtime needs to create one container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Unique identifier, also used as the runtime's container name.
    pub id: String,
    pub image: String,
    pub ports: NamedPorts,
    pub env: Vec<(String, String)>,
}

/// Handle describing a running container instance.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    /// Unique identifier for the container (e.g., `dockside-etcd-<uuid>`).
    pub id: String,
    /// Image the container was created from.
    pub image: String,
    /// Host the published ports are reachable on.
    pub host: String,
    /// Host port published for each named container port.
    pub ports: BTreeMap<String, u16>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ContainerHandle {
    /// `host:port` for the named port.
    pub fn address(&self, name: &str) -> Result<String, ContainerError> {
        self.ports
            .get(name)
            .map(|port| format!("{}:{}", self.host, port))
            .ok_or_else(|| ContainerError::UnknownPort(name.to_string()))
    }

    pub fn default_address(&self) -> Result<String, ContainerError> {
        self.address(DEFAULT_PORT)
    }
}
