//! Core value types exchanged between presets and the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the port used when a caller does not ask for a specific one.
pub const DEFAULT_PORT: &str = "default";

/// Initial state to load into a service, keyed by the service-level key.
pub type SeedValues = BTreeMap<String, serde_json::Value>;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// A port exposed inside the container.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Port {
    pub protocol: Protocol,
    pub number: u16,
}

impl Port {
    pub fn tcp(number: u16) -> Self {
        Port {
            protocol: Protocol::Tcp,
            number,
        }
    }

    pub fn udp(number: u16) -> Self {
        Port {
            protocol: Protocol::Udp,
            number,
        }
    }
}

/// Ordered mapping from a logical port name to the port it designates.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct NamedPorts {
    ports: BTreeMap<String, Port>,
}

impl NamedPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding only [`DEFAULT_PORT`] bound to TCP `number`.
    pub fn default_tcp(number: u16) -> Self {
        NamedPorts::new().with(DEFAULT_PORT, Port::tcp(number))
    }

    pub fn with(mut self, name: &str, port: Port) -> Self {
        self.ports.insert(name.to_string(), port);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Port)> {
        self.ports.iter().map(|(name, port)| (name.as_str(), port))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Text form of a seed value as written to a service: strings verbatim,
/// everything else as compact JSON.
pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
