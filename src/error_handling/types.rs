use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    UnknownPreset(String),
    NoPresetSelected,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::UnknownPreset(name) => write!(f, "Unknown preset: {}", name),
            ConfigError::NoPresetSelected => write!(f, "No preset selected"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

#[derive(Debug)]
pub enum ContainerError {
    RuntimeNotAvailable(String),
    StartFailed(String),
    StopFailed(String),
    PortResolutionFailed(String),
    UnknownPort(String),
    IoError(std::io::Error),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::RuntimeNotAvailable(e) => {
                write!(f, "Container runtime not available: {}", e)
            }
            ContainerError::StartFailed(e) => write!(f, "Container start failed: {}", e),
            ContainerError::StopFailed(e) => write!(f, "Container stop failed: {}", e),
            ContainerError::PortResolutionFailed(e) => {
                write!(f, "Container port resolution failed: {}", e)
            }
            ContainerError::UnknownPort(name) => write!(f, "Unknown named port: {}", name),
            ContainerError::IoError(e) => write!(f, "Container IO error: {}", e),
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ContainerError {
    fn from(err: std::io::Error) -> Self {
        ContainerError::IoError(err)
    }
}

/// Failure of a single operation run against a backing service, either one
/// health-check attempt or one seed write.
#[derive(Debug)]
pub enum ProbeError {
    /// The service could not be reached at all.
    Connection(String),
    /// The service was reached but the operation did not complete.
    Operation { op: String, detail: String },
    /// The attempt exceeded its own time budget and was abandoned.
    Timeout(Duration),
    /// The surrounding context was cancelled while the attempt was in flight.
    Cancelled,
    /// The container handle could not resolve the address to probe.
    Container(ContainerError),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Connection(e) => write!(f, "connection failed: {}", e),
            ProbeError::Operation { op, detail } => write!(f, "{} failed: {}", op, detail),
            ProbeError::Timeout(d) => write!(f, "attempt timed out after {:?}", d),
            ProbeError::Cancelled => write!(f, "attempt cancelled"),
            ProbeError::Container(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Container(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ContainerError> for ProbeError {
    fn from(err: ContainerError) -> Self {
        ProbeError::Container(err)
    }
}

/// A seed write was rejected. Writes before it stay applied.
#[derive(Debug)]
pub struct InitError {
    pub key: String,
    pub value: String,
    pub cause: ProbeError,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "can't set '{}'='{}': {}", self.key, self.value, self.cause)
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

#[derive(Debug)]
pub enum StartError {
    Runtime(ContainerError),
    HealthCheckTimeout {
        image: String,
        elapsed: Duration,
        last_error: Option<ProbeError>,
    },
    Cancelled,
    /// The caller's deadline passed outside of health polling.
    DeadlineExceeded,
    Init(InitError),
}

impl StartError {
    /// True when the service never became healthy in time or the caller's
    /// deadline passed, as opposed to an operational failure of the runtime
    /// or of a seed write.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            StartError::HealthCheckTimeout { .. } | StartError::DeadlineExceeded
        )
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::Runtime(e) => write!(f, "Runtime error: {}", e),
            StartError::HealthCheckTimeout {
                image,
                elapsed,
                last_error: Some(e),
            } => write!(
                f,
                "Container {} not healthy after {:?}: {}",
                image, elapsed, e
            ),
            StartError::HealthCheckTimeout {
                image,
                elapsed,
                last_error: None,
            } => write!(f, "Container {} not healthy after {:?}", image, elapsed),
            StartError::Cancelled => write!(f, "Start-up cancelled"),
            StartError::DeadlineExceeded => write!(f, "Start-up deadline exceeded"),
            StartError::Init(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartError::Runtime(e) => Some(e),
            StartError::HealthCheckTimeout {
                last_error: Some(e),
                ..
            } => Some(e),
            StartError::Init(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ContainerError> for StartError {
    fn from(err: ContainerError) -> Self {
        StartError::Runtime(err)
    }
}

impl From<InitError> for StartError {
    fn from(err: InitError) -> Self {
        StartError::Init(err)
    }
}
