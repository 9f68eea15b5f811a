//! Options flowing in both directions of the preset contract.
//!
//! [`PresetOption`] configures a preset before hand-off; [`StartOption`] is
//! what a preset hands to the orchestrator.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::container_management::types::ContainerHandle;
use crate::error_handling::types::{InitError, ProbeError};
use crate::preset_management::context::Context;
use crate::preset_management::types::SeedValues;

/// One health-check attempt against a live container.
pub type HealthCheckFn =
    Arc<dyn Fn(Context, ContainerHandle) -> BoxFuture<'static, Result<(), ProbeError>> + Send + Sync>;

/// One-shot initialization run after the container first reports healthy.
pub type InitFn =
    Arc<dyn Fn(Context, ContainerHandle) -> BoxFuture<'static, Result<(), InitError>> + Send + Sync>;

/// Orchestrator-level options produced by [`crate::preset_management::preset::Preset::options`].
#[derive(Clone)]
pub enum StartOption {
    HealthCheck(HealthCheckFn),
    Init(InitFn),
    /// Environment variable passed to the container process.
    Env(String, String),
}

impl fmt::Debug for StartOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOption::HealthCheck(_) => write!(f, "HealthCheck(..)"),
            StartOption::Init(_) => write!(f, "Init(..)"),
            StartOption::Env(k, v) => write!(f, "Env({}={})", k, v),
        }
    }
}

pub fn health_check<F, Fut>(f: F) -> StartOption
where
    F: Fn(Context, ContainerHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
{
    StartOption::HealthCheck(Arc::new(move |ctx, container| Box::pin(f(ctx, container))))
}

pub fn init<F, Fut>(f: F) -> StartOption
where
    F: Fn(Context, ContainerHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), InitError>> + Send + 'static,
{
    StartOption::Init(Arc::new(move |ctx, container| Box::pin(f(ctx, container))))
}

/// Configuration mutations accepted by every preset, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum PresetOption {
    /// Pins the image tag. Empty means "use the preset's default".
    Version(String),
    /// Enables one-shot seeding after the service becomes healthy.
    Values(SeedValues),
}

pub fn with_version(tag: impl Into<String>) -> PresetOption {
    PresetOption::Version(tag.into())
}

pub fn with_values(values: SeedValues) -> PresetOption {
    PresetOption::Values(values)
}
