//! Container management subsystem.
//!
//! This module drives presets through their container lifecycle: create the
//! container through a [`ContainerRuntime`], wait until the service answers
//! real requests, seed it once, and remove it again. The runtime itself is a
//! seam; [`DockerCliRuntime`] implements it on top of the `docker` CLI.
//!
//! Re-exports:
//! - [`ContainerManager`]: main entry point to start/stop preset containers.
//! - [`ContainerHandle`], [`ContainerStats`], [`ContainerSpec`]: core types.
//!
//! Example (non-running):
//! ```ignore
//! use dockside::configuration::OrchestratorConfig;
//! use dockside::container_management::ContainerManager;
//! use dockside::preset_management::{with_version, Context};
//! use dockside::presets::etcd;
//!
//! // Create a manager (will fail if `docker` is not available)
//! let manager = ContainerManager::with_docker(&OrchestratorConfig::default())?;
//! let mut preset = etcd::preset(vec![with_version("3.5")]);
//! let container = manager.start(&mut preset, &Context::background()).await?;
//! println!("etcd at {}", container.default_address()?);
//! manager.stop(&container).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod container_manager;
pub mod runtime;
pub mod types;

pub use container_manager::ContainerManager;
pub use runtime::{ContainerRuntime, DockerCliRuntime};
pub use types::{ContainerHandle, ContainerSpec, ContainerStats};
