use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::configuration::types::OrchestratorConfig;
use crate::container_management::runtime::{ContainerRuntime, DockerCliRuntime};
use crate::container_management::types::{ContainerHandle, ContainerSpec, ContainerStats};
use crate::error_handling::types::{ContainerError, StartError};
use crate::preset_management::context::{Context, Interrupted};
use crate::preset_management::options::{HealthCheckFn, InitFn, StartOption};
use crate::preset_management::preset::Preset;

/// Drives presets through their container lifecycle and keeps bookkeeping.
///
/// For every [`ContainerManager::start`] the manager:
/// - runs the preset's defaulting pass and collects its options,
/// - asks the runtime for a container built from the preset's image and ports,
/// - polls the preset's health check every `health_interval` until it passes or
///   `health_timeout` elapses,
/// - runs the preset's init hook exactly once, after the first passing check.
///
/// A container that fails any step after creation is removed before the error
/// is returned.
pub struct ContainerManager {
    runtime: Arc<dyn ContainerRuntime>,
    health_timeout: Duration,
    health_interval: Duration,
    active_containers: Mutex<HashMap<String, ContainerHandle>>,
    stats: Mutex<ContainerStats>,
}

fn interrupted(reason: Interrupted) -> StartError {
    match reason {
        Interrupted::Cancelled => StartError::Cancelled,
        Interrupted::DeadlineExceeded => StartError::DeadlineExceeded,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ContainerManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &OrchestratorConfig) -> Self {
        info!(
            "Initializing ContainerManager (health timeout {:?}, interval {:?})",
            config.health_timeout(),
            config.health_interval()
        );
        ContainerManager {
            runtime,
            health_timeout: config.health_timeout(),
            health_interval: config.health_interval(),
            active_containers: Mutex::new(HashMap::new()),
            stats: Mutex::new(ContainerStats::default()),
        }
    }

    /// Creates a manager backed by the CLI runtime named in `config`.
    ///
    /// Returns an error if the runtime binary is not available on the host.
    pub fn with_docker(config: &OrchestratorConfig) -> Result<Self, ContainerError> {
        let runtime = DockerCliRuntime::new(&config.runtime_binary, &config.host)?;
        Ok(Self::new(Arc::new(runtime), config))
    }

    /// Starts a container for `preset` and returns it once it is healthy and
    /// seeded.
    pub async fn start(
        &self,
        preset: &mut dyn Preset,
        ctx: &Context,
    ) -> Result<ContainerHandle, StartError> {
        preset.apply_defaults();
        let mut health: Option<HealthCheckFn> = None;
        let mut init: Option<InitFn> = None;
        let mut env = Vec::new();
        for option in preset.options() {
            match option {
                StartOption::HealthCheck(f) => health = Some(f),
                StartOption::Init(f) => init = Some(f),
                StartOption::Env(key, value) => env.push((key, value)),
            }
        }

        let spec = ContainerSpec {
            id: format!("dockside-{}-{}", preset.name(), Uuid::new_v4()),
            image: preset.image(),
            ports: preset.ports(),
            env,
        };
        info!(
            "Creating container {} for preset {} ({})",
            spec.id,
            preset.name(),
            spec.image
        );

        let handle = match ctx.run(self.runtime.start(&spec)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("Failed to create container {}: {}", spec.id, e);
                lock(&self.stats).failed_count += 1;
                return Err(StartError::Runtime(e));
            }
            Err(reason) => {
                warn!("Creation of container {} interrupted: {:?}", spec.id, reason);
                self.discard(&ContainerHandle {
                    id: spec.id.clone(),
                    image: spec.image.clone(),
                    host: String::new(),
                    ports: Default::default(),
                    created_at: Utc::now(),
                })
                .await;
                return Err(interrupted(reason));
            }
        };
        lock(&self.stats).total_created += 1;

        if let Err(e) = self.wait_until_ready(ctx, &handle, health.as_ref()).await {
            error!("Container {} never became ready: {}", handle.id, e);
            self.discard(&handle).await;
            return Err(e);
        }

        if let Some(init) = init {
            debug!("Running init hook for container {}", handle.id);
            if let Err(e) = init(ctx.clone(), handle.clone()).await {
                self.discard(&handle).await;
                if let Some(reason) = ctx.err() {
                    warn!("Init hook for container {} interrupted: {}", handle.id, e);
                    return Err(interrupted(reason));
                }
                error!("Init hook failed for container {}: {}", handle.id, e);
                return Err(StartError::Init(e));
            }
        }

        lock(&self.active_containers).insert(handle.id.clone(), handle.clone());
        info!("Container {} is ready", handle.id);
        Ok(handle)
    }

    /// Polls `health` until it passes, the health timeout elapses, or `ctx`
    /// finishes. Attempts still in flight at the deadline are abandoned.
    async fn wait_until_ready(
        &self,
        ctx: &Context,
        handle: &ContainerHandle,
        health: Option<&HealthCheckFn>,
    ) -> Result<(), StartError> {
        let Some(health) = health else {
            debug!("No health check for container {}", handle.id);
            return Ok(());
        };

        let started = Instant::now();
        let poll_ctx = ctx.with_timeout(self.health_timeout);
        let mut attempts: u32 = 0;
        let mut last_error = None;

        loop {
            attempts += 1;
            match poll_ctx.run(health(poll_ctx.clone(), handle.clone())).await {
                Ok(Ok(())) => {
                    info!(
                        "Container {} healthy after {} attempt(s) in {:?}",
                        handle.id,
                        attempts,
                        started.elapsed()
                    );
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(
                        "Health check attempt {} failed for container {}: {}",
                        attempts, handle.id, e
                    );
                    last_error = Some(e);
                }
                Err(Interrupted::DeadlineExceeded) => break,
                Err(Interrupted::Cancelled) => return Err(StartError::Cancelled),
            }

            match poll_ctx.run(tokio::time::sleep(self.health_interval)).await {
                Ok(()) => {}
                Err(Interrupted::DeadlineExceeded) => break,
                Err(Interrupted::Cancelled) => return Err(StartError::Cancelled),
            }
        }

        warn!(
            "Giving up on container {} after {} health check attempt(s)",
            handle.id, attempts
        );
        Err(StartError::HealthCheckTimeout {
            image: handle.image.clone(),
            elapsed: started.elapsed(),
            last_error,
        })
    }

    /// Best-effort removal of a container that failed to start.
    async fn discard(&self, handle: &ContainerHandle) {
        lock(&self.stats).failed_count += 1;
        if let Err(e) = self.runtime.stop(handle).await {
            warn!("Failed to remove container {}: {}", handle.id, e);
        }
    }

    /// Stops a container and forgets about it.
    pub async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        info!("Stopping container: {}", handle.id);
        lock(&self.active_containers).remove(&handle.id);
        if let Err(e) = self.runtime.stop(handle).await {
            error!("Failed to stop container {}: {}", handle.id, e);
            lock(&self.stats).failed_count += 1;
            return Err(e);
        }
        debug!("Stopped container: {}", handle.id);
        Ok(())
    }

    /// Stops all tracked containers, continuing on errors and counting failures.
    pub async fn stop_all(&self) {
        let handles: Vec<ContainerHandle> =
            lock(&self.active_containers).values().cloned().collect();
        info!("Stopping {} active containers", handles.len());

        for handle in handles {
            let _ = self.stop(&handle).await;
        }

        info!(
            "Stopped all containers (failures so far: {})",
            lock(&self.stats).failed_count
        );
    }

    /// Returns a snapshot of current counters. `active_count` is recomputed
    /// from the current registry to stay accurate.
    pub fn get_container_stats(&self) -> ContainerStats {
        let mut stats = lock(&self.stats).clone();
        stats.active_count = lock(&self.active_containers).len();
        debug!(
            "Retrieved container stats: active={}, total={}, failed={}",
            stats.active_count, stats.total_created, stats.failed_count
        );
        stats
    }

    pub fn get_container(&self, container_id: &str) -> Option<ContainerHandle> {
        lock(&self.active_containers).get(container_id).cloned()
    }

    /// Lists the identifiers of all active containers.
    pub fn list_active_containers(&self) -> Vec<String> {
        lock(&self.active_containers).keys().cloned().collect()
    }
}

impl Drop for ContainerManager {
    fn drop(&mut self) {
        let active = lock(&self.active_containers);
        if !active.is_empty() {
            warn!(
                "ContainerManager dropped with {} active containers - this may indicate a resource leak",
                active.len()
            );
            let remaining_ids: Vec<_> = active.keys().collect();
            warn!("Remaining container IDs: {:?}", remaining_ids);
        } else {
            debug!("ContainerManager dropped cleanly with no active containers");
        }
    }
}
