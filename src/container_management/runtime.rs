//! Container runtime seam.
//!
//! The manager only needs two things from a runtime: create a container from
//! a [`ContainerSpec`] and hand back its published addresses, and remove it
//! again. [`DockerCliRuntime`] implements both on top of the `docker` CLI.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

use crate::container_management::types::{ContainerHandle, ContainerSpec};
use crate::error_handling::types::ContainerError;
use crate::preset_management::types::Port;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates and starts a container, resolving a host port for every named port.
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError>;

    /// Stops and removes the container.
    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError>;
}

/// Runtime driving a Docker-compatible CLI (`docker`, `podman`, ...).
#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    binary: String,
    host: String,
}

impl DockerCliRuntime {
    /// Creates a runtime for `binary`, publishing ports on `host`.
    ///
    /// Returns an error if the binary cannot be executed.
    pub fn new(binary: &str, host: &str) -> Result<Self, ContainerError> {
        if !Self::is_runtime_available(binary) {
            error!("{} runtime is not available on this system", binary);
            return Err(ContainerError::RuntimeNotAvailable(binary.to_string()));
        }
        info!("Using container runtime: {}", binary);
        Ok(DockerCliRuntime {
            binary: binary.to_string(),
            host: host.to_string(),
        })
    }

    fn is_runtime_available(binary: &str) -> bool {
        let available = std::process::Command::new(binary)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);

        debug!("{} availability check: {}", binary, available);
        available
    }

    /// Arguments of the `run` invocation creating `spec`.
    fn run_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            spec.id.clone(),
        ];
        for (_, port) in spec.ports.iter() {
            args.push("--publish".to_string());
            args.push(format!("{}::{}/{}", self.host, port.number, port.protocol));
        }
        for (key, value) in &spec.env {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.image.clone());
        args
    }

    async fn exec(
        &self,
        args: &[String],
        on_error: fn(String) -> ContainerError,
    ) -> Result<String, ContainerError> {
        debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(on_error(format!(
                "`{} {}` exited with {}: {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn resolve_port(&self, id: &str, port: &Port) -> Result<u16, ContainerError> {
        let args = vec![
            "port".to_string(),
            id.to_string(),
            format!("{}/{}", port.number, port.protocol),
        ];
        let output = self
            .exec(&args, ContainerError::PortResolutionFailed)
            .await?;
        parse_port_output(&output).ok_or_else(|| {
            ContainerError::PortResolutionFailed(format!(
                "unexpected output for {}/{}: {:?}",
                port.number, port.protocol, output
            ))
        })
    }

    async fn resolve_ports(&self, spec: &ContainerSpec) -> Result<BTreeMap<String, u16>, ContainerError> {
        let mut ports = BTreeMap::new();
        for (name, port) in spec.ports.iter() {
            let host_port = self.resolve_port(&spec.id, port).await?;
            debug!(
                "Container {} port {} ({}/{}) published on {}",
                spec.id, name, port.number, port.protocol, host_port
            );
            ports.insert(name.to_string(), host_port);
        }
        Ok(ports)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn start(&self, spec: &ContainerSpec) -> Result<ContainerHandle, ContainerError> {
        info!("Starting container {} from {}", spec.id, spec.image);
        self.exec(&self.run_args(spec), ContainerError::StartFailed)
            .await?;

        let ports = match self.resolve_ports(spec).await {
            Ok(ports) => ports,
            Err(e) => {
                let _ = self
                    .exec(
                        &["rm".to_string(), "--force".to_string(), spec.id.clone()],
                        ContainerError::StopFailed,
                    )
                    .await
                    .map_err(|stop| warn!("Failed to remove container {}: {}", spec.id, stop));
                return Err(e);
            }
        };

        Ok(ContainerHandle {
            id: spec.id.clone(),
            image: spec.image.clone(),
            host: self.host.clone(),
            ports,
            created_at: Utc::now(),
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), ContainerError> {
        debug!("Removing container {}", handle.id);
        self.exec(
            &["rm".to_string(), "--force".to_string(), handle.id.clone()],
            ContainerError::StopFailed,
        )
        .await?;
        Ok(())
    }
}

/// Extracts the host port from `docker port` output such as
/// `0.0.0.0:49153` or `[::]:49153`, one mapping per line.
fn parse_port_output(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset_management::types::{NamedPorts, Port};

    fn runtime() -> DockerCliRuntime {
        DockerCliRuntime {
            binary: "docker".to_string(),
            host: "127.0.0.1".to_string(),
        }
    }

    #[test]
    fn run_args_publish_ports_and_pass_env() {
        let spec = ContainerSpec {
            id: "dockside-etcd-1".to_string(),
            image: "bitnami/etcd:3".to_string(),
            ports: NamedPorts::default_tcp(2379).with("dns", Port::udp(53)),
            env: vec![("ALLOW_NONE_AUTHENTICATION".to_string(), "yes".to_string())],
        };

        let args = runtime().run_args(&spec);
        assert_eq!(&args[..5], &["run", "--detach", "--rm", "--name", "dockside-etcd-1"]);
        assert!(args.contains(&"127.0.0.1::2379/tcp".to_string()));
        assert!(args.contains(&"127.0.0.1::53/udp".to_string()));
        assert!(args.contains(&"ALLOW_NONE_AUTHENTICATION=yes".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("bitnami/etcd:3"));
    }

    #[test]
    fn port_output_parsing() {
        assert_eq!(parse_port_output("127.0.0.1:49153"), Some(49153));
        assert_eq!(parse_port_output("0.0.0.0:32768\n[::]:32768\n"), Some(32768));
        assert_eq!(parse_port_output(""), None);
        assert_eq!(parse_port_output("garbage"), None);
    }

    #[test]
    fn missing_binary_is_reported() {
        match DockerCliRuntime::new("dockside-no-such-runtime", "127.0.0.1") {
            Err(ContainerError::RuntimeNotAvailable(name)) => {
                assert_eq!(name, "dockside-no-such-runtime")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
