use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::preset_management::options::PresetOption;
use clap::Parser;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Command-line arguments of the `dockside` binary.
///
/// Every flag overrides the matching value of the configuration file given
/// with `--config`.
#[derive(Parser, Debug, Clone)]
#[command(name = "dockside")]
#[command(version)]
#[command(about = "Start a disposable backing service container from a preset")]
pub struct Args {
    /// Name of the preset to start, e.g. `etcd`
    pub preset: Option<String>,

    /// TOML file with `[orchestrator]` and `[preset]` sections
    #[arg(long, env = "DOCKSIDE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image tag to pin, defaults to `latest`
    #[arg(long)]
    pub tag: Option<String>,

    /// Docker-compatible CLI to run containers with
    #[arg(long, env = "DOCKSIDE_RUNTIME")]
    pub runtime: Option<String>,

    /// List registered presets and exit
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub list: bool,
}

/// Complete runtime configuration.
///
/// ```toml
/// [orchestrator]
/// runtime_binary = "podman"
/// health_timeout_secs = 30
///
/// [preset]
/// name = "etcd"
/// version = "3.5"
///
/// [preset.values]
/// greeting = "hello"
/// ```
#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub preset: PresetSection,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the file named by `args` (if any) and applies the CLI overrides.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(name) = &args.preset {
            config.preset.name = Some(name.clone());
        }
        if let Some(tag) = &args.tag {
            config.preset.settings.version = tag.clone();
        }
        if let Some(runtime) = &args.runtime {
            config.orchestrator.runtime_binary = runtime.clone();
        }

        info!(
            "Configuration loaded (runtime: {}, preset: {})",
            config.orchestrator.runtime_binary,
            config.preset.name.as_deref().unwrap_or("<none>")
        );
        Ok(config)
    }

    pub fn preset_name(&self) -> Result<&str, ConfigError> {
        self.preset
            .name
            .as_deref()
            .ok_or(ConfigError::NoPresetSelected)
    }

    pub fn preset_options(&self) -> Vec<PresetOption> {
        self.preset.settings.to_options()
    }
}
