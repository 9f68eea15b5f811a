//! Preset contract between backing-service descriptors and the orchestrator.
//!
//! A preset is selected by name through a [`Registry`] or constructed
//! directly, configured with [`PresetOption`]s, and handed to the
//! orchestrator. The orchestrator polls the preset's health check until the
//! service answers real requests, then runs its initialization hook once.
//!
//! Example (non-running):
//! ```ignore
//! use dockside::preset_management::{with_values, with_version, Registry};
//!
//! let registry = Registry::new();
//! dockside::presets::register_all(&registry);
//!
//! let mut preset = registry.create("etcd").expect("etcd is built in");
//! preset.apply(vec![with_version("3.5"), with_values(seeds)]);
//! ```

pub mod context;
pub mod options;
pub mod preset;
pub mod registry;
pub mod seeding;
pub mod settings;
pub mod types;

pub use context::{CancelHandle, Context, Interrupted};
pub use options::{
    health_check, init, with_values, with_version, HealthCheckFn, InitFn, PresetOption,
    StartOption,
};
pub use preset::Preset;
pub use registry::{PresetFactory, Registry};
pub use settings::{PresetSettings, DEFAULT_VERSION};
pub use types::{NamedPorts, Port, Protocol, SeedValues, DEFAULT_PORT};
