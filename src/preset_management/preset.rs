use crate::preset_management::options::{PresetOption, StartOption};
use crate::preset_management::types::NamedPorts;

/// Descriptor of a backing service that can run as a disposable container.
///
/// Implementations are configured with [`PresetOption`]s, then handed to the
/// orchestrator, which calls [`Preset::options`] first (running the defaulting
/// pass), then reads [`Preset::image`] and [`Preset::ports`].
pub trait Preset: Send + Sync {
    /// Registry name of the service type, e.g. `"etcd"`.
    fn name(&self) -> &str;

    /// Fully resolved image reference. Only valid after [`Preset::apply_defaults`].
    fn image(&self) -> String;

    /// Fixed set of ports exposed by the service, including
    /// [`crate::preset_management::types::DEFAULT_PORT`].
    fn ports(&self) -> NamedPorts;

    /// Runs the defaulting pass, then returns the orchestrator options: always
    /// a health check, plus an init hook when seeding was requested.
    fn options(&mut self) -> Vec<StartOption>;

    fn configure(&mut self, option: PresetOption);

    /// Fills unset fields with documented defaults. Idempotent.
    fn apply_defaults(&mut self);

    fn apply(&mut self, options: Vec<PresetOption>) {
        for option in options {
            self.configure(option);
        }
    }
}
