use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::preset_management::preset::Preset;

/// Produces a fresh, default-valued preset on every call.
pub type PresetFactory = Arc<dyn Fn() -> Box<dyn Preset> + Send + Sync>;

/// Name to factory directory used to select presets by string identifier.
///
/// Owned by the composition root of a test harness. Registration may happen
/// concurrently; a second registration under the same name replaces the first.
#[derive(Default)]
pub struct Registry {
    factories: Mutex<HashMap<String, PresetFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Preset> + Send + Sync + 'static,
    {
        let mut factories = match self.factories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if factories
            .insert(name.to_string(), Arc::new(factory))
            .is_some()
        {
            warn!("Preset {} registered twice, keeping the latest factory", name);
        } else {
            info!("Registered preset: {}", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<PresetFactory> {
        let factories = match self.factories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = factories.get(name).cloned();
        debug!(
            "Preset lookup for {}: {}",
            name,
            if result.is_some() { "found" } else { "not found" }
        );
        result
    }

    /// Looks up `name` and invokes its factory.
    pub fn create(&self, name: &str) -> Option<Box<dyn Preset>> {
        self.lookup(name).map(|factory| factory())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let factories = match self.factories.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }
}
