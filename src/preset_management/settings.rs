use serde::{Deserialize, Serialize};

use crate::preset_management::options::PresetOption;
use crate::preset_management::types::SeedValues;

/// Tag used when no version was pinned.
pub const DEFAULT_VERSION: &str = "latest";

/// User-tunable state shared by every preset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresetSettings {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub values: Option<SeedValues>,
}

impl PresetSettings {
    /// Later options override earlier ones on the same field.
    pub fn apply(&mut self, option: PresetOption) {
        match option {
            PresetOption::Version(tag) => self.version = tag,
            PresetOption::Values(values) => self.values = Some(values),
        }
    }

    /// Fills unset fields. Never overwrites an explicit value.
    pub fn apply_defaults(&mut self, default_version: &str) {
        if self.version.is_empty() {
            self.version = default_version.to_string();
        }
    }

    /// Seeds to load, or `None` when seeding was not requested.
    pub fn seeds(&self) -> Option<&SeedValues> {
        self.values.as_ref().filter(|values| !values.is_empty())
    }

    /// `<repository>:<version>`; the version must already be defaulted.
    pub fn image(&self, repository: &str) -> String {
        format!("{}:{}", repository, self.version)
    }

    /// Options equivalent to these settings, for replay onto another preset.
    pub fn to_options(&self) -> Vec<PresetOption> {
        let mut options = Vec::new();
        if !self.version.is_empty() {
            options.push(PresetOption::Version(self.version.clone()));
        }
        if let Some(values) = &self.values {
            options.push(PresetOption::Values(values.clone()));
        }
        options
    }
}
