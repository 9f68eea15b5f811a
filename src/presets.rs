//! Built-in backing-service presets.

pub mod etcd;
pub mod redis;

use crate::preset_management::registry::Registry;

/// Registers every built-in preset under its service name.
pub fn register_all(registry: &Registry) {
    registry.register(etcd::NAME, || Box::new(etcd::EtcdPreset::default()));
    registry.register(redis::NAME, || Box::new(redis::RedisPreset::default()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_presets_are_registered_by_name() {
        let registry = Registry::new();
        register_all(&registry);

        assert_eq!(registry.names(), vec!["etcd", "redis"]);
        for name in registry.names() {
            let preset = registry.create(&name).unwrap();
            assert_eq!(preset.name(), name);
        }
    }
}
