pub mod configuration;
pub mod container_management;
pub mod error_handling;
pub mod preset_management;
pub mod presets;
