//! Plugin contracts, the static registry and the configuration loader.
//!
//! Every implementation registers itself with `register_plugin!`. At startup
//! `PluginLoader` walks the configuration sections of each group, resolves
//! the `filename` key against the registry, validates declared fields and
//! builds the sensor, output and notification sets the engine runs on.

pub mod error;
pub mod loader;
pub mod notifications;
pub mod outputs;
pub mod registry;
pub mod sensors;
pub mod traits;
pub mod types;
