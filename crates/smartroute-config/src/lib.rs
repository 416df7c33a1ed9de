//! Settings model, loading, validation and the bridge to the rule engine.

mod bridge;
mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use bridge::{ProxyIndex, build_profile, build_routing_config};
pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_settings};
pub use types::*;
pub use validate::validate_settings;
