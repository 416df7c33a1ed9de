//! # smartroute
//!
//! Per-origin proxy routing: compiles user and subscription rules, decides
//! each request natively and emits an equivalent `FindProxyForURL` script.
//!
//! ## Crates
//!
//! - [`smartroute_rules`] - Pattern compiler, matcher, decision engine and script emitter
//! - [`smartroute_config`] - Settings loading, validation and the bridge to the engine

pub mod cli;

pub use smartroute_config as config;
pub use smartroute_rules as rules;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use smartroute_config::{
        Settings, build_routing_config, load_settings, validate_settings,
    };
    pub use smartroute_rules::{
        DecisionEngine, ProfileType, RequestContext, Route, RoutingConfig, RoutingDecision,
        RuleSetBuilder, ScriptEmitter, SmartProfile,
    };
}
