//! Proxy rule compilation and matching engine.
//!
//! Turns authored host names and URL patterns into compiled rules, decides
//! per request whether to go direct or through a proxy, and renders the same
//! decision as a `FindProxyForURL` script.
//!
//! # Architecture
//!
//! - **Pattern compiler**: one pattern to the narrowest [`CompiledMatcher`]
//! - **Rule-set compiler**: ordered records to the four-tier [`CompiledRuleSet`]
//! - **Matcher**: first match per tier, with a `host:port` fallback pass
//! - **Decision**: the profile table ([`ProfileType::policy`]) applied natively
//! - **Engine**: [`DecisionEngine`] swaps [`RoutingConfig`] snapshots atomically
//! - **Emitter**: [`ScriptEmitter`] renders the same table as a script
//! - **Parsers / providers**: plain and AutoProxy subscriptions from files
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use smartroute_rules::{DecisionEngine, ProfileType, RoutingConfig, RuleSetBuilder, SmartProfile};
//! use smartroute_rules::rule::{ProxyProtocol, ProxyServer, RuleRecord};
//!
//! let proxy = Arc::new(ProxyServer::new("office", "10.0.0.1", 3128, ProxyProtocol::Http));
//!
//! let mut rules = RuleSetBuilder::new();
//! rules.add_rules([RuleRecord::from_source("example.com")]);
//! let profile = SmartProfile::new("work", ProfileType::SmartRules)
//!     .with_rules(rules.build())
//!     .with_default_proxy(proxy);
//!
//! let engine = DecisionEngine::new(RoutingConfig::new(profile));
//! assert_eq!(engine.decide("https://www.example.com/", None).directive(), "PROXY 10.0.0.1:3128");
//! assert_eq!(engine.decide("https://example.org/", None).directive(), "DIRECT");
//! ```

pub mod compiler;
pub mod decision;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod pac;
pub mod parser;
pub mod pattern;
pub mod profile;
pub mod provider;
pub mod rule;
pub mod special;
pub mod sticky;

pub use compiler::{CompiledRuleSet, RuleSetBuilder, RuleSetSummary};
pub use decision::{
    MatchedRule, MatchedRuleStatus, ProxifiedStatus, Route, RoutingDecision, evaluate,
};
pub use engine::{DecisionEngine, FrameKind, RequestContext, RoutingConfig};
pub use error::RulesError;
pub use pac::ScriptEmitter;
pub use pattern::compile_pattern;
pub use profile::{ProfileType, SmartProfile};
pub use rule::{CompiledMatcher, CompiledRule, CompiledRuleSource, CompiledRuleType};
pub use special::SpecialAction;
