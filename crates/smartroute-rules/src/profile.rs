//! Profiles and the decision table shared by both evaluators.
//!
//! The native engine and the emitted decision script both read
//! [`ProfileType::policy`] and [`tier_route`]; neither hard-codes the table.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler::CompiledRuleSet;
use crate::rule::{CompiledRuleSource, ProxyServer};

/// Profile type; selects the matching semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    /// Never proxy.
    Direct,
    /// Defer to the operating system's proxy settings.
    SystemProxy,
    /// Direct by default; rules opt hosts into proxying.
    SmartRules,
    /// Proxied by default; the whitelist opts hosts out, rules pin a proxy.
    AlwaysEnabledBypassRules,
    /// Not a routing profile; its rules silence failure notifications.
    IgnoreFailureRules,
}

/// Route taken when no rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRoute {
    Direct,
    DefaultProxy,
    System,
    NoOpinion,
}

/// Route taken when a rule of a given tier matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierRoute {
    /// Explicit bypass.
    Direct,
    /// The rule's own proxy, else the profile's default proxy.
    RuleProxy,
}

/// Matching semantics of a profile type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfilePolicy {
    pub default_route: DefaultRoute,
    /// Whether rule tiers are consulted for routing at all.
    pub evaluates_rules: bool,
}

impl ProfileType {
    pub fn policy(self) -> ProfilePolicy {
        let (default_route, evaluates_rules) = match self {
            ProfileType::Direct => (DefaultRoute::Direct, false),
            ProfileType::SystemProxy => (DefaultRoute::System, false),
            ProfileType::SmartRules => (DefaultRoute::Direct, true),
            ProfileType::AlwaysEnabledBypassRules => (DefaultRoute::DefaultProxy, true),
            ProfileType::IgnoreFailureRules => (DefaultRoute::NoOpinion, false),
        };
        ProfilePolicy {
            default_route,
            evaluates_rules,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileType::Direct => "direct",
            ProfileType::SystemProxy => "system_proxy",
            ProfileType::SmartRules => "smart_rules",
            ProfileType::AlwaysEnabledBypassRules => "always_enabled_bypass_rules",
            ProfileType::IgnoreFailureRules => "ignore_failure_rules",
        }
    }
}

/// Route for a rule match in `source`.
pub fn tier_route(source: CompiledRuleSource) -> TierRoute {
    if source.is_whitelist() {
        TierRoute::Direct
    } else {
        TierRoute::RuleProxy
    }
}

/// A profile with its compiled rules.
#[derive(Debug, Clone)]
pub struct SmartProfile {
    pub profile_id: String,
    pub name: String,
    pub profile_type: ProfileType,
    pub compiled_rules: CompiledRuleSet,
    /// Id of the profile's own default proxy, as configured.
    pub profile_proxy_server_id: Option<String>,
    /// `profile_proxy_server_id` resolved against the proxy list.
    pub default_proxy: Option<Arc<ProxyServer>>,
}

impl SmartProfile {
    pub fn new(profile_id: impl Into<String>, profile_type: ProfileType) -> Self {
        let profile_id = profile_id.into();
        Self {
            name: profile_id.clone(),
            profile_id,
            profile_type,
            compiled_rules: CompiledRuleSet::empty(),
            profile_proxy_server_id: None,
            default_proxy: None,
        }
    }

    pub fn with_rules(mut self, rules: CompiledRuleSet) -> Self {
        self.compiled_rules = rules;
        self
    }

    pub fn with_default_proxy(mut self, proxy: Arc<ProxyServer>) -> Self {
        self.profile_proxy_server_id = Some(proxy.id.clone());
        self.default_proxy = Some(proxy);
        self
    }

    /// The proxy used when a rule carries no override and for the
    /// proxied default: the profile's own proxy, else `fallback`.
    pub fn effective_default_proxy<'a>(
        &'a self,
        fallback: Option<&'a Arc<ProxyServer>>,
    ) -> Option<&'a Arc<ProxyServer>> {
        self.default_proxy.as_ref().or(fallback)
    }
}
