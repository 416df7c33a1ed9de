//! Settings file types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smartroute_rules::ProfileType;
use smartroute_rules::parser::{Obfuscation, SubscriptionFormat};
use smartroute_rules::rule::{ProxyServer, RuleKind};

use crate::defaults::default_true;

/// Top-level settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub proxies: Vec<ProxyServer>,
    #[serde(default)]
    pub profiles: Vec<ProfileSettings>,
    /// Id of the active profile. No active profile routes everything directly.
    #[serde(default)]
    pub active_profile: Option<String>,
    /// Profile used for private browsing; the active profile when unset.
    #[serde(default)]
    pub incognito_profile: Option<String>,
    /// Profile of type `ignore_failure_rules` read by the failure monitor.
    #[serde(default)]
    pub ignore_failure_profile: Option<String>,
    /// Proxy id used by profiles without a proxy of their own.
    #[serde(default)]
    pub default_proxy: Option<String>,
    /// Let sub-resources of a proxied page inherit its decision.
    #[serde(default)]
    pub proxy_per_origin: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn profile(&self, id: &str) -> Option<&ProfileSettings> {
        self.profiles.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub profile_type: ProfileType,
    /// Proxy id of the profile's default proxy.
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub whitelist: Vec<RuleEntry>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSettings>,
}

/// A rule as written in settings: a bare host string or a full record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Host(String),
    Record(RuleSettings),
}

impl RuleEntry {
    pub fn proxy(&self) -> Option<&str> {
        match self {
            RuleEntry::Host(_) => None,
            RuleEntry::Record(rule) => rule.proxy.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub kind: RuleKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Proxy id overriding the profile's default proxy.
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Tier a subscription feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    #[default]
    Rules,
    Whitelist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    pub name: String,
    /// Local file holding the subscription; relative to the settings file.
    pub path: PathBuf,
    #[serde(default)]
    pub format: SubscriptionFormat,
    #[serde(default)]
    pub kind: SubscriptionKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Proxy id applied to every rule of the subscription.
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub obfuscation: Obfuscation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"smartroute_rules": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
