//! Bridge between settings and the rule engine.
//!
//! Converts [`Settings`] into a compiled [`RoutingConfig`]. Nothing here
//! fails: dangling references and unreadable subscriptions are logged and
//! treated as absent, so a bad edit degrades routing instead of stopping it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use smartroute_rules::provider::FileProvider;
use smartroute_rules::rule::{ProxyServer, RuleRecord};
use smartroute_rules::{RoutingConfig, RuleSetBuilder, SmartProfile};
use tracing::{debug, warn};

use crate::{ProfileSettings, RuleEntry, Settings, SubscriptionKind, SubscriptionSettings};

/// Proxy servers by id, shared by every rule referencing them.
#[derive(Debug, Default)]
pub struct ProxyIndex {
    proxies: HashMap<String, Arc<ProxyServer>>,
}

impl ProxyIndex {
    pub fn new(proxies: &[ProxyServer]) -> Self {
        let proxies = proxies
            .iter()
            .map(|proxy| {
                let mut proxy = proxy.clone();
                if proxy.port == Some(0) {
                    proxy.port = None;
                }
                if !proxy.is_usable() {
                    warn!(proxy = %proxy.id, "proxy is missing host, port or protocol; routes through it go direct");
                }
                (proxy.id.clone(), Arc::new(proxy))
            })
            .collect();
        Self { proxies }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ProxyServer>> {
        self.proxies.get(id)
    }

    /// Resolve an optional reference, warning when it dangles.
    pub fn resolve(&self, id: Option<&str>, referrer: &str) -> Option<Arc<ProxyServer>> {
        let id = id?;
        let proxy = self.get(id).cloned();
        if proxy.is_none() {
            warn!(proxy = id, referrer, "unknown proxy id, ignoring");
        }
        proxy
    }
}

fn rule_record(entry: &RuleEntry, proxies: &ProxyIndex, referrer: &str) -> RuleRecord {
    match entry {
        RuleEntry::Host(host) => RuleRecord::from_source(host.as_str()),
        RuleEntry::Record(rule) => RuleRecord {
            id: rule.id.clone(),
            source: rule.source.clone(),
            pattern: rule.pattern.clone(),
            kind: rule.kind,
            enabled: rule.enabled,
            proxy: proxies.resolve(rule.proxy.as_deref(), referrer),
        },
    }
}

fn subscription_path(sub: &SubscriptionSettings, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(base) if sub.path.is_relative() => base.join(&sub.path),
        _ => sub.path.clone(),
    }
}

fn add_subscription(
    builder: &mut RuleSetBuilder,
    profile_id: &str,
    sub: &SubscriptionSettings,
    proxies: &ProxyIndex,
    base_dir: Option<&Path>,
) {
    let path = subscription_path(sub, base_dir);
    let parsed = match FileProvider::load(&path, sub.format, sub.obfuscation) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(
                profile = profile_id,
                subscription = %sub.name,
                path = %path.display(),
                error = %e,
                "failed to load subscription, skipping"
            );
            return;
        }
    };

    let referrer = format!("{profile_id}.subscriptions.{}", sub.name);
    let proxy = proxies.resolve(sub.proxy.as_deref(), &referrer);
    let stamp = |records: Vec<RuleRecord>, tag: &str| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.id = Some(format!("{}-{tag}{i}", sub.name));
                record.proxy = proxy.clone();
                record
            })
            .collect::<Vec<_>>()
    };

    match sub.kind {
        SubscriptionKind::Rules => {
            builder
                .add_subscription_rules(stamp(parsed.rules, ""))
                .add_whitelist_subscription(stamp(parsed.whitelist, "exception-"));
        }
        SubscriptionKind::Whitelist => {
            if !parsed.whitelist.is_empty() {
                debug!(
                    subscription = %sub.name,
                    count = parsed.whitelist.len(),
                    "exceptions in a whitelist subscription are ignored"
                );
            }
            builder.add_whitelist_subscription(stamp(parsed.rules, ""));
        }
    }
}

/// Compile one profile, loading its subscriptions from disk.
///
/// Relative subscription paths are resolved against `base_dir`.
pub fn build_profile(
    profile: &ProfileSettings,
    proxies: &ProxyIndex,
    base_dir: Option<&Path>,
) -> SmartProfile {
    let mut builder = RuleSetBuilder::new();
    let whitelist_referrer = format!("{}.whitelist", profile.id);
    let rules_referrer = format!("{}.rules", profile.id);
    builder
        .add_whitelist(
            profile
                .whitelist
                .iter()
                .map(|entry| rule_record(entry, proxies, &whitelist_referrer)),
        )
        .add_rules(
            profile
                .rules
                .iter()
                .map(|entry| rule_record(entry, proxies, &rules_referrer)),
        );

    for sub in profile.subscriptions.iter().filter(|sub| sub.enabled) {
        add_subscription(&mut builder, &profile.id, sub, proxies, base_dir);
    }

    let mut smart = SmartProfile::new(profile.id.as_str(), profile.profile_type)
        .with_rules(builder.build());
    if !profile.name.is_empty() {
        smart.name = profile.name.clone();
    }
    smart.profile_proxy_server_id = profile.proxy.clone();
    smart.default_proxy = proxies.resolve(profile.proxy.as_deref(), &profile.id);

    let summary = smart.compiled_rules.summary();
    debug!(
        profile = %smart.profile_id,
        profile_type = smart.profile_type.as_str(),
        whitelist = summary.whitelist,
        rules = summary.rules,
        whitelist_subscription = summary.whitelist_subscription,
        subscription_rules = summary.subscription_rules,
        "profile compiled"
    );
    smart
}

/// Build the engine configuration from settings.
///
/// Only the profiles the engine uses (active, incognito, ignore-failure)
/// are compiled.
pub fn build_routing_config(settings: &Settings, base_dir: Option<&Path>) -> RoutingConfig {
    let proxies = ProxyIndex::new(&settings.proxies);
    let lookup = |field: &str, id: Option<&str>| -> Option<SmartProfile> {
        let id = id?;
        match settings.profile(id) {
            Some(profile) => Some(build_profile(profile, &proxies, base_dir)),
            None => {
                warn!(field, profile = id, "unknown profile id, ignoring");
                None
            }
        }
    };

    let active_profile = lookup("active_profile", settings.active_profile.as_deref());
    if active_profile.is_none() {
        warn!("no active profile; every request goes direct");
    }

    RoutingConfig {
        active_profile,
        incognito_profile: lookup("incognito_profile", settings.incognito_profile.as_deref()),
        ignore_failure_profile: lookup(
            "ignore_failure_profile",
            settings.ignore_failure_profile.as_deref(),
        ),
        default_proxy: proxies.resolve(settings.default_proxy.as_deref(), "default_proxy"),
        proxy_per_origin: settings.proxy_per_origin,
    }
}
