//! The hot-swappable decision engine.
//!
//! [`RoutingConfig`] is the immutable "active compiled configuration". The
//! engine swaps it wholesale on every settings change; in-flight decisions
//! keep the snapshot they loaded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{debug, trace};

use crate::decision::{MatchedRuleStatus, Route, RoutingDecision, evaluate};
use crate::matcher::{RequestInfo, find_match};
use crate::pac::ScriptEmitter;
use crate::profile::SmartProfile;
use crate::rule::{CompiledRuleSource, ProxyServer};
use crate::special::{SpecialAction, SpecialUrlTable};
use crate::sticky::OriginStickiness;

/// Everything the engine decides with, compiled and read-only.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub active_profile: Option<SmartProfile>,
    pub incognito_profile: Option<SmartProfile>,
    /// Profile of type `IgnoreFailureRules`, read by the failure monitor.
    pub ignore_failure_profile: Option<SmartProfile>,
    /// Global default proxy, used by profiles without their own.
    pub default_proxy: Option<Arc<ProxyServer>>,
    pub proxy_per_origin: bool,
}

impl RoutingConfig {
    pub fn new(active_profile: SmartProfile) -> Self {
        Self {
            active_profile: Some(active_profile),
            ..Self::default()
        }
    }

    pub fn with_incognito_profile(mut self, profile: SmartProfile) -> Self {
        self.incognito_profile = Some(profile);
        self
    }

    pub fn with_ignore_failure_profile(mut self, profile: SmartProfile) -> Self {
        self.ignore_failure_profile = Some(profile);
        self
    }

    pub fn with_default_proxy(mut self, proxy: Arc<ProxyServer>) -> Self {
        self.default_proxy = Some(proxy);
        self
    }

    pub fn with_proxy_per_origin(mut self, enabled: bool) -> Self {
        self.proxy_per_origin = enabled;
        self
    }

    /// The profile deciding a request; the incognito profile when one is
    /// configured and the request is private.
    pub fn profile_for(&self, incognito: bool) -> Option<&SmartProfile> {
        if incognito {
            self.incognito_profile
                .as_ref()
                .or(self.active_profile.as_ref())
        } else {
            self.active_profile.as_ref()
        }
    }
}

/// Frame a request was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    #[default]
    TopLevel,
    SubResource,
}

/// Per-request input beyond the URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    pub url: &'a str,
    /// Host reported by the caller; derived from the URL when absent.
    pub host: Option<&'a str>,
    pub tab_id: Option<i64>,
    pub frame: FrameKind,
    /// URL of the tab's top-level document, when known.
    pub top_level_url: Option<&'a str>,
    pub incognito: bool,
}

impl<'a> RequestContext<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }

    /// A top-level navigation in `tab_id`.
    pub fn top_level(mut self, tab_id: i64) -> Self {
        self.tab_id = Some(tab_id);
        self.frame = FrameKind::TopLevel;
        self.top_level_url = Some(self.url);
        self
    }

    /// A sub-resource of `tab_id`, loaded by `top_level_url`.
    pub fn sub_resource(mut self, tab_id: i64, top_level_url: Option<&'a str>) -> Self {
        self.tab_id = Some(tab_id);
        self.frame = FrameKind::SubResource;
        self.top_level_url = top_level_url;
        self
    }

    pub fn incognito(mut self, incognito: bool) -> Self {
        self.incognito = incognito;
        self
    }

    fn request_info(&self) -> RequestInfo<'a> {
        match self.host {
            Some(host) => RequestInfo::with_host(self.url, host),
            None => RequestInfo::new(self.url),
        }
    }
}

/// Decision engine holding the active configuration.
///
/// Reads go through `ArcSwap`; the special-URL table and per-tab
/// stickiness are the only state mutated while deciding.
pub struct DecisionEngine {
    config: ArcSwap<RoutingConfig>,
    generation: AtomicU64,
    special_urls: SpecialUrlTable,
    stickiness: OriginStickiness,
}

impl DecisionEngine {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            config: ArcSwap::new(Arc::new(config)),
            generation: AtomicU64::new(0),
            special_urls: SpecialUrlTable::new(),
            stickiness: OriginStickiness::new(),
        }
    }

    /// Atomically replace the configuration. Returns the new generation.
    ///
    /// Sticky per-tab decisions refer to the old rules and are dropped.
    pub fn update(&self, config: RoutingConfig) -> u64 {
        self.config.store(Arc::new(config));
        self.stickiness.clear();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "routing config updated");
        generation
    }

    /// Number of updates applied since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<RoutingConfig> {
        self.config.load_full()
    }

    pub fn special_urls(&self) -> &SpecialUrlTable {
        &self.special_urls
    }

    pub fn stickiness(&self) -> &OriginStickiness {
        &self.stickiness
    }

    /// Drop the per-origin decision of a closed tab.
    pub fn tab_closed(&self, tab_id: i64) {
        if self.stickiness.invalidate(tab_id) {
            trace!(tab_id, "closed tab forgotten");
        }
    }

    /// Decide a request with no tab context.
    pub fn decide(&self, url: &str, host: Option<&str>) -> RoutingDecision {
        let mut ctx = RequestContext::new(url);
        ctx.host = host;
        self.decide_with_context(&ctx)
    }

    /// Decide a request. Never fails: a missing profile routes directly.
    pub fn decide_with_context(&self, ctx: &RequestContext<'_>) -> RoutingDecision {
        let config = self.config.load();
        let profile = config.profile_for(ctx.incognito);

        if let Some(action) = self.special_urls.take(ctx.url) {
            let default_proxy = match profile {
                Some(profile) => profile.effective_default_proxy(config.default_proxy.as_ref()),
                None => config.default_proxy.as_ref(),
            };
            let route = match &action {
                SpecialAction::Direct => Route::Direct,
                SpecialAction::DefaultProxy => Route::through(default_proxy),
                SpecialAction::Proxy(proxy) => Route::through(Some(proxy)),
            };
            trace!(url = ctx.url, ?action, "special url override");
            return RoutingDecision::new(route, MatchedRuleStatus::SpecialUrl);
        }

        let Some(profile) = profile else {
            trace!(url = ctx.url, "no active profile");
            return RoutingDecision::direct(MatchedRuleStatus::NoActiveProfile);
        };

        let sticky_tab = ctx.tab_id.filter(|_| config.proxy_per_origin);
        if let Some(tab_id) = sticky_tab {
            match (ctx.frame, ctx.top_level_url) {
                (FrameKind::TopLevel, _) | (FrameKind::SubResource, None) => {
                    self.stickiness.invalidate(tab_id);
                }
                (FrameKind::SubResource, Some(_)) => {
                    if let Some(mut decision) = self.stickiness.get(tab_id) {
                        trace!(url = ctx.url, tab_id, "per-origin decision reused");
                        decision.status = MatchedRuleStatus::PerOrigin;
                        return decision;
                    }
                }
            }
        }

        let req = ctx.request_info();
        let decision = evaluate(profile, config.default_proxy.as_ref(), &req);
        trace!(
            url = ctx.url,
            profile = %profile.profile_id,
            status = ?decision.status,
            directive = %decision.directive(),
            "request decided"
        );

        if let Some(tab_id) = sticky_tab {
            if ctx.frame == FrameKind::TopLevel
                && decision.status == MatchedRuleStatus::RuleMatched
                && decision.route.proxy().is_some()
            {
                self.stickiness.mark(tab_id, decision.clone());
            }
        }
        decision
    }

    /// Whether failures of this request should not be reported.
    ///
    /// Consults the Rules tier of the configured ignore-failure profile.
    pub fn is_failure_ignored(&self, url: &str, host: Option<&str>) -> bool {
        let config = self.config.load();
        let Some(profile) = &config.ignore_failure_profile else {
            return false;
        };
        let req = match host {
            Some(host) => RequestInfo::with_host(url, host),
            None => RequestInfo::new(url),
        };
        find_match(&req, profile.compiled_rules.tier(CompiledRuleSource::Rules)).is_some()
    }

    /// Emit the decision script for the active (or incognito) profile.
    ///
    /// Returns `None` when no profile is active.
    pub fn emit_script(&self, incognito: bool) -> Option<String> {
        let config = self.config.load();
        let profile = config.profile_for(incognito)?;
        let special_urls = self.special_urls.snapshot();
        Some(
            ScriptEmitter::new(profile, config.default_proxy.as_ref())
                .with_special_urls(&special_urls)
                .emit(),
        )
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("generation", &self.generation())
            .field("config", &*self.config.load())
            .field("special_urls", &self.special_urls.len())
            .finish()
    }
}
