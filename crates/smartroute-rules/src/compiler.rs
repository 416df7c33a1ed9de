//! Rule-set compiler: ordered rule records to tiered compiled rules.

use serde::Serialize;
use tracing::{debug, warn};

use crate::pattern::compile_pattern;
use crate::rule::{CompiledRule, CompiledRuleSource, RuleRecord};

/// Compile a single record. Returns `None` for disabled records and for
/// patterns that do not compile.
pub fn compile_rule(
    record: &RuleRecord,
    source: CompiledRuleSource,
    index: usize,
) -> Option<CompiledRule> {
    if !record.enabled {
        return None;
    }
    let text = record.text();
    match compile_pattern(text, record.kind) {
        Ok(matcher) => Some(CompiledRule {
            rule_id: record
                .id
                .clone()
                .unwrap_or_else(|| format!("{source}-{index}")),
            matcher,
            proxy: record.proxy.clone(),
            source,
            pattern: text.to_string(),
        }),
        Err(e) => {
            warn!(tier = %source, pattern = %text, error = %e, "dropping rule");
            None
        }
    }
}

/// Compile an ordered list of records for one tier.
///
/// Input order is preserved: the first structural match wins at match time.
pub fn compile_rules(records: &[RuleRecord], source: CompiledRuleSource) -> Vec<CompiledRule> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| compile_rule(record, source, index))
        .collect()
}

/// Rule counts per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleSetSummary {
    pub whitelist: usize,
    pub rules: usize,
    pub whitelist_subscription: usize,
    pub subscription_rules: usize,
}

impl RuleSetSummary {
    pub fn total(&self) -> usize {
        self.whitelist + self.rules + self.whitelist_subscription + self.subscription_rules
    }
}

/// The four rule tiers of a profile, in fixed precedence order.
///
/// Read-only once built; edits produce a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledRuleSet {
    whitelist: Vec<CompiledRule>,
    rules: Vec<CompiledRule>,
    whitelist_subscription: Vec<CompiledRule>,
    subscription_rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    /// An empty rule set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules of one tier.
    pub fn tier(&self, source: CompiledRuleSource) -> &[CompiledRule] {
        match source {
            CompiledRuleSource::Whitelist => &self.whitelist,
            CompiledRuleSource::Rules => &self.rules,
            CompiledRuleSource::WhitelistSubscription => &self.whitelist_subscription,
            CompiledRuleSource::SubscriptionRules => &self.subscription_rules,
        }
    }

    /// Tiers in lookup order.
    pub fn tiers(&self) -> impl Iterator<Item = (CompiledRuleSource, &[CompiledRule])> {
        CompiledRuleSource::ORDER
            .into_iter()
            .map(move |source| (source, self.tier(source)))
    }

    pub fn summary(&self) -> RuleSetSummary {
        RuleSetSummary {
            whitelist: self.whitelist.len(),
            rules: self.rules.len(),
            whitelist_subscription: self.whitelist_subscription.len(),
            subscription_rules: self.subscription_rules.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.summary().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder collecting rule records per tier.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    whitelist: Vec<RuleRecord>,
    rules: Vec<RuleRecord>,
    whitelist_subscription: Vec<RuleRecord>,
    subscription_rules: Vec<RuleRecord>,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records to a tier, after any already added.
    pub fn add(
        &mut self,
        source: CompiledRuleSource,
        records: impl IntoIterator<Item = RuleRecord>,
    ) -> &mut Self {
        let tier = match source {
            CompiledRuleSource::Whitelist => &mut self.whitelist,
            CompiledRuleSource::Rules => &mut self.rules,
            CompiledRuleSource::WhitelistSubscription => &mut self.whitelist_subscription,
            CompiledRuleSource::SubscriptionRules => &mut self.subscription_rules,
        };
        tier.extend(records);
        self
    }

    pub fn add_whitelist(&mut self, records: impl IntoIterator<Item = RuleRecord>) -> &mut Self {
        self.add(CompiledRuleSource::Whitelist, records)
    }

    pub fn add_rules(&mut self, records: impl IntoIterator<Item = RuleRecord>) -> &mut Self {
        self.add(CompiledRuleSource::Rules, records)
    }

    pub fn add_whitelist_subscription(
        &mut self,
        records: impl IntoIterator<Item = RuleRecord>,
    ) -> &mut Self {
        self.add(CompiledRuleSource::WhitelistSubscription, records)
    }

    pub fn add_subscription_rules(
        &mut self,
        records: impl IntoIterator<Item = RuleRecord>,
    ) -> &mut Self {
        self.add(CompiledRuleSource::SubscriptionRules, records)
    }

    /// Compile every tier.
    pub fn build(&self) -> CompiledRuleSet {
        let set = CompiledRuleSet {
            whitelist: compile_rules(&self.whitelist, CompiledRuleSource::Whitelist),
            rules: compile_rules(&self.rules, CompiledRuleSource::Rules),
            whitelist_subscription: compile_rules(
                &self.whitelist_subscription,
                CompiledRuleSource::WhitelistSubscription,
            ),
            subscription_rules: compile_rules(
                &self.subscription_rules,
                CompiledRuleSource::SubscriptionRules,
            ),
        };

        let records = self.whitelist.len()
            + self.rules.len()
            + self.whitelist_subscription.len()
            + self.subscription_rules.len();
        let summary = set.summary();
        debug!(
            records,
            compiled = summary.total(),
            whitelist = summary.whitelist,
            rules = summary.rules,
            whitelist_subscription = summary.whitelist_subscription,
            subscription_rules = summary.subscription_rules,
            "compiled rule set"
        );
        set
    }
}
