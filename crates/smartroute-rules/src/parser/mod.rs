//! Subscription parsers for plain host lists and AutoProxy lists.
//!
//! Import is one-way and covers a narrow subset of each format; lines the
//! engine cannot express are dropped.

pub mod autoproxy;
pub mod plain;

pub use autoproxy::parse_autoproxy;
pub use plain::parse_plain;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::rule::RuleRecord;

/// Line format of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionFormat {
    /// One host or pattern per line.
    #[default]
    Plain,
    /// AutoProxy / GFWList syntax.
    #[serde(alias = "auto_proxy")]
    Autoproxy,
}

/// Encoding wrapped around the subscription body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Obfuscation {
    #[default]
    None,
    Base64,
}

/// Rules parsed from one subscription, split by destination tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSubscription {
    pub rules: Vec<RuleRecord>,
    /// Exceptions (`@@` lines); they land in the subscription whitelist tier.
    pub whitelist: Vec<RuleRecord>,
}

impl ParsedSubscription {
    pub fn len(&self) -> usize {
        self.rules.len() + self.whitelist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode `content` and parse it according to `format`.
pub fn parse_subscription(
    content: &str,
    format: SubscriptionFormat,
    obfuscation: Obfuscation,
) -> Result<ParsedSubscription, RulesError> {
    let decoded;
    let content = match obfuscation {
        Obfuscation::None => content,
        Obfuscation::Base64 => {
            decoded = decode_base64(content)?;
            decoded.as_str()
        }
    };
    Ok(match format {
        SubscriptionFormat::Plain => parse_plain(content),
        SubscriptionFormat::Autoproxy => parse_autoproxy(content),
    })
}

/// Decode a base64 body that may be wrapped over several lines.
pub fn decode_base64(content: &str) -> Result<String, RulesError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    String::from_utf8(bytes)
        .map_err(|e| RulesError::Parse(format!("subscription is not utf-8: {e}")))
}
