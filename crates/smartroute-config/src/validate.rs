//! Settings validation logic.
//!
//! Only structural mistakes are errors. References to missing profiles or
//! proxies are tolerated here and resolved to "none" by the bridge, with a
//! warning.

use std::collections::HashSet;

use smartroute_rules::ProfileType;

use crate::Settings;
use crate::defaults::{LOG_FORMATS, LOG_OUTPUTS};
use crate::loader::ConfigError;

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let mut proxy_ids = HashSet::new();
    for proxy in &settings.proxies {
        if proxy.id.trim().is_empty() {
            return Err(ConfigError::Validation("proxies: id is empty".into()));
        }
        if !proxy_ids.insert(proxy.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "proxies: duplicate id '{}'",
                proxy.id
            )));
        }
    }

    let mut profile_ids = HashSet::new();
    for profile in &settings.profiles {
        if profile.id.trim().is_empty() {
            return Err(ConfigError::Validation("profiles: id is empty".into()));
        }
        if !profile_ids.insert(profile.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "profiles: duplicate id '{}'",
                profile.id
            )));
        }
        let mut names = HashSet::new();
        for sub in &profile.subscriptions {
            if sub.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "profiles.{}: subscription name is empty",
                    profile.id
                )));
            }
            if !names.insert(sub.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "profiles.{}: duplicate subscription '{}'",
                    profile.id, sub.name
                )));
            }
            if sub.path.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "profiles.{}.subscriptions.{}: path is empty",
                    profile.id, sub.name
                )));
            }
        }
    }

    if let Some(profile) = settings
        .ignore_failure_profile
        .as_deref()
        .and_then(|id| settings.profile(id))
    {
        if profile.profile_type != ProfileType::IgnoreFailureRules {
            return Err(ConfigError::Validation(format!(
                "ignore_failure_profile '{}' must have type ignore_failure_rules",
                profile.id
            )));
        }
    }
    for (field, id) in [
        ("active_profile", &settings.active_profile),
        ("incognito_profile", &settings.incognito_profile),
    ] {
        let Some(profile) = id.as_deref().and_then(|id| settings.profile(id)) else {
            continue;
        };
        if profile.profile_type == ProfileType::IgnoreFailureRules {
            return Err(ConfigError::Validation(format!(
                "{field} '{}' is not a routing profile",
                profile.id
            )));
        }
    }

    if let Some(format) = settings.logging.format.as_deref() {
        if !LOG_FORMATS.contains(&format) {
            return Err(ConfigError::Validation(format!(
                "logging.format must be one of: {LOG_FORMATS:?}"
            )));
        }
    }
    if let Some(output) = settings.logging.output.as_deref() {
        if !LOG_OUTPUTS.contains(&output) {
            return Err(ConfigError::Validation(format!(
                "logging.output must be one of: {LOG_OUTPUTS:?}"
            )));
        }
    }
    Ok(())
}
