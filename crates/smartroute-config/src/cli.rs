//! CLI override definitions and application logic.

use clap::Parser;

use crate::Settings;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override the active profile id
    #[arg(long)]
    pub profile: Option<String>,
    /// Override the incognito profile id
    #[arg(long)]
    pub incognito_profile: Option<String>,
    /// Override the global default proxy id
    #[arg(long)]
    pub default_proxy: Option<String>,
    /// Enable per-origin stickiness
    #[arg(long)]
    pub proxy_per_origin: Option<bool>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Override log format (pretty/compact/json)
    #[arg(long)]
    pub log_format: Option<String>,
}

pub fn apply_overrides(settings: &mut Settings, overrides: &CliOverrides) {
    if let Some(v) = &overrides.profile {
        settings.active_profile = Some(v.clone());
    }
    if let Some(v) = &overrides.incognito_profile {
        settings.incognito_profile = Some(v.clone());
    }
    if let Some(v) = &overrides.default_proxy {
        settings.default_proxy = Some(v.clone());
    }
    if let Some(v) = overrides.proxy_per_origin {
        settings.proxy_per_origin = v;
    }
    if let Some(v) = &overrides.log_level {
        settings.logging.level = Some(v.clone());
    }
    if let Some(v) = &overrides.log_format {
        settings.logging.format = Some(v.clone());
    }
}
