//! Default value functions for serde deserialization.

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];
pub(crate) const LOG_OUTPUTS: [&str; 2] = ["stdout", "stderr"];
