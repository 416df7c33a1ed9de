//! File-based subscription provider.

use std::path::Path;

use tracing::debug;

use crate::error::RulesError;
use crate::parser::{self, Obfuscation, ParsedSubscription, SubscriptionFormat};

/// Provider that loads subscriptions from local files.
pub struct FileProvider;

impl FileProvider {
    /// Load and parse a subscription from a local file.
    pub fn load(
        path: &Path,
        format: SubscriptionFormat,
        obfuscation: Obfuscation,
    ) -> Result<ParsedSubscription, RulesError> {
        let content = std::fs::read_to_string(path)?;
        let parsed = Self::parse(&content, format, obfuscation)?;
        debug!(
            path = %path.display(),
            rules = parsed.rules.len(),
            whitelist = parsed.whitelist.len(),
            "subscription loaded"
        );
        Ok(parsed)
    }

    /// Parse subscription content from a string.
    pub fn parse(
        content: &str,
        format: SubscriptionFormat,
        obfuscation: Obfuscation,
    ) -> Result<ParsedSubscription, RulesError> {
        parser::parse_subscription(content, format, obfuscation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_plain_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# list\nexample.com\n.test.org").unwrap();

        let parsed =
            FileProvider::load(file.path(), SubscriptionFormat::Plain, Obfuscation::None).unwrap();
        assert_eq!(parsed.rules.len(), 2);
    }

    #[test]
    fn load_autoproxy_exceptions() {
        let content = "[AutoProxy]\n||example.com\n@@||cn.example.com\n";
        let parsed =
            FileProvider::parse(content, SubscriptionFormat::Autoproxy, Obfuscation::None).unwrap();
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.whitelist.len(), 1);
    }

    #[test]
    fn missing_file() {
        let result = FileProvider::load(
            Path::new("/nonexistent/list.txt"),
            SubscriptionFormat::Plain,
            Obfuscation::None,
        );
        assert!(matches!(result, Err(RulesError::Io(_))));
    }
}
