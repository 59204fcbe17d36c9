use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::Severity;

/// Maximum config file size (1 MB) - prevents memory exhaustion from malformed files
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// File name looked up by [`Config::load_or_default`].
pub const CONFIG_FILE_NAME: &str = "perfcop.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ruby version the analyzed code targets. Rules requiring a newer
    /// version are skipped.
    #[serde(default)]
    pub target_ruby_version: RubyVersion,

    #[serde(default)]
    pub rules: HashMap<String, RuleSeverity>,

    #[serde(default)]
    pub correction: CorrectionConfig,

    #[serde(default)]
    pub settings: RuleSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Deny,
    Warn,
    Allow,
}

impl From<RuleSeverity> for Option<Severity> {
    fn from(rs: RuleSeverity) -> Option<Severity> {
        match rs {
            RuleSeverity::Deny => Some(Severity::Error),
            RuleSeverity::Warn => Some(Severity::Warning),
            RuleSeverity::Allow => None,
        }
    }
}

/// A `major.minor` Ruby version such as `3.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RubyVersion {
    pub major: u8,
    pub minor: u8,
}

impl RubyVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Default for RubyVersion {
    fn default() -> Self {
        Self::new(2, 7)
    }
}

impl fmt::Display for RubyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for RubyVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid Ruby version '{}', expected MAJOR.MINOR", s);
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for RubyVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RubyVersion> for String {
    fn from(version: RubyVersion) -> String {
        version.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Upper bound on correction passes over one file.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_max_iterations() -> usize {
    200
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Per-rule tuning knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSettings {
    #[serde(default)]
    pub collection_literal_in_loop: CollectionLiteralSettings,

    #[serde(default)]
    pub collection_literal_in_method: CollectionLiteralSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionLiteralSettings {
    /// Literals with fewer elements are not reported.
    #[serde(default = "default_min_size")]
    pub min_size: usize,
}

fn default_min_size() -> usize {
    1
}

impl Default for CollectionLiteralSettings {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
        }
    }
}

impl Config {
    /// Load config from perfcop.toml in the given path, or return default
    ///
    /// # Arguments
    ///
    /// * `path` - Project directory containing perfcop.toml, or a file in it
    ///
    /// # Errors
    ///
    /// Returns an error if the path doesn't exist, if the config file
    /// exists but cannot be parsed, or if it fails [`Config::validate`].
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }

        let dir_path = if path.is_file() {
            path.parent().unwrap_or(path)
        } else {
            path
        };

        let config_path = dir_path.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let metadata = std::fs::metadata(&config_path)?;
        if metadata.len() > MAX_CONFIG_SIZE {
            anyhow::bail!(
                "Config file too large ({} bytes, max {} bytes): {}",
                metadata.len(),
                MAX_CONFIG_SIZE,
                config_path.display()
            );
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %config_path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Unknown rule ids are logged and ignored; invalid limits are errors.
    pub fn validate(&self) -> anyhow::Result<()> {
        use crate::rules::registry;

        for rule_id in self.rules.keys() {
            if !registry::has_rule(rule_id) {
                tracing::warn!(rule = %rule_id, "unknown rule in {} (will be ignored)", CONFIG_FILE_NAME);
            }
        }

        if self.correction.max_iterations == 0 {
            anyhow::bail!("correction.max_iterations must be at least 1");
        }
        Ok(())
    }

    /// Get the effective severity for a rule
    pub fn rule_severity(&self, rule_id: &str, default: Severity) -> Option<Severity> {
        match self.rules.get(rule_id) {
            Some(&severity) => severity.into(),
            None => Some(default),
        }
    }

    pub fn is_enabled(&self, rule_id: &str) -> bool {
        self.rules.get(rule_id) != Some(&RuleSeverity::Allow)
    }

    /// Generate default TOML config
    pub fn default_toml() -> &'static str {
        r#"# perfcop configuration

# Ruby version of the analyzed code ("MAJOR.MINOR").
target_ruby_version = "2.7"

[rules]
# Set rule severity: "deny" (error), "warn" (warning), "allow" (disabled)
# "Performance/Size" = "deny"
# "Performance/ReduceMerge" = "warn"
# "Performance/CollectionLiteralInMethod" = "allow"

[correction]
max_iterations = 200

[settings.collection_literal_in_loop]
min_size = 1

[settings.collection_literal_in_method]
min_size = 1
"#
    }
}
