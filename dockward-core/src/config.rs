//! Configuration types for the compliance engine.
//!
//! `RuleConfig` only filters and extends findings after the fixed rule set
//! has run; it never changes parsing. Loading uses `figment` for layered
//! configuration: defaults -> user config -> workspace config -> explicit
//! file -> environment.

use crate::error::ConfigError;
use crate::finding::Severity;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default minimum level-1 score for an audit to pass.
pub const DEFAULT_PASS_THRESHOLD: u8 = 70;

/// Default upper bound on Dockerfile/Compose input size read by callers.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Workspace-local configuration file name.
pub const WORKSPACE_CONFIG_FILE: &str = ".dockward.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockwardConfig {
    /// Rule settings, custom patterns and pass threshold.
    #[serde(flatten)]
    pub rules: RuleConfig,
    /// Inputs larger than this are rejected before analysis.
    pub max_file_bytes: u64,
}

impl Default for DockwardConfig {
    fn default() -> Self {
        Self {
            rules: RuleConfig::default(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Per-rule settings plus caller-defined patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Rule id -> setting. Rules not listed stay enabled.
    pub rules: BTreeMap<String, RuleSetting>,
    /// Extra regex checks over instruction arguments.
    #[serde(alias = "customPatterns")]
    pub custom_patterns: Vec<CustomPattern>,
    /// Minimum level-1 score for `audit` to pass.
    #[serde(alias = "passThreshold")]
    pub pass_threshold: u8,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            rules: BTreeMap::new(),
            custom_patterns: Vec::new(),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

impl RuleConfig {
    /// Disable a rule.
    pub fn with_rule_off(mut self, rule: impl Into<String>) -> Self {
        self.rules.insert(rule.into(), RuleSetting::Off);
        self
    }

    /// Add a custom pattern.
    pub fn with_custom_pattern(mut self, pattern: CustomPattern) -> Self {
        self.custom_patterns.push(pattern);
        self
    }

    /// Whether findings for `rule` should be dropped.
    pub fn is_disabled(&self, rule: &str) -> bool {
        matches!(self.rules.get(rule), Some(RuleSetting::Off))
    }

    /// Check values that serde cannot constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pass_threshold > 100 {
            return Err(ConfigError::InvalidThreshold(self.pass_threshold));
        }
        if self.custom_patterns.iter().any(|p| p.name.trim().is_empty()) {
            return Err(ConfigError::UnnamedPattern);
        }
        Ok(())
    }
}

/// Setting for a single rule.
///
/// Accepts `"off"`, `"warn"`, `"error"`, `false` (off) or `true` (error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RawRuleSetting")]
pub enum RuleSetting {
    Off,
    Warn,
    Error,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRuleSetting {
    Flag(bool),
    Level(String),
}

impl TryFrom<RawRuleSetting> for RuleSetting {
    type Error = String;

    fn try_from(raw: RawRuleSetting) -> Result<Self, String> {
        match raw {
            RawRuleSetting::Flag(false) => Ok(RuleSetting::Off),
            RawRuleSetting::Flag(true) => Ok(RuleSetting::Error),
            RawRuleSetting::Level(level) => match level.to_ascii_lowercase().as_str() {
                "off" => Ok(RuleSetting::Off),
                "warn" => Ok(RuleSetting::Warn),
                "error" => Ok(RuleSetting::Error),
                other => Err(format!(
                    "unknown rule setting '{other}' (expected off, warn or error)"
                )),
            },
        }
    }
}

/// A caller-defined regex check over instruction arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPattern {
    /// Rule id used for matching findings.
    pub name: String,
    /// Regular expression, compiled when the linter is built.
    pub pattern: String,
    /// Finding message.
    pub message: String,
    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    /// Severity, medium when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl CustomPattern {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            message: message.into(),
            fix: None,
            severity: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `DOCKWARD_`, nested keys split on `__`)
/// 2. Explicit config file
/// 3. Workspace-local config (`.dockward.toml`)
/// 4. User config (`~/.config/dockward/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<DockwardConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(DockwardConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "dockward", "dockward") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            tracing::debug!(path = %user_config.display(), "merging user config");
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
        if ws_config.exists() {
            tracing::debug!(path = %ws_config.display(), "merging workspace config");
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Load(format!(
                "config file '{}' does not exist",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("DOCKWARD_").split("__"));

    let config: DockwardConfig = figment.extract()?;
    config.rules.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DockwardConfig::default();
        assert_eq!(config.rules.pass_threshold, 70);
        assert_eq!(config.max_file_bytes, 1024 * 1024);
        assert!(config.rules.rules.is_empty());
        assert!(config.rules.validate().is_ok());
    }

    #[test]
    fn test_rule_setting_accepts_strings_and_bools() {
        let config: RuleConfig = serde_json::from_str(
            r#"{"rules": {"no-latest-tag": "off", "no-root-user": "warn", "recommend-healthcheck": false, "prefer-minimal-base": true}}"#,
        )
        .unwrap();
        assert_eq!(config.rules["no-latest-tag"], RuleSetting::Off);
        assert_eq!(config.rules["no-root-user"], RuleSetting::Warn);
        assert_eq!(config.rules["recommend-healthcheck"], RuleSetting::Off);
        assert_eq!(config.rules["prefer-minimal-base"], RuleSetting::Error);
        assert!(config.is_disabled("recommend-healthcheck"));
        assert!(!config.is_disabled("no-root-user"));
        assert!(!config.is_disabled("unlisted"));
    }

    #[test]
    fn test_rule_setting_rejects_unknown_level() {
        let result: Result<RuleConfig, _> =
            serde_json::from_str(r#"{"rules": {"no-latest-tag": "sometimes"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_camel_case_aliases() {
        let config: RuleConfig = serde_json::from_str(
            r#"{"customPatterns": [{"name": "no-curl-pipe", "pattern": "curl .*\\| *sh", "message": "piped install", "severity": "high"}], "passThreshold": 85}"#,
        )
        .unwrap();
        assert_eq!(config.pass_threshold, 85);
        assert_eq!(config.custom_patterns[0].severity, Some(Severity::High));
    }

    #[test]
    fn test_validate_threshold() {
        let config = RuleConfig {
            pass_threshold: 101,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold(101))
        ));
    }

    #[test]
    fn test_validate_unnamed_pattern() {
        let config = RuleConfig::default().with_custom_pattern(CustomPattern::new(" ", "x", "m"));
        assert!(matches!(config.validate(), Err(ConfigError::UnnamedPattern)));
    }

    #[test]
    fn test_load_workspace_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            "pass_threshold = 90\nmax_file_bytes = 2048\n\n[rules]\nprefer-minimal-base = \"off\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.rules.pass_threshold, 90);
        assert_eq!(config.max_file_bytes, 2048);
        assert!(config.rules.is_disabled("prefer-minimal-base"));
    }

    #[test]
    fn test_load_explicit_config_with_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(
            &path,
            "[[custom_patterns]]\nname = \"no-sudo\"\npattern = \"\\\\bsudo\\\\b\"\nmessage = \"sudo in image\"\nseverity = \"high\"\n",
        )
        .unwrap();

        let config = load_config(None, Some(&path)).unwrap();
        assert_eq!(config.rules.custom_patterns.len(), 1);
        assert_eq!(config.rules.custom_patterns[0].name, "no-sudo");
        assert_eq!(config.rules.custom_patterns[0].pattern, r"\bsudo\b");
    }

    #[test]
    fn test_load_missing_explicit_config() {
        let err = load_config(None, Some(Path::new("/nonexistent/dockward.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
