//! Dockerfile lint engine.
//!
//! Walks a parsed Dockerfile once, updating [`LintState`] and evaluating the
//! rule list per instruction, then runs the post-scan rules and scores the
//! result.

use super::parser::{DockerfileParser, ParsedDockerfile};
use super::patterns::PatternCatalogue;
use super::rules::{LintState, Rule, RuleContext, builtin_rules};
use crate::config::RuleConfig;
use crate::error::ConfigError;
use crate::finding::{Finding, FindingSummary, Severity, weighted_score};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Findings plus score for one Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintResult {
    pub findings: Vec<Finding>,
    /// 0-100, severity weighted.
    pub score: u8,
    pub summary: FindingSummary,
}

impl LintResult {
    /// Score and summarize a finding set.
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let score = weighted_score(&findings);
        let summary = FindingSummary::from_findings(&findings);
        Self {
            findings,
            score,
            summary,
        }
    }

    /// Whether any finding is high or critical.
    pub fn has_blocking(&self) -> bool {
        self.summary.critical + self.summary.high > 0
    }
}

/// Dockerfile linter running the fixed rule set.
#[derive(Debug, Clone)]
pub struct DockerfileLinter {
    patterns: PatternCatalogue,
    rules: Vec<Rule>,
}

impl DockerfileLinter {
    pub fn new() -> Self {
        Self {
            patterns: PatternCatalogue::new(),
            rules: builtin_rules(),
        }
    }

    /// The rule list, in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Parse and lint Dockerfile source.
    pub fn lint_source(&self, content: &str) -> LintResult {
        self.lint(&DockerfileParser::parse(content))
    }

    /// Run all rules on a parsed Dockerfile.
    pub fn lint(&self, parsed: &ParsedDockerfile) -> LintResult {
        LintResult::from_findings(self.collect_findings(parsed))
    }

    fn collect_findings(&self, parsed: &ParsedDockerfile) -> Vec<Finding> {
        let mut state = LintState::default();
        let mut findings = Vec::new();

        for instr in &parsed.instructions {
            state.observe(instr, &self.patterns);
            let ctx = RuleContext {
                parsed,
                instruction: Some(instr),
                state: &state,
                patterns: &self.patterns,
            };
            for rule in self.rules.iter().filter(|r| r.applies_to(&instr.keyword)) {
                findings.extend(rule.evaluate(&ctx));
            }
        }

        let ctx = RuleContext {
            parsed,
            instruction: None,
            state: &state,
            patterns: &self.patterns,
        };
        for rule in self.rules.iter().filter(|r| r.is_post_scan()) {
            findings.extend(rule.evaluate(&ctx));
        }

        tracing::debug!(
            instructions = parsed.instructions.len(),
            findings = findings.len(),
            "dockerfile lint complete"
        );
        findings
    }
}

impl Default for DockerfileLinter {
    fn default() -> Self {
        Self::new()
    }
}

/// A custom pattern with its regex compiled.
#[derive(Debug, Clone)]
struct CompiledCustomPattern {
    name: String,
    regex: Regex,
    message: String,
    fix: Option<String>,
    severity: Severity,
}

/// Linter that applies a [`RuleConfig`] on top of the fixed rule set.
#[derive(Debug, Clone)]
pub struct ConfiguredLinter {
    linter: DockerfileLinter,
    config: RuleConfig,
    custom: Vec<CompiledCustomPattern>,
}

/// Build a configured linter. Custom patterns are compiled here, so a bad
/// regex fails before any file is scanned.
pub fn create_dockerfile_linter(config: &RuleConfig) -> Result<ConfiguredLinter, ConfigError> {
    config.validate()?;
    let linter = DockerfileLinter::new();

    let custom = config
        .custom_patterns
        .iter()
        .map(|p| {
            let regex = Regex::new(&p.pattern).map_err(|e| ConfigError::InvalidPattern {
                name: p.name.clone(),
                message: e.to_string(),
            })?;
            tracing::debug!(name = %p.name, "compiled custom pattern");
            Ok(CompiledCustomPattern {
                name: p.name.clone(),
                regex,
                message: p.message.clone(),
                fix: p.fix.clone(),
                severity: p.severity.unwrap_or(Severity::Medium),
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    for id in config.rules.keys() {
        let known = linter.rules().iter().any(|r| r.id == id.as_str())
            || custom.iter().any(|c| &c.name == id);
        if !known {
            tracing::warn!(rule = %id, "rule setting refers to an unknown rule");
        }
    }

    Ok(ConfiguredLinter {
        linter,
        config: config.clone(),
        custom,
    })
}

impl ConfiguredLinter {
    /// The underlying fixed-rule linter.
    pub fn linter(&self) -> &DockerfileLinter {
        &self.linter
    }

    /// The configuration this linter was built from.
    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Parse and lint Dockerfile source.
    pub fn lint_source(&self, content: &str) -> LintResult {
        self.lint(&DockerfileParser::parse(content))
    }

    /// Run the fixed rules, drop disabled ones, append custom pattern hits,
    /// then rescore.
    pub fn lint(&self, parsed: &ParsedDockerfile) -> LintResult {
        let mut findings: Vec<Finding> = self
            .linter
            .collect_findings(parsed)
            .into_iter()
            .filter(|f| !self.config.is_disabled(&f.rule))
            .collect();

        for pattern in &self.custom {
            let hit = parsed
                .instructions
                .iter()
                .find(|i| pattern.regex.is_match(&i.arguments));
            if let Some(instr) = hit {
                let mut finding = Finding::at_line(
                    pattern.name.as_str(),
                    pattern.severity,
                    instr.line,
                    pattern.message.as_str(),
                );
                if let Some(fix) = &pattern.fix {
                    finding = finding.with_fix(fix.as_str());
                }
                findings.push(finding);
            }
        }

        LintResult::from_findings(findings)
    }
}

impl Default for ConfiguredLinter {
    fn default() -> Self {
        Self {
            linter: DockerfileLinter::new(),
            config: RuleConfig::default(),
            custom: Vec::new(),
        }
    }
}
