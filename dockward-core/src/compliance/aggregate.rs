//! Compliance report aggregation and the level-1 audit gate.

use super::catalogue::CisCatalogue;
use crate::compose::{
    ComplianceCheck, ComposeComplianceChecker, ComposeFile, RuntimeComplianceChecker,
};
use crate::config::RuleConfig;
use crate::dockerfile::{ConfiguredLinter, ParsedDockerfile, create_dockerfile_linter};
use crate::error::ConfigError;
use crate::finding::{Finding, FindingSummary, weighted_score};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inputs to an audit. Either source may be omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditInput<'a> {
    pub dockerfile: Option<&'a ParsedDockerfile>,
    pub compose: Option<&'a ComposeFile>,
}

impl<'a> AuditInput<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dockerfile(mut self, parsed: &'a ParsedDockerfile) -> Self {
        self.dockerfile = Some(parsed);
        self
    }

    pub fn with_compose(mut self, compose: &'a ComposeFile) -> Self {
        self.compose = Some(compose);
        self
    }
}

/// Options for [`ComplianceReportAggregator::audit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    /// Minimum level-1 score to pass. Falls back to the configured threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_threshold: Option<u8>,
}

/// Merged findings from every checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub findings: Vec<Finding>,
    /// Findings grouped by CIS section. Findings without a control are absent.
    pub by_section: BTreeMap<String, Vec<Finding>>,
    pub summary: FindingSummary,
    /// 0-100.
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level1_score: Option<u8>,
}

/// A report scored by its level-1 result, plus the gate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditOutcome {
    #[serde(flatten)]
    pub report: ComplianceReport,
    pub passed: bool,
}

/// Runs the Dockerfile linter and the Compose checkers and merges the results.
pub struct ComplianceReportAggregator {
    linter: ConfiguredLinter,
    checks: Vec<Box<dyn ComplianceCheck>>,
    catalogue: CisCatalogue,
}

impl ComplianceReportAggregator {
    /// Default linter, both Compose checkers and the default catalogue.
    pub fn new() -> Self {
        Self::with_linter(ConfiguredLinter::default())
    }

    /// Use a pre-built Dockerfile linter.
    pub fn with_linter(linter: ConfiguredLinter) -> Self {
        Self {
            linter,
            checks: vec![
                Box::new(ComposeComplianceChecker::new()),
                Box::new(RuntimeComplianceChecker::new()),
            ],
            catalogue: CisCatalogue::default(),
        }
    }

    /// Build the linter from a rule configuration.
    pub fn from_config(config: &RuleConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_linter(create_dockerfile_linter(config)?))
    }

    pub fn linter(&self) -> &ConfiguredLinter {
        &self.linter
    }

    pub fn catalogue(&self) -> &CisCatalogue {
        &self.catalogue
    }

    /// Names of the Compose checkers, in run order.
    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Dockerfile findings first, then each Compose checker in order.
    pub fn aggregate(&self, input: &AuditInput<'_>) -> ComplianceReport {
        let mut findings = Vec::new();

        if let Some(parsed) = input.dockerfile {
            findings.extend(self.linter.lint(parsed).findings);
        }
        if let Some(compose) = input.compose {
            for check in &self.checks {
                findings.extend(check.check(compose).findings);
            }
        }

        let mut by_section: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
        for finding in &findings {
            if let Some(section) = finding.section() {
                by_section
                    .entry(section.to_string())
                    .or_default()
                    .push(finding.clone());
            }
        }

        let level1_score = self.level1_score(&findings);
        tracing::debug!(
            findings = findings.len(),
            sections = by_section.len(),
            level1_score,
            "aggregated compliance report"
        );

        ComplianceReport {
            score: weighted_score(&findings),
            summary: FindingSummary::from_findings(&findings),
            by_section,
            level1_score: Some(level1_score),
            findings,
        }
    }

    /// Aggregate, then score by level-1 controls and apply the pass threshold.
    pub fn audit(&self, input: &AuditInput<'_>, options: &AuditOptions) -> AuditOutcome {
        let mut report = self.aggregate(input);
        let level1 = report.level1_score.unwrap_or(100);
        let threshold = options
            .pass_threshold
            .unwrap_or(self.linter.config().pass_threshold);

        report.score = level1;
        let passed = level1 >= threshold;
        tracing::debug!(score = level1, threshold, passed, "audit complete");

        AuditOutcome { report, passed }
    }

    /// `round((L1 - failures) / L1 x 100)`, where every finding on a level-1
    /// control counts as one failure.
    fn level1_score(&self, findings: &[Finding]) -> u8 {
        let total = self.catalogue.level1_total();
        if total == 0 {
            return 100;
        }
        let failures = findings
            .iter()
            .filter_map(|f| f.cis.as_deref())
            .filter(|cis| self.catalogue.is_level1(cis))
            .count();
        let passing = total.saturating_sub(failures);
        ((passing as f64 / total as f64) * 100.0).round() as u8
    }
}

impl Default for ComplianceReportAggregator {
    fn default() -> Self {
        Self::new()
    }
}
