//! Finding schema shared by the Dockerfile linter and the Compose checkers.
//!
//! A finding is an immutable record of one rule violation. Dockerfile
//! findings point at a source line, Compose findings at a service name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Rule identifier (e.g. "no-root-user", "5.4").
    pub rule: String,
    /// Severity classification.
    pub severity: Severity,
    /// Where the violation was detected.
    #[serde(flatten)]
    pub location: FindingLocation,
    /// CIS Docker Benchmark control, if the rule maps to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cis: Option<String>,
    /// Human-readable description of the violation.
    pub message: String,
    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Finding {
    /// Create a finding anchored at a Dockerfile line (1-based).
    pub fn at_line(
        rule: impl Into<String>,
        severity: Severity,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            severity,
            location: FindingLocation::Line(line),
            cis: None,
            message: message.into(),
            fix: None,
        }
    }

    /// Create a finding anchored at a Compose service.
    pub fn for_service(
        rule: impl Into<String>,
        severity: Severity,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            severity,
            location: FindingLocation::Service(service.into()),
            cis: None,
            message: message.into(),
            fix: None,
        }
    }

    /// Attach a CIS control id.
    pub fn with_cis(mut self, cis: impl Into<String>) -> Self {
        self.cis = Some(cis.into());
        self
    }

    /// Attach a suggested fix.
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Dockerfile line, if this is a Dockerfile finding.
    pub fn line(&self) -> Option<usize> {
        match self.location {
            FindingLocation::Line(line) => Some(line),
            FindingLocation::Service(_) => None,
        }
    }

    /// Compose service name, if this is a Compose finding.
    pub fn service(&self) -> Option<&str> {
        match &self.location {
            FindingLocation::Service(name) => Some(name),
            FindingLocation::Line(_) => None,
        }
    }

    /// CIS section: the part of the control id before the first `.`.
    pub fn section(&self) -> Option<&str> {
        self.cis
            .as_deref()
            .map(|cis| cis.split_once('.').map_or(cis, |(section, _)| section))
    }

    /// Deterministic SHA-256 fingerprint over rule, location and message.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.rule.as_bytes());
        hasher.update(b"|");
        hasher.update(self.location.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.message.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Location of a finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingLocation {
    /// 1-based Dockerfile line.
    Line(usize),
    /// Compose service name.
    Service(String),
}

impl std::fmt::Display for FindingLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingLocation::Line(line) => write!(f, "line {line}"),
            FindingLocation::Service(name) => write!(f, "service '{name}'"),
        }
    }
}

/// Severity levels, totally ordered for weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points deducted from a score of 100 per finding of this severity.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 15,
            Severity::Medium => 10,
            Severity::Low => 5,
            Severity::Info => 0,
        }
    }

    /// Return the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl FindingSummary {
    /// Count findings by severity.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = FindingSummary {
            total: findings.len(),
            ..Default::default()
        };

        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }

        summary
    }
}

/// Severity-weighted score: 100 minus the weight of every finding, clamped to `[0, 100]`.
pub fn weighted_score(findings: &[Finding]) -> u8 {
    let penalty: u32 = findings.iter().map(|f| f.severity.weight()).sum();
    100u32.saturating_sub(penalty) as u8
}
