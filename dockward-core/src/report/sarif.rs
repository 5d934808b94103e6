//! SARIF 2.1.0 export for GitHub Code Scanning and other SARIF consumers.
//!
//! Dockerfile findings carry a physical location (artifact plus line);
//! Compose findings carry the artifact and a logical location naming the
//! service.

use crate::finding::{Finding, FindingLocation, Severity};
use serde::Serialize;
use std::collections::BTreeSet;

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

/// A complete SARIF log.
#[derive(Debug, Serialize)]
pub struct SarifLog {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub runs: Vec<SarifRun>,
}

impl SarifLog {
    /// A log over the given runs, e.g. one run per scanned file.
    pub fn from_runs(runs: Vec<SarifRun>) -> Self {
        Self {
            schema: SARIF_SCHEMA.to_string(),
            version: "2.1.0".to_string(),
            runs,
        }
    }
}

/// One analysis run.
#[derive(Debug, Serialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SarifRule>,
}

/// Rule descriptor, one per distinct rule id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: String,
    pub short_description: SarifMessage,
    pub default_configuration: SarifRuleConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<SarifMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<SarifRuleProperties>,
}

#[derive(Debug, Serialize)]
pub struct SarifRuleConfiguration {
    pub level: &'static str,
}

/// Property bag on a rule descriptor.
#[derive(Debug, Serialize)]
pub struct SarifRuleProperties {
    pub cis: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SarifMessage {
    pub text: String,
}

/// A single result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub level: &'static str,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<SarifFix>,
    pub fingerprints: SarifFingerprints,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logical_locations: Vec<SarifLogicalLocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifactLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<SarifRegion>,
}

#[derive(Debug, Serialize)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRegion {
    pub start_line: usize,
}

/// Named, non-file location such as a Compose service.
#[derive(Debug, Serialize)]
pub struct SarifLogicalLocation {
    pub name: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SarifFix {
    pub description: SarifMessage,
}

#[derive(Debug, Serialize)]
pub struct SarifFingerprints {
    #[serde(rename = "contentHash/sha256")]
    pub content_hash: String,
}

/// SARIF level for a severity.
pub fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
        Severity::Info => "none",
    }
}

fn rule_descriptor(finding: &Finding) -> SarifRule {
    SarifRule {
        id: finding.rule.clone(),
        short_description: SarifMessage {
            text: finding.message.clone(),
        },
        default_configuration: SarifRuleConfiguration {
            level: sarif_level(finding.severity),
        },
        help: finding.fix.as_ref().map(|fix| SarifMessage { text: fix.clone() }),
        properties: finding.cis.as_ref().map(|cis| SarifRuleProperties {
            cis: cis.clone(),
            tags: vec!["security".into(), format!("CIS-{cis}")],
        }),
    }
}

fn location(finding: &Finding, artifact: &str) -> SarifLocation {
    let artifact_location = SarifArtifactLocation {
        uri: artifact.to_string(),
    };
    match &finding.location {
        FindingLocation::Line(line) => SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location,
                region: Some(SarifRegion { start_line: *line }),
            },
            logical_locations: Vec::new(),
        },
        FindingLocation::Service(name) => SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location,
                region: None,
            },
            logical_locations: vec![SarifLogicalLocation {
                name: name.clone(),
                kind: "module",
            }],
        },
    }
}

/// Convert findings from one artifact into a SARIF log.
pub fn findings_to_sarif(
    findings: &[Finding],
    artifact: &str,
    tool_name: &str,
    tool_version: &str,
) -> SarifLog {
    let mut seen = BTreeSet::new();
    let rules: Vec<SarifRule> = findings
        .iter()
        .filter(|f| seen.insert(f.rule.as_str()))
        .map(rule_descriptor)
        .collect();

    let results = findings
        .iter()
        .map(|f| SarifResult {
            rule_id: f.rule.clone(),
            level: sarif_level(f.severity),
            message: SarifMessage {
                text: f.message.clone(),
            },
            locations: vec![location(f, artifact)],
            fixes: f
                .fix
                .iter()
                .map(|fix| SarifFix {
                    description: SarifMessage { text: fix.clone() },
                })
                .collect(),
            fingerprints: SarifFingerprints {
                content_hash: f.fingerprint(),
            },
        })
        .collect();

    SarifLog::from_runs(vec![SarifRun {
        tool: SarifTool {
            driver: SarifDriver {
                name: tool_name.to_string(),
                version: tool_version.to_string(),
                rules,
            },
        },
        results,
    }])
}
