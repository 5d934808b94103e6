//! Dockward core: container security compliance engine.
//!
//! - **Dockerfile:** parser, rule catalogue, severity-weighted lint engine
//! - **Compose:** CIS container and runtime controls per service
//! - **Compliance:** CIS control catalogue, report aggregation, level-1 audit gate
//! - **Report:** SARIF 2.1.0 and plain-text output
//!
//! Analysis is synchronous and deterministic; the only fallible step is
//! building a linter from a [`RuleConfig`] with custom patterns.

pub mod compliance;
pub mod compose;
pub mod config;
pub mod dockerfile;
pub mod error;
pub mod finding;
pub mod report;

pub use compliance::{
    AuditInput, AuditOptions, AuditOutcome, CisCatalogue, ComplianceReport,
    ComplianceReportAggregator,
};
pub use compose::{
    CheckResult, ComplianceCheck, ComposeComplianceChecker, ComposeFile, RuntimeComplianceChecker,
    ServiceSpec,
};
pub use config::{CustomPattern, DockwardConfig, RuleConfig, RuleSetting, load_config};
pub use dockerfile::{
    ConfiguredLinter, DockerfileLinter, DockerfileParser, LintResult, ParsedDockerfile,
    create_dockerfile_linter,
};
pub use error::ConfigError;
pub use finding::{Finding, FindingLocation, FindingSummary, Severity};
