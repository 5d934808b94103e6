//! Compose compliance checks: CIS container controls evaluated per service.

pub mod cis;
pub mod model;
pub mod runtime;

pub use cis::ComposeComplianceChecker;
pub use model::{ComposeFile, ServiceSpec};
pub use runtime::RuntimeComplianceChecker;

use crate::finding::{Finding, FindingSummary};
use serde::{Deserialize, Serialize};

/// Findings and score from one checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub findings: Vec<Finding>,
    /// 0-100, checker-specific formula.
    pub score: u8,
    pub summary: FindingSummary,
}

/// A set of controls evaluated against each Compose service.
pub trait ComplianceCheck: Send + Sync {
    /// Unique name for this checker.
    fn name(&self) -> &str;

    /// Evaluate every control for one service.
    fn check_service(&self, name: &str, service: &ServiceSpec) -> Vec<Finding>;

    /// Score a finding set produced by this checker.
    fn score(&self, findings: &[Finding]) -> u8;

    /// Evaluate all services in name order.
    fn check(&self, compose: &ComposeFile) -> CheckResult {
        let findings: Vec<Finding> = compose
            .services
            .iter()
            .flat_map(|(name, service)| self.check_service(name, service))
            .collect();

        tracing::debug!(
            checker = self.name(),
            services = compose.services.len(),
            findings = findings.len(),
            "compose check complete"
        );

        CheckResult {
            score: self.score(&findings),
            summary: FindingSummary::from_findings(&findings),
            findings,
        }
    }
}

/// `100 - penalty`, floored at 0.
pub(crate) fn floor_score(penalty: usize) -> u8 {
    100usize.saturating_sub(penalty) as u8
}
