//! Runtime controls for Compose services: process limits, host networking
//! and restart policy.

use super::model::ServiceSpec;
use super::{ComplianceCheck, floor_score};
use crate::finding::{Finding, Severity};

/// Checks CIS 5.11, 5.13 and 5.14 per service.
#[derive(Debug, Clone, Default)]
pub struct RuntimeComplianceChecker;

impl RuntimeComplianceChecker {
    pub fn new() -> Self {
        Self
    }
}

impl ComplianceCheck for RuntimeComplianceChecker {
    fn name(&self) -> &str {
        "compose-runtime"
    }

    fn check_service(&self, name: &str, service: &ServiceSpec) -> Vec<Finding> {
        let mut findings = Vec::new();

        if !service.has_pids_limit() {
            findings.push(
                Finding::for_service(
                    "5.11",
                    Severity::Low,
                    name,
                    format!("Service '{name}' has no process limit and is exposed to fork bombs"),
                )
                .with_cis("5.11")
                .with_fix("Set 'pids_limit: 100' or deploy.resources.limits.pids"),
            );
        }

        if service.network_mode.as_deref() == Some("host") {
            findings.push(
                Finding::for_service(
                    "5.13",
                    Severity::High,
                    name,
                    format!("Service '{name}' shares the host network namespace"),
                )
                .with_cis("5.13")
                .with_fix("Remove 'network_mode: host' and publish required ports instead"),
            );
        }

        if service.restart.as_deref() == Some("always") {
            findings.push(
                Finding::for_service(
                    "5.14",
                    Severity::Low,
                    name,
                    format!("Service '{name}' restarts unconditionally"),
                )
                .with_cis("5.14")
                .with_fix("Use 'restart: on-failure' with a bounded retry count"),
            );
        }

        findings
    }

    /// `100 - 10 x findings`, regardless of severity.
    fn score(&self, findings: &[Finding]) -> u8 {
        floor_score(10 * findings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::model::ComposeFile;
    use pretty_assertions::assert_eq;

    fn controls(findings: &[Finding]) -> Vec<&str> {
        findings.iter().filter_map(|f| f.cis.as_deref()).collect()
    }

    #[test]
    fn test_bare_service_only_missing_pids() {
        let checker = RuntimeComplianceChecker::new();
        let findings = checker.check_service("web", &ServiceSpec::default());
        assert_eq!(controls(&findings), vec!["5.11"]);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[test]
    fn test_host_network_and_restart_always() {
        let checker = RuntimeComplianceChecker::new();
        let spec = ServiceSpec {
            pids_limit: Some(100),
            network_mode: Some("host".into()),
            restart: Some("always".into()),
            ..Default::default()
        };
        let findings = checker.check_service("web", &spec);
        assert_eq!(controls(&findings), vec!["5.13", "5.14"]);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_other_restart_policies_pass() {
        let checker = RuntimeComplianceChecker::new();
        for policy in ["no", "on-failure", "unless-stopped"] {
            let spec = ServiceSpec {
                pids_limit: Some(50),
                restart: Some(policy.into()),
                network_mode: Some("bridge".into()),
                ..Default::default()
            };
            assert!(checker.check_service("web", &spec).is_empty(), "{policy}");
        }
    }

    #[test]
    fn test_score_per_finding() {
        let checker = RuntimeComplianceChecker::new();
        let compose = ComposeFile::default()
            .with_service(
                "a",
                ServiceSpec {
                    network_mode: Some("host".into()),
                    ..Default::default()
                },
            )
            .with_service("b", ServiceSpec::default());
        let result = checker.check(&compose);
        assert_eq!(result.findings.len(), 3);
        assert_eq!(result.score, 70);
    }

    #[test]
    fn test_score_floor() {
        let checker = RuntimeComplianceChecker::new();
        let findings: Vec<Finding> = (0..12)
            .map(|i| Finding::for_service("5.11", Severity::Low, format!("s{i}"), "m"))
            .collect();
        assert_eq!(checker.score(&findings), 0);
    }
}
