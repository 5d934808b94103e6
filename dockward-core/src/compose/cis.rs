//! CIS container controls for Compose services: privilege, capabilities,
//! resource limits, filesystem and privilege escalation.

use super::model::ServiceSpec;
use super::{ComplianceCheck, floor_score};
use crate::finding::{Finding, Severity};

/// Service names that usually need a writable filesystem.
const DATABASE_NAMES: &[&str] = &["db", "postgres", "mysql", "mongo", "redis"];

/// Checks CIS 5.3, 5.4, 5.10, 5.12 and 5.25 per service.
#[derive(Debug, Clone, Default)]
pub struct ComposeComplianceChecker;

impl ComposeComplianceChecker {
    pub fn new() -> Self {
        Self
    }

    fn is_database(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        DATABASE_NAMES.iter().any(|db| lower.contains(db))
    }
}

fn control(cis: &str, severity: Severity, service: &str, message: String, fix: &str) -> Finding {
    Finding::for_service(cis, severity, service, message)
        .with_cis(cis)
        .with_fix(fix)
}

impl ComplianceCheck for ComposeComplianceChecker {
    fn name(&self) -> &str {
        "compose-cis"
    }

    fn check_service(&self, name: &str, service: &ServiceSpec) -> Vec<Finding> {
        let mut findings = Vec::new();

        if service.privileged == Some(true) {
            findings.push(control(
                "5.4",
                Severity::Critical,
                name,
                format!("Service '{name}' runs in privileged mode with full host access"),
                "Remove 'privileged: true' and grant only the capabilities required via cap_add",
            ));
        }

        if !service.drops_all_capabilities() {
            findings.push(control(
                "5.3",
                Severity::High,
                name,
                format!("Service '{name}' does not drop all Linux capabilities"),
                "Add 'cap_drop: [ALL]' and re-add only required capabilities with cap_add",
            ));
        }

        if !service.has_memory_limit() {
            findings.push(control(
                "5.10",
                Severity::Medium,
                name,
                format!("Service '{name}' has no memory limit"),
                "Set deploy.resources.limits.memory (or mem_limit), e.g. '512M'",
            ));
        }

        if service.read_only != Some(true) && !Self::is_database(name) {
            findings.push(control(
                "5.12",
                Severity::Medium,
                name,
                format!("Service '{name}' has a writable root filesystem"),
                "Set 'read_only: true' and mount tmpfs or volumes for writable paths",
            ));
        }

        if !service.has_no_new_privileges() {
            findings.push(control(
                "5.25",
                Severity::Medium,
                name,
                format!("Service '{name}' allows privilege escalation via setuid binaries"),
                "Add 'security_opt: [\"no-new-privileges:true\"]'",
            ));
        }

        findings
    }

    /// `100 - 30 x critical - 15 x high`; medium and low findings do not count.
    fn score(&self, findings: &[Finding]) -> u8 {
        let critical = findings
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count();
        let high = findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .count();
        floor_score(30 * critical + 15 * high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::model::{ComposeFile, Deploy, ResourceLimits, ResourceValue, Resources};
    use pretty_assertions::assert_eq;

    fn hardened() -> ServiceSpec {
        ServiceSpec {
            cap_drop: vec!["ALL".into()],
            read_only: Some(true),
            security_opt: vec!["no-new-privileges:true".into()],
            deploy: Some(Deploy {
                resources: Some(Resources {
                    limits: Some(ResourceLimits {
                        memory: Some(ResourceValue::Text("512M".into())),
                        ..Default::default()
                    }),
                }),
            }),
            ..Default::default()
        }
    }

    fn controls(findings: &[Finding]) -> Vec<&str> {
        findings.iter().filter_map(|f| f.cis.as_deref()).collect()
    }

    #[test]
    fn test_hardened_service_is_clean() {
        let checker = ComposeComplianceChecker::new();
        let findings = checker.check_service("api", &hardened());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_privileged_always_critical() {
        let checker = ComposeComplianceChecker::new();
        let spec = ServiceSpec {
            privileged: Some(true),
            ..hardened()
        };
        let findings = checker.check_service("api", &spec);
        assert_eq!(controls(&findings), vec!["5.4"]);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].service(), Some("api"));
    }

    #[test]
    fn test_privileged_false_not_flagged() {
        let checker = ComposeComplianceChecker::new();
        let spec = ServiceSpec {
            privileged: Some(false),
            ..hardened()
        };
        assert!(checker.check_service("api", &spec).is_empty());
    }

    #[test]
    fn test_bare_service_findings_in_order() {
        let checker = ComposeComplianceChecker::new();
        let findings = checker.check_service("web", &ServiceSpec::default());
        assert_eq!(controls(&findings), vec!["5.3", "5.10", "5.12", "5.25"]);
    }

    #[test]
    fn test_database_exempt_from_read_only() {
        let checker = ComposeComplianceChecker::new();
        for name in ["db", "Postgres", "app-mysql", "mongodb", "redis-cache"] {
            let spec = ServiceSpec {
                read_only: None,
                ..hardened()
            };
            assert!(
                checker.check_service(name, &spec).is_empty(),
                "{name} should be exempt"
            );
        }
    }

    #[test]
    fn test_mem_limit_shorthand() {
        let checker = ComposeComplianceChecker::new();
        let spec = ServiceSpec {
            deploy: None,
            mem_limit: Some(ResourceValue::Number(268435456.0)),
            ..hardened()
        };
        assert!(checker.check_service("api", &spec).is_empty());
    }

    #[test]
    fn test_score_ignores_medium() {
        let checker = ComposeComplianceChecker::new();
        let compose = ComposeFile::default()
            .with_service("web", ServiceSpec::default())
            .with_service(
                "admin",
                ServiceSpec {
                    privileged: Some(true),
                    ..Default::default()
                },
            );
        let result = checker.check(&compose);
        // admin: 5.4 + 5.3, web: 5.3 -> 100 - 30 - 15 - 15
        assert_eq!(result.score, 40);
        assert_eq!(result.summary.critical, 1);
        assert_eq!(result.summary.high, 2);
        assert_eq!(result.findings[0].service(), Some("admin"));
    }

    #[test]
    fn test_score_floor() {
        let checker = ComposeComplianceChecker::new();
        let mut compose = ComposeFile::default();
        for i in 0..5 {
            compose = compose.with_service(
                format!("svc{i}"),
                ServiceSpec {
                    privileged: Some(true),
                    ..Default::default()
                },
            );
        }
        assert_eq!(checker.check(&compose).score, 0);
    }
}
