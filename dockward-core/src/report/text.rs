//! Plain-text report rendering for terminal output.

use crate::compliance::{AuditOutcome, ComplianceReport};
use crate::compose::CheckResult;
use crate::dockerfile::LintResult;
use crate::finding::{Finding, FindingSummary, Severity};

const SEVERITY_ORDER: [Severity; 5] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
    Severity::Info,
];

fn push_summary(out: &mut String, summary: &FindingSummary) {
    out.push_str(&format!(
        "{} finding(s): {} critical, {} high, {} medium, {} low, {} info\n",
        summary.total, summary.critical, summary.high, summary.medium, summary.low, summary.info
    ));
}

fn push_finding(out: &mut String, finding: &Finding) {
    let cis = finding
        .cis
        .as_deref()
        .map(|c| format!(" [CIS {c}]"))
        .unwrap_or_default();
    out.push_str(&format!(
        "  {} {}{}: {}\n",
        finding.location, finding.rule, cis, finding.message
    ));
    if let Some(fix) = &finding.fix {
        out.push_str(&format!("      fix: {fix}\n"));
    }
}

/// Findings grouped by severity, most severe first. Order within a group is
/// the order findings were produced in.
fn push_findings(out: &mut String, findings: &[Finding]) {
    if findings.is_empty() {
        out.push_str("No findings.\n");
        return;
    }
    for severity in SEVERITY_ORDER {
        let group: Vec<&Finding> = findings.iter().filter(|f| f.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        out.push_str(&format!(
            "\n{} ({})\n",
            severity.as_str().to_uppercase(),
            group.len()
        ));
        for finding in group {
            push_finding(out, finding);
        }
    }
}

/// Render a single Dockerfile lint result.
pub fn render_lint(path: &str, result: &LintResult) -> String {
    let mut out = format!("{path}: score {}/100\n", result.score);
    push_summary(&mut out, &result.summary);
    push_findings(&mut out, &result.findings);
    out
}

/// Render one Compose checker's result.
pub fn render_check(name: &str, result: &CheckResult) -> String {
    let mut out = format!("{name}: score {}/100\n", result.score);
    push_summary(&mut out, &result.summary);
    push_findings(&mut out, &result.findings);
    out
}

/// Render an aggregated compliance report with its per-section breakdown.
pub fn render_report(report: &ComplianceReport) -> String {
    let mut out = format!("Compliance score: {}/100\n", report.score);
    if let Some(level1) = report.level1_score {
        out.push_str(&format!("CIS Level 1 score: {level1}/100\n"));
    }
    push_summary(&mut out, &report.summary);

    if !report.by_section.is_empty() {
        out.push_str("\nBy CIS section:\n");
        for (section, findings) in &report.by_section {
            out.push_str(&format!("  {section}: {}\n", findings.len()));
        }
    }

    push_findings(&mut out, &report.findings);
    out
}

/// Render an audit outcome: the report followed by the gate verdict.
pub fn render_audit(outcome: &AuditOutcome, threshold: u8) -> String {
    let mut out = render_report(&outcome.report);
    let verdict = if outcome.passed { "PASSED" } else { "FAILED" };
    out.push_str(&format!(
        "\nAudit {verdict} (score {} / threshold {threshold})\n",
        outcome.report.score
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{AuditInput, AuditOptions, ComplianceReportAggregator};
    use crate::compose::{ComposeFile, ServiceSpec};
    use crate::dockerfile::DockerfileLinter;

    #[test]
    fn test_render_lint_groups_by_severity() {
        let result = DockerfileLinter::new().lint_source("FROM node:latest\nENV API_KEY=abc123\n");
        let text = render_lint("Dockerfile", &result);

        assert!(text.starts_with("Dockerfile: score"));
        let critical = text.find("CRITICAL").unwrap();
        let medium = text.find("MEDIUM").unwrap();
        assert!(critical < medium);
        assert!(text.contains("line 2 no-secrets-in-env [CIS 4.10]"));
        assert!(text.contains("fix: "));
    }

    #[test]
    fn test_render_lint_empty() {
        let result = LintResult::from_findings(Vec::new());
        let text = render_lint("Dockerfile", &result);
        assert!(text.contains("score 100/100"));
        assert!(text.contains("No findings."));
    }

    #[test]
    fn test_render_check() {
        use crate::compose::{ComplianceCheck, RuntimeComplianceChecker};

        let compose = ComposeFile::default().with_service(
            "web",
            ServiceSpec {
                network_mode: Some("host".into()),
                ..Default::default()
            },
        );
        let result = RuntimeComplianceChecker::new().check(&compose);
        let text = render_check("compose-runtime", &result);
        assert!(text.starts_with("compose-runtime: score 80/100"));
        assert!(text.contains("HIGH (1)"));
        assert!(text.contains("LOW (1)"));
    }

    #[test]
    fn test_render_audit() {
        let compose = ComposeFile::default().with_service("web", ServiceSpec::default());
        let outcome = ComplianceReportAggregator::new().audit(
            &AuditInput::new().with_compose(&compose),
            &AuditOptions::default(),
        );
        let text = render_audit(&outcome, 70);

        assert!(text.contains("CIS Level 1 score: 58/100"));
        assert!(text.contains("  5: 5"));
        assert!(text.contains("service 'web' 5.3 [CIS 5.3]"));
        assert!(text.contains("Audit FAILED (score 58 / threshold 70)"));
    }
}
