//! CLI subcommand handlers.
//!
//! Handlers render their output into a [`CommandOutput`] instead of printing,
//! so `main` owns stdout and the exit code.

use crate::{Cli, Commands, OutputFormat};
use anyhow::Context;
use dockward_core::compliance::CisControl;
use dockward_core::compose::{CheckResult, ComplianceCheck};
use dockward_core::config::{DockwardConfig, load_config};
use dockward_core::dockerfile::{LintResult, Rule, RuleTrigger};
use dockward_core::report::{SarifLog, sarif, text};
use dockward_core::{
    AuditInput, AuditOptions, ComplianceReportAggregator, ComposeComplianceChecker,
    ComposeFile, DockerfileParser, Finding, RuntimeComplianceChecker, create_dockerfile_linter,
};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

const TOOL_NAME: &str = "dockward";
const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rendered command output and whether the run should exit successfully.
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn new(text: String, success: bool) -> Self {
        Self { text, success }
    }
}

/// Handle a CLI subcommand.
pub fn handle_command(cli: &Cli) -> anyhow::Result<CommandOutput> {
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());
    let config = load_config(Some(&workspace), cli.config.as_deref())
        .context("failed to load configuration")?;
    tracing::debug!(workspace = %workspace.display(), "configuration loaded");

    match &cli.command {
        Commands::Lint { files } => handle_lint(files, &config, cli.format),
        Commands::Compose { file } => handle_compose(file, &config, cli.format),
        Commands::Audit {
            dockerfile,
            compose,
            threshold,
        } => handle_audit(
            dockerfile.as_deref(),
            compose.as_deref(),
            *threshold,
            &config,
            cli.format,
        ),
        Commands::Rules => handle_rules(&config, cli.format),
    }
}

/// Read a UTF-8 input file, refusing anything above the configured size.
fn read_input(path: &Path, max_bytes: u64) -> anyhow::Result<String> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    if metadata.len() > max_bytes {
        anyhow::bail!(
            "'{}' is {} bytes, above the {} byte limit (max_file_bytes)",
            path.display(),
            metadata.len(),
            max_bytes
        );
    }
    std::fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))
}

fn load_compose(path: &Path, max_bytes: u64) -> anyhow::Result<ComposeFile> {
    let source = read_input(path, max_bytes)?;
    let value: serde_json::Value = serde_yaml::from_str(&source)
        .with_context(|| format!("'{}' is not valid YAML", path.display()))?;
    ComposeFile::from_value(value)
        .with_context(|| format!("'{}' is not a valid Compose file", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

fn has_blocking(findings: &[Finding]) -> bool {
    findings
        .iter()
        .any(|f| f.severity >= dockward_core::Severity::High)
}

#[derive(Serialize)]
struct FileLint<'a> {
    path: String,
    #[serde(flatten)]
    result: &'a LintResult,
}

fn handle_lint(
    files: &[PathBuf],
    config: &DockwardConfig,
    format: OutputFormat,
) -> anyhow::Result<CommandOutput> {
    let linter = create_dockerfile_linter(&config.rules).context("invalid rule configuration")?;

    let results = files
        .par_iter()
        .map(|path| {
            let source = read_input(path, config.max_file_bytes)?;
            let result = linter.lint_source(&source);
            tracing::info!(
                path = %path.display(),
                findings = result.findings.len(),
                score = result.score,
                "linted dockerfile"
            );
            Ok((path.display().to_string(), result))
        })
        .collect::<anyhow::Result<Vec<(String, LintResult)>>>()?;

    let success = !results.iter().any(|(_, r)| r.has_blocking());

    let text = match format {
        OutputFormat::Text => results
            .iter()
            .map(|(path, result)| text::render_lint(path, result))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => {
            let files: Vec<FileLint<'_>> = results
                .iter()
                .map(|(path, result)| FileLint {
                    path: path.clone(),
                    result,
                })
                .collect();
            to_json(&files)?
        }
        OutputFormat::Sarif => {
            let runs = results
                .iter()
                .flat_map(|(path, result)| {
                    sarif::findings_to_sarif(&result.findings, path, TOOL_NAME, TOOL_VERSION).runs
                })
                .collect();
            to_json(&SarifLog::from_runs(runs))?
        }
    };

    Ok(CommandOutput::new(text, success))
}

fn handle_compose(
    file: &Path,
    config: &DockwardConfig,
    format: OutputFormat,
) -> anyhow::Result<CommandOutput> {
    let compose = load_compose(file, config.max_file_bytes)?;

    let cis = ComposeComplianceChecker::new();
    let runtime = RuntimeComplianceChecker::new();
    let checks: [&dyn ComplianceCheck; 2] = [&cis, &runtime];
    let results: Vec<(&str, CheckResult)> = checks
        .iter()
        .map(|check| (check.name(), check.check(&compose)))
        .collect();

    let findings: Vec<Finding> = results
        .iter()
        .flat_map(|(_, r)| r.findings.iter().cloned())
        .collect();
    let success = !has_blocking(&findings);
    let path = file.display().to_string();

    let text = match format {
        OutputFormat::Text => {
            let mut out = format!("{path}: {} service(s)\n\n", compose.services.len());
            let rendered: Vec<String> = results
                .iter()
                .map(|(name, result)| text::render_check(name, result))
                .collect();
            out.push_str(&rendered.join("\n"));
            out
        }
        OutputFormat::Json => {
            let by_check: std::collections::BTreeMap<&str, &CheckResult> =
                results.iter().map(|(name, r)| (*name, r)).collect();
            to_json(&by_check)?
        }
        OutputFormat::Sarif => to_json(&sarif::findings_to_sarif(
            &findings,
            &path,
            TOOL_NAME,
            TOOL_VERSION,
        ))?,
    };

    Ok(CommandOutput::new(text, success))
}

fn handle_audit(
    dockerfile: Option<&Path>,
    compose: Option<&Path>,
    threshold: Option<u8>,
    config: &DockwardConfig,
    format: OutputFormat,
) -> anyhow::Result<CommandOutput> {
    if dockerfile.is_none() && compose.is_none() {
        anyhow::bail!("audit needs at least one of --dockerfile or --compose");
    }

    let parsed = dockerfile
        .map(|path| read_input(path, config.max_file_bytes).map(|s| DockerfileParser::parse(&s)))
        .transpose()?;
    let compose_file = compose
        .map(|path| load_compose(path, config.max_file_bytes))
        .transpose()?;

    let aggregator =
        ComplianceReportAggregator::from_config(&config.rules).context("invalid rule configuration")?;
    let input = AuditInput {
        dockerfile: parsed.as_ref(),
        compose: compose_file.as_ref(),
    };
    let options = AuditOptions {
        pass_threshold: threshold,
    };
    let outcome = aggregator.audit(&input, &options);
    let effective_threshold = threshold.unwrap_or(config.rules.pass_threshold);

    tracing::info!(
        score = outcome.report.score,
        threshold = effective_threshold,
        passed = outcome.passed,
        "audit finished"
    );

    let text = match format {
        OutputFormat::Text => text::render_audit(&outcome, effective_threshold),
        OutputFormat::Json => to_json(&outcome)?,
        OutputFormat::Sarif => {
            let (line_findings, service_findings): (Vec<Finding>, Vec<Finding>) = outcome
                .report
                .findings
                .iter()
                .cloned()
                .partition(|f| f.line().is_some());

            let mut runs = Vec::new();
            if let Some(path) = dockerfile {
                runs.extend(
                    sarif::findings_to_sarif(
                        &line_findings,
                        &path.display().to_string(),
                        TOOL_NAME,
                        TOOL_VERSION,
                    )
                    .runs,
                );
            }
            if let Some(path) = compose {
                runs.extend(
                    sarif::findings_to_sarif(
                        &service_findings,
                        &path.display().to_string(),
                        TOOL_NAME,
                        TOOL_VERSION,
                    )
                    .runs,
                );
            }
            to_json(&SarifLog::from_runs(runs))?
        }
    };

    Ok(CommandOutput::new(text, outcome.passed))
}

#[derive(Serialize)]
struct RuleListing<'a> {
    dockerfile: &'a [Rule],
    disabled: Vec<&'a str>,
    compose: Vec<&'a str>,
    cis: &'a [CisControl],
}

fn trigger_label(trigger: &RuleTrigger) -> String {
    match trigger {
        RuleTrigger::Instruction(keywords) => keywords.join("/"),
        RuleTrigger::PostScan => "post-scan".to_string(),
    }
}

fn handle_rules(config: &DockwardConfig, format: OutputFormat) -> anyhow::Result<CommandOutput> {
    let aggregator =
        ComplianceReportAggregator::from_config(&config.rules).context("invalid rule configuration")?;
    let rules = aggregator.linter().linter().rules();
    let rule_config = aggregator.linter().config();
    let catalogue = aggregator.catalogue();

    let text = match format {
        OutputFormat::Text => {
            let mut out = String::from("Dockerfile rules:\n");
            for rule in rules {
                let status = if rule_config.is_disabled(rule.id) { "off" } else { "on" };
                out.push_str(&format!(
                    "  {:<22} {:<3} {:<8} {:<6} {:<10} {}\n",
                    rule.id,
                    status,
                    rule.severity.as_str(),
                    rule.cis.unwrap_or("-"),
                    trigger_label(&rule.trigger),
                    rule.description
                ));
            }
            out.push_str(&format!(
                "\nCompose checks: {}\n",
                aggregator.check_names().join(", ")
            ));
            out.push_str("\nCIS controls:\n");
            for control in catalogue.controls() {
                out.push_str(&format!(
                    "  {:<5} {:<8} {}\n",
                    control.id,
                    control.level.to_string(),
                    control.title
                ));
            }
            out
        }
        OutputFormat::Json | OutputFormat::Sarif => to_json(&RuleListing {
            dockerfile: rules,
            disabled: rules
                .iter()
                .map(|r| r.id)
                .filter(|id| rule_config.is_disabled(id))
                .collect(),
            compose: aggregator.check_names(),
            cis: catalogue.controls(),
        })?,
    };

    Ok(CommandOutput::new(text, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SECURE_DOCKERFILE: &str = "FROM node:20-alpine AS builder\n\
        RUN npm ci && npm run build\n\
        FROM node:20-alpine\n\
        COPY --from=builder /app/dist ./dist\n\
        USER node\n\
        HEALTHCHECK CMD node healthcheck.js\n";

    const INSECURE_DOCKERFILE: &str = "FROM node:latest\nENV API_KEY=sk_live_abcdefghij1234\n";

    const COMPOSE: &str = "services:\n  web:\n    image: nginx:1.25\n    privileged: true\n";

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run(dir: &TempDir, args: &[&str]) -> anyhow::Result<CommandOutput> {
        let ws = dir.path().to_str().unwrap().to_string();
        let mut argv = vec!["dockward", "--workspace", ws.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);
        handle_command(&cli)
    }

    #[test]
    fn test_lint_secure_file_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "Dockerfile", SECURE_DOCKERFILE);
        let output = run(&dir, &["lint", path.to_str().unwrap()]).unwrap();
        assert!(output.success);
        assert!(output.text.contains("score 100/100"));
    }

    #[test]
    fn test_lint_multiple_files_keeps_order() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.Dockerfile", SECURE_DOCKERFILE);
        let b = write(&dir, "b.Dockerfile", INSECURE_DOCKERFILE);
        let output = run(
            &dir,
            &["--format", "json", "lint", a.to_str().unwrap(), b.to_str().unwrap()],
        )
        .unwrap();

        assert!(!output.success);
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        let files = json.as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0]["path"].as_str().unwrap().ends_with("a.Dockerfile"));
        assert_eq!(files[0]["score"], 100);
        assert!(files[1]["findings"].as_array().unwrap().len() >= 2);
    }

    #[test]
    fn test_lint_sarif_has_run_per_file() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.Dockerfile", INSECURE_DOCKERFILE);
        let b = write(&dir, "b.Dockerfile", INSECURE_DOCKERFILE);
        let output = run(
            &dir,
            &["--format", "sarif", "lint", a.to_str().unwrap(), b.to_str().unwrap()],
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(json["version"], "2.1.0");
        assert_eq!(json["runs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_lint_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(run(&dir, &["lint", missing.to_str().unwrap()]).is_err());
    }

    #[test]
    fn test_lint_rejects_oversized_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".dockward.toml", "max_file_bytes = 10\n");
        let path = write(&dir, "Dockerfile", SECURE_DOCKERFILE);
        let err = run(&dir, &["lint", path.to_str().unwrap()]).unwrap_err();
        assert!(err.to_string().contains("byte limit"));
    }

    #[test]
    fn test_workspace_config_disables_rule() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            ".dockward.toml",
            "[rules]\nno-root-user = \"off\"\nrecommend-healthcheck = false\n",
        );
        let path = write(&dir, "Dockerfile", "FROM node:20-alpine\n");
        let output = run(&dir, &["lint", path.to_str().unwrap()]).unwrap();
        assert!(output.success);
        assert!(!output.text.contains("no-root-user"));
        assert!(output.text.contains("score 100/100"));
    }

    #[test]
    fn test_compose_reports_both_checkers() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "compose.yml", COMPOSE);
        let output = run(&dir, &["--format", "json", "compose", path.to_str().unwrap()]).unwrap();

        assert!(!output.success);
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(json["compose-cis"]["findings"][0]["cis"], "5.4");
        assert_eq!(json["compose-runtime"]["score"], 90);
    }

    #[test]
    fn test_compose_numeric_user_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "compose.yml",
            "services:\n  web:\n    image: nginx:1.25\n    user: 1000\n    privileged: true\n",
        );
        let output = run(&dir, &["--format", "json", "compose", path.to_str().unwrap()]).unwrap();

        assert!(!output.success);
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(json["compose-cis"]["findings"][0]["cis"], "5.4");
    }

    #[test]
    fn test_compose_invalid_yaml_errors() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "compose.yml", "services: [unclosed\n");
        let err = run(&dir, &["compose", path.to_str().unwrap()]).unwrap_err();
        assert!(err.to_string().contains("not valid YAML"));
    }

    #[test]
    fn test_audit_gate() {
        let dir = TempDir::new().unwrap();
        let dockerfile = write(&dir, "Dockerfile", SECURE_DOCKERFILE);
        let compose = write(&dir, "compose.yml", COMPOSE);

        let passed = run(&dir, &["audit", "--dockerfile", dockerfile.to_str().unwrap()]).unwrap();
        assert!(passed.success);
        assert!(passed.text.contains("Audit PASSED"));

        let failed = run(
            &dir,
            &[
                "audit",
                "--dockerfile",
                dockerfile.to_str().unwrap(),
                "--compose",
                compose.to_str().unwrap(),
            ],
        )
        .unwrap();
        assert!(!failed.success);
        assert!(failed.text.contains("Audit FAILED"));

        let lenient = run(
            &dir,
            &[
                "audit",
                "--compose",
                compose.to_str().unwrap(),
                "--threshold",
                "40",
            ],
        )
        .unwrap();
        assert!(lenient.success);
    }

    #[test]
    fn test_audit_json_shape() {
        let dir = TempDir::new().unwrap();
        let compose = write(&dir, "compose.yml", COMPOSE);
        let output = run(
            &dir,
            &["--format", "json", "audit", "--compose", compose.to_str().unwrap()],
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["score"], json["level1Score"]);
        assert!(json["bySection"]["5"].is_array());
    }

    #[test]
    fn test_audit_requires_an_input() {
        let dir = TempDir::new().unwrap();
        assert!(run(&dir, &["audit"]).is_err());
    }

    #[test]
    fn test_rules_listing() {
        let dir = TempDir::new().unwrap();
        let output = run(&dir, &["rules"]).unwrap();
        assert!(output.success);
        assert!(output.text.contains("no-latest-tag"));
        assert!(output.text.contains("post-scan"));
        assert!(output.text.contains("5.25"));

        let json = run(&dir, &["--format", "json", "rules"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json.text).unwrap();
        assert_eq!(value["dockerfile"].as_array().unwrap().len(), 9);
        assert_eq!(value["cis"].as_array().unwrap().len(), 15);
        assert_eq!(
            value["compose"],
            serde_json::json!(["compose-cis", "compose-runtime"])
        );
        assert_eq!(value["disabled"], serde_json::json!([]));
    }

    #[test]
    fn test_rules_listing_marks_disabled_rules() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            ".dockward.toml",
            "[rules]\nrecommend-healthcheck = \"off\"\n",
        );
        let json = run(&dir, &["--format", "json", "rules"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json.text).unwrap();
        assert_eq!(value["disabled"], serde_json::json!(["recommend-healthcheck"]));

        let text = run(&dir, &["rules"]).unwrap();
        assert!(text.text.contains("Compose checks: compose-cis, compose-runtime"));
    }
}
