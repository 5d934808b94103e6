//! Dockerfile rule catalogue.
//!
//! Rules are plain values in a fixed, ordered list. Each declares which
//! instructions trigger it (or that it runs once after the scan) and a check
//! function. Adding a rule means appending to [`builtin_rules`].

use super::parser::{Instruction, ParsedDockerfile};
use super::patterns::PatternCatalogue;
use crate::finding::{Finding, Severity};
use serde::Serialize;

/// When a rule is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleTrigger {
    /// Once per instruction whose keyword is in the list.
    Instruction(&'static [&'static str]),
    /// Once, after every instruction has been visited.
    PostScan,
}

impl RuleTrigger {
    fn applies_to(&self, keyword: &str) -> bool {
        match self {
            RuleTrigger::Instruction(keywords) => keywords.iter().any(|k| *k == keyword),
            RuleTrigger::PostScan => false,
        }
    }
}

/// Signature of a rule check.
pub type RuleCheck = fn(&Rule, &RuleContext<'_>) -> Vec<Finding>;

/// A Dockerfile lint rule.
#[derive(Clone, Serialize)]
pub struct Rule {
    /// Rule identifier.
    pub id: &'static str,
    /// Severity of findings this rule emits.
    pub severity: Severity,
    /// CIS Docker Benchmark control, if any.
    pub cis: Option<&'static str>,
    /// One-line description.
    pub description: &'static str,
    /// Suggested fix attached to findings.
    pub fix: &'static str,
    /// When the rule runs.
    pub trigger: RuleTrigger,
    #[serde(skip)]
    check: RuleCheck,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("trigger", &self.trigger)
            .finish()
    }
}

impl Rule {
    /// Whether this rule runs for an instruction keyword.
    pub fn applies_to(&self, keyword: &str) -> bool {
        self.trigger.applies_to(keyword)
    }

    /// Whether this rule runs in the post-scan pass.
    pub fn is_post_scan(&self) -> bool {
        self.trigger == RuleTrigger::PostScan
    }

    /// Evaluate the rule.
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        (self.check)(self, ctx)
    }

    /// Build a finding carrying this rule's id, severity, cis and fix.
    fn finding(&self, line: usize, message: impl Into<String>) -> Finding {
        let mut finding =
            Finding::at_line(self.id, self.severity, line, message).with_fix(self.fix);
        if let Some(cis) = self.cis {
            finding = finding.with_cis(cis);
        }
        finding
    }
}

/// Running state accumulated while walking instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintState {
    pub has_user: bool,
    pub user_is_root: bool,
    /// Line of the most recent USER instruction.
    pub user_line: Option<usize>,
    pub has_healthcheck: bool,
    pub has_build_instructions: bool,
    /// Line of the first RUN that looked like a build step.
    pub build_line: Option<usize>,
    /// Number of FROM instructions visited so far.
    pub stages_seen: usize,
}

impl LintState {
    /// Update state for an instruction. Runs before the instruction's rules.
    pub fn observe(&mut self, instr: &Instruction, patterns: &PatternCatalogue) {
        match instr.keyword.as_str() {
            "FROM" => self.stages_seen += 1,
            "USER" => {
                self.has_user = true;
                self.user_line = Some(instr.line);
                let user = instr.arguments.trim();
                let name = user.split_once(':').map_or(user, |(name, _)| name);
                self.user_is_root = name == "root" || name == "0";
            }
            "RUN" => {
                if patterns.is_build_command(&instr.arguments) && !self.has_build_instructions {
                    self.has_build_instructions = true;
                    self.build_line = Some(instr.line);
                }
            }
            "HEALTHCHECK" => self.has_healthcheck = true,
            _ => {}
        }
    }
}

/// Everything a rule may inspect.
pub struct RuleContext<'a> {
    pub parsed: &'a ParsedDockerfile,
    /// Current instruction; `None` in the post-scan pass.
    pub instruction: Option<&'a Instruction>,
    pub state: &'a LintState,
    pub patterns: &'a PatternCatalogue,
}

impl RuleContext<'_> {
    /// Line used by post-scan findings: the last instruction, or 1 for empty input.
    fn tail_line(&self) -> usize {
        self.parsed.instructions.last().map_or(1, |i| i.line)
    }

    /// Whether the current FROM is the final stage.
    fn is_last_stage(&self) -> bool {
        self.state.stages_seen == self.parsed.stages.len()
    }
}

/// The built-in rule list, in evaluation order.
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "no-latest-tag",
            severity: Severity::Medium,
            cis: None,
            description: "Base images must be pinned to an explicit, non-latest tag",
            fix: "Pin the base image to a specific version tag or digest, e.g. node:20-alpine",
            trigger: RuleTrigger::Instruction(&["FROM"]),
            check: check_latest_tag,
        },
        Rule {
            id: "prefer-minimal-base",
            severity: Severity::Low,
            cis: None,
            description: "The final stage should use a minimal base image",
            fix: "Use an alpine, slim, distroless, busybox or scratch base for the runtime stage",
            trigger: RuleTrigger::Instruction(&["FROM"]),
            check: check_minimal_base,
        },
        Rule {
            id: "no-secrets-in-env",
            severity: Severity::Critical,
            cis: Some("4.10"),
            description: "ENV and ARG must not hard-code secrets",
            fix: "Pass secrets at runtime or use BuildKit secret mounts (RUN --mount=type=secret)",
            trigger: RuleTrigger::Instruction(&["ENV", "ARG"]),
            check: check_secrets_in_env,
        },
        Rule {
            id: "no-secrets-in-run",
            severity: Severity::Critical,
            cis: Some("4.10"),
            description: "RUN commands must not embed secrets",
            fix: "Use BuildKit secret mounts instead of inline credentials",
            trigger: RuleTrigger::Instruction(&["RUN"]),
            check: check_secrets_in_run,
        },
        Rule {
            id: "no-sensitive-files",
            severity: Severity::Critical,
            cis: Some("4.10"),
            description: "COPY and ADD must not include keys, credentials or VCS metadata",
            fix: "Exclude the file via .dockerignore and provide it at runtime",
            trigger: RuleTrigger::Instruction(&["COPY", "ADD"]),
            check: check_sensitive_files,
        },
        Rule {
            id: "prefer-copy-over-add",
            severity: Severity::Medium,
            cis: Some("4.9"),
            description: "ADD must not fetch remote URLs",
            fix: "Download with RUN curl/wget and verify a checksum, or COPY a vendored file",
            trigger: RuleTrigger::Instruction(&["ADD"]),
            check: check_add_url,
        },
        Rule {
            id: "no-root-user",
            severity: Severity::High,
            cis: Some("4.1"),
            description: "The image must switch to a non-root user",
            fix: "Add 'USER nonroot' or 'USER 1001' before CMD/ENTRYPOINT",
            trigger: RuleTrigger::PostScan,
            check: check_root_user,
        },
        Rule {
            id: "recommend-healthcheck",
            severity: Severity::Low,
            cis: Some("4.6"),
            description: "The image should declare a HEALTHCHECK",
            fix: "Add HEALTHCHECK --interval=30s CMD curl -f http://localhost/ || exit 1",
            trigger: RuleTrigger::PostScan,
            check: check_healthcheck,
        },
        Rule {
            id: "recommend-multi-stage",
            severity: Severity::Medium,
            cis: None,
            description: "Images that build artifacts should use a multi-stage build",
            fix: "Build in a separate stage and COPY --from=<stage> only the artifacts",
            trigger: RuleTrigger::PostScan,
            check: check_multi_stage,
        },
    ]
}

fn check_latest_tag(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some(instr) = ctx.instruction else {
        return Vec::new();
    };
    let Some(stage) = ctx
        .state
        .stages_seen
        .checked_sub(1)
        .and_then(|idx| ctx.parsed.stages.get(idx))
    else {
        return Vec::new();
    };
    let image = stage.image.as_str();

    // scratch and references to earlier stages have no tag to pin
    let earlier_stage = ctx.parsed.stages[..ctx.state.stages_seen - 1]
        .iter()
        .any(|s| s.name.as_deref() == Some(image));
    if image.is_empty() || image == "scratch" || earlier_stage {
        return Vec::new();
    }

    match image_tag(image) {
        Some(tag) if tag != "latest" => Vec::new(),
        Some(_) => vec![rule.finding(
            instr.line,
            format!("Base image '{image}' uses the ':latest' tag, which is not reproducible"),
        )],
        None => vec![rule.finding(
            instr.line,
            format!("Base image '{image}' has no tag and implicitly resolves to ':latest'"),
        )],
    }
}

/// Tag of an image reference. Digests count as a pinned tag.
fn image_tag(image: &str) -> Option<&str> {
    if let Some((_, digest)) = image.split_once('@') {
        return Some(digest);
    }
    let name = image.rsplit('/').next().unwrap_or(image);
    name.split_once(':').map(|(_, tag)| tag)
}

fn check_minimal_base(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some(instr) = ctx.instruction else {
        return Vec::new();
    };
    if !ctx.is_last_stage() {
        return Vec::new();
    }
    let image = ctx
        .parsed
        .stages
        .last()
        .map(|s| s.image.as_str())
        .unwrap_or_default();
    if ctx.patterns.is_minimal_base(image) {
        return Vec::new();
    }
    vec![rule.finding(
        instr.line,
        format!("Final stage base image '{image}' is not a minimal image"),
    )]
}

fn check_secrets_in_env(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some(instr) = ctx.instruction else {
        return Vec::new();
    };
    let args = &instr.arguments;
    // A bare `ARG NAME` has no value to leak.
    if !args.contains('=') || args.contains('$') {
        return Vec::new();
    }
    match ctx.patterns.find_secret(args) {
        Some(kind) => vec![rule.finding(
            instr.line,
            format!(
                "{} instruction hard-codes a secret ({kind}); it is stored in the image history",
                instr.keyword
            ),
        )],
        None => Vec::new(),
    }
}

fn check_secrets_in_run(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some(instr) = ctx.instruction else {
        return Vec::new();
    };
    match ctx.patterns.find_secret(&instr.arguments) {
        Some(kind) => vec![rule.finding(
            instr.line,
            format!("RUN command contains a secret ({kind}); it is stored in the layer metadata"),
        )],
        None => Vec::new(),
    }
}

fn check_sensitive_files(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some(instr) = ctx.instruction else {
        return Vec::new();
    };
    let tokens: Vec<&str> = instr
        .arguments
        .split_whitespace()
        .filter(|t| !t.starts_with("--"))
        .collect();
    let Some((_, sources)) = tokens.split_last() else {
        return Vec::new();
    };

    sources
        .iter()
        .filter_map(|source| {
            ctx.patterns.find_sensitive_file(source).map(|kind| {
                rule.finding(
                    instr.line,
                    format!(
                        "{} copies sensitive file '{source}' ({kind}) into the image",
                        instr.keyword
                    ),
                )
            })
        })
        .collect()
}

fn check_add_url(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let Some(instr) = ctx.instruction else {
        return Vec::new();
    };
    if !ctx.patterns.has_remote_url(&instr.arguments) {
        return Vec::new();
    }
    vec![rule.finding(
        instr.line,
        "ADD fetches a remote URL without integrity verification",
    )]
}

fn check_root_user(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    let state = ctx.state;
    if !state.has_user {
        return vec![rule.finding(
            ctx.tail_line(),
            "No USER instruction; the container runs as root by default",
        )];
    }
    if state.user_is_root {
        return vec![rule.finding(
            state.user_line.unwrap_or_else(|| ctx.tail_line()),
            "USER is set to root; the container runs with root privileges",
        )];
    }
    Vec::new()
}

fn check_healthcheck(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    if ctx.state.has_healthcheck {
        return Vec::new();
    }
    vec![rule.finding(
        ctx.tail_line(),
        "No HEALTHCHECK defined; orchestrators cannot determine container health",
    )]
}

fn check_multi_stage(rule: &Rule, ctx: &RuleContext<'_>) -> Vec<Finding> {
    if !ctx.state.has_build_instructions || ctx.parsed.is_multi_stage {
        return Vec::new();
    }
    vec![rule.finding(
        ctx.state.build_line.unwrap_or_else(|| ctx.tail_line()),
        "Build tooling runs in a single-stage image and ships with the runtime",
    )]
}
