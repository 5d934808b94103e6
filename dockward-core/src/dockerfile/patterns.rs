//! Heuristic pattern catalogue for secret and sensitive-file detection.
//!
//! These are regular expressions over opaque strings, not a shell or path
//! grammar. False positives and negatives are expected; the catalogue is a
//! behavioural contract and should be extended, not rewritten.

use regex::Regex;

/// A compiled detection pattern.
#[derive(Debug, Clone)]
pub struct NamedPattern {
    /// Human-readable name for this pattern type.
    pub name: String,
    /// Compiled regex.
    pub regex: Regex,
}

/// Compiled detection patterns used by the Dockerfile rules.
#[derive(Debug, Clone)]
pub struct PatternCatalogue {
    secrets: Vec<NamedPattern>,
    sensitive_files: Vec<NamedPattern>,
}

/// Base images considered minimal (matched case-insensitively as substrings).
const MINIMAL_BASES: &[&str] = &["alpine", "distroless", "slim", "scratch", "busybox"];

/// Substrings in a RUN command that mark a build step.
const BUILD_MARKERS: &[&str] = &["npm", "build", "compile"];

impl PatternCatalogue {
    /// Compile the built-in catalogue.
    pub fn new() -> Self {
        Self {
            secrets: compile(secret_pattern_defs()),
            sensitive_files: compile(sensitive_file_defs()),
        }
    }

    /// Name of the first secret pattern matching `text`, if any.
    pub fn find_secret(&self, text: &str) -> Option<&str> {
        self.secrets
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| p.name.as_str())
    }

    /// Name of the first sensitive-file pattern matching a single path token.
    pub fn find_sensitive_file(&self, token: &str) -> Option<&str> {
        let path = clean_token(token);
        if path.is_empty() {
            return None;
        }
        self.sensitive_files
            .iter()
            .find(|p| p.regex.is_match(path))
            .map(|p| p.name.as_str())
    }

    /// Whether an image reference names a minimal base.
    pub fn is_minimal_base(&self, image: &str) -> bool {
        let lower = image.to_ascii_lowercase();
        MINIMAL_BASES.iter().any(|base| lower.contains(base))
    }

    /// Whether a RUN command looks like a build step.
    pub fn is_build_command(&self, command: &str) -> bool {
        BUILD_MARKERS.iter().any(|marker| command.contains(marker))
    }

    /// Whether arguments reference a remote URL.
    pub fn has_remote_url(&self, arguments: &str) -> bool {
        arguments.contains("http://") || arguments.contains("https://")
    }
}

impl Default for PatternCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip exec-form JSON punctuation around a path token.
fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'' | ','))
}

fn secret_pattern_defs() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "credential_assignment",
            r#"(?i)(api[_-]?key|apikey|secret|password|passwd|token|db_password|private[_-]?key|access[_-]?key)\s*=\s*\S+"#,
        ),
        ("stripe_live_key", r"sk_live_[0-9a-zA-Z]{10,}"),
        ("stripe_test_key", r"sk_test_[0-9a-zA-Z]{10,}"),
        ("aws_access_key", r"AKIA[0-9A-Z]{16}"),
        ("github_pat", r"ghp_[0-9a-zA-Z]{36}"),
        ("github_oauth", r"gho_[0-9a-zA-Z]{36}"),
        ("github_fine_grained_pat", r"github_pat_[0-9a-zA-Z_]{22,}"),
        ("slack_token", r"xox[baprs]-[0-9a-zA-Z-]{10,}"),
        (
            "private_key_block",
            r"-----BEGIN (RSA |EC |OPENSSH |DSA )?PRIVATE KEY-----",
        ),
    ]
}

fn sensitive_file_defs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("dotenv", r"(?i)(^|/)\.env(\.[\w.-]+)?$"),
        ("pem_file", r"(?i)\.pem$"),
        ("key_file", r"(?i)\.key$"),
        ("pkcs12_file", r"(?i)\.(p12|pfx)$"),
        ("ssh_private_key", r"(?i)(^|/)id_(rsa|ed25519|dsa|ecdsa)$"),
        ("ssh_directory", r"(?i)(^|/)\.ssh(/|$)"),
        ("credentials", r"(?i)credentials"),
        ("secrets", r"(?i)secrets"),
        ("git_directory", r"(?i)(^|/)\.git(/|$)"),
        ("npmrc", r"(?i)(^|/)\.npmrc$"),
        ("pypirc", r"(?i)(^|/)\.pypirc$"),
        ("netrc", r"(?i)(^|/)\.netrc$"),
        ("aws_directory", r"(?i)(^|/)\.aws(/|$)"),
        ("kubeconfig", r"(?i)kubeconfig"),
        ("docker_config", r"(?i)(^|/)\.docker/config\.json$"),
        ("terraform_state", r"(?i)\.tfstate(\.backup)?$"),
    ]
}

fn compile(defs: Vec<(&'static str, &'static str)>) -> Vec<NamedPattern> {
    defs.into_iter()
        .filter_map(|(name, pattern)| match Regex::new(pattern) {
            Ok(regex) => Some(NamedPattern {
                name: name.to_string(),
                regex,
            }),
            Err(e) => {
                tracing::warn!("Failed to compile detection pattern '{}': {}", name, e);
                None
            }
        })
        .collect()
}
