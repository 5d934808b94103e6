//! Dockerfile analysis: parser, rule catalogue and lint engine.

pub mod lint;
pub mod parser;
pub mod patterns;
pub mod rules;

pub use lint::{ConfiguredLinter, DockerfileLinter, LintResult, create_dockerfile_linter};
pub use parser::{Comment, DockerfileParser, Instruction, ParsedDockerfile, Stage};
pub use rules::{Rule, RuleTrigger};
