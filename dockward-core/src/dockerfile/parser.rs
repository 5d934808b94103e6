//! Dockerfile parser: turns raw source text into an ordered instruction list.
//!
//! Parsing is total: lines that are not instructions, comments, or
//! continuations are skipped, so any input yields a `ParsedDockerfile`.

use serde::{Deserialize, Serialize};

/// A single logical Dockerfile instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Upper-case directive (FROM, RUN, COPY, ...).
    pub keyword: String,
    /// Arguments, with continuation lines merged by single spaces.
    pub arguments: String,
    /// Line number (1-based) of the first physical line.
    pub line: usize,
}

impl Instruction {
    /// Whether this instruction's keyword equals `keyword`.
    pub fn is(&self, keyword: &str) -> bool {
        self.keyword == keyword
    }
}

/// A build stage, one per `FROM` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// `AS <alias>` target, if present.
    pub name: Option<String>,
    /// Base image reference.
    pub image: String,
    /// Line of the `FROM` instruction.
    pub line: usize,
}

/// A `#` comment outside of any continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub line: usize,
    pub text: String,
}

/// Parsed Dockerfile structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDockerfile {
    /// All instructions in document order.
    pub instructions: Vec<Instruction>,
    /// Comments in document order.
    pub comments: Vec<Comment>,
    /// Base image of each stage, parallel to `stages`.
    pub base_images: Vec<String>,
    /// Build stages.
    pub stages: Vec<Stage>,
    /// Whether more than one stage exists.
    pub is_multi_stage: bool,
}

/// Dockerfile parser.
pub struct DockerfileParser;

impl DockerfileParser {
    /// Parse a Dockerfile into structured instructions.
    pub fn parse(content: &str) -> ParsedDockerfile {
        let mut instructions: Vec<Instruction> = Vec::new();
        let mut comments = Vec::new();
        let mut in_continuation = false;

        for (idx, raw) in content.lines().enumerate() {
            let line_num = idx + 1;
            let trimmed = raw.trim();

            if in_continuation {
                if trimmed.is_empty() {
                    continue;
                }
                let (part, continues) = split_continuation(trimmed);
                if let Some(current) = instructions.last_mut() {
                    append_argument(&mut current.arguments, part);
                }
                in_continuation = continues;
                continue;
            }

            if trimmed.is_empty() {
                continue;
            }

            if let Some(text) = trimmed.strip_prefix('#') {
                comments.push(Comment {
                    line: line_num,
                    text: text.trim().to_string(),
                });
                continue;
            }

            let Some((keyword, rest)) = split_keyword(trimmed) else {
                continue;
            };

            let (arguments, continues) = split_continuation(rest);
            instructions.push(Instruction {
                keyword: keyword.to_string(),
                arguments: arguments.to_string(),
                line: line_num,
            });
            in_continuation = continues;
        }

        let stages: Vec<Stage> = instructions
            .iter()
            .filter(|i| i.is("FROM"))
            .map(parse_stage)
            .collect();
        let base_images = stages.iter().map(|s| s.image.clone()).collect();
        let is_multi_stage = stages.len() > 1;

        tracing::trace!(
            instructions = instructions.len(),
            stages = stages.len(),
            comments = comments.len(),
            "parsed dockerfile"
        );

        ParsedDockerfile {
            instructions,
            comments,
            base_images,
            stages,
            is_multi_stage,
        }
    }
}

/// Split a line into its leading upper-case keyword and the remaining text.
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let end = line
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(line.len());
    if end == 0 {
        return None;
    }
    Some((&line[..end], line[end..].trim_start()))
}

/// Strip a trailing backslash, reporting whether one was present.
fn split_continuation(text: &str) -> (&str, bool) {
    match text.strip_suffix('\\') {
        Some(stripped) => (stripped.trim_end(), true),
        None => (text, false),
    }
}

fn append_argument(arguments: &mut String, part: &str) {
    if part.is_empty() {
        return;
    }
    if !arguments.is_empty() {
        arguments.push(' ');
    }
    arguments.push_str(part);
}

/// Parse `FROM [--flag=...] <image> [AS <name>]`.
fn parse_stage(instr: &Instruction) -> Stage {
    let tokens: Vec<&str> = instr
        .arguments
        .split_whitespace()
        .skip_while(|t| t.starts_with("--"))
        .collect();

    let (image, name) = match tokens.as_slice() {
        [image] => (*image, None),
        [image, as_kw, name] if as_kw.eq_ignore_ascii_case("as") => (*image, Some(*name)),
        [image, ..] => (*image, None),
        [] => ("", None),
    };

    Stage {
        name: name.map(str::to_string),
        image: image.to_string(),
        line: instr.line,
    }
}
