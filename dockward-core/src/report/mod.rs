//! Report output: SARIF 2.1.0 and plain text.

pub mod sarif;
pub mod text;

pub use sarif::{SarifLog, findings_to_sarif};
pub use text::{render_audit, render_check, render_lint, render_report};
