//! CIS control catalogue and the compliance report aggregator.

pub mod aggregate;
pub mod catalogue;

pub use aggregate::{
    AuditInput, AuditOptions, AuditOutcome, ComplianceReport, ComplianceReportAggregator,
};
pub use catalogue::{CisCatalogue, CisControl, CisLevel};
