//! Redaction and compliance collaborator contracts

mod redaction;
mod rules;

pub use redaction::{PiiRedactor, RedactionMatch, RedactionResult};
pub use rules::{ComplianceIssue, ComplianceReport, ComplianceRules, IssueSeverity, IssueType};
