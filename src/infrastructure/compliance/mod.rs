//! Redaction and compliance rule implementations

mod redaction;
mod rules;

pub use redaction::RegexPiiRedactor;
pub use rules::StaticComplianceRules;
