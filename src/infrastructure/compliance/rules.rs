//! Built-in compliance rules

use crate::domain::compliance::{
    ComplianceIssue, ComplianceReport, ComplianceRules, IssueSeverity, IssueType,
};
use crate::domain::workflow::Audience;

const RESTRICTED_PHRASES: &[&str] = &[
    "guaranteed",
    "100% safe",
    "no risk",
    "risk-free",
    "absolutely certain",
    "promise",
    "never fail",
    "always works",
    "unconditional",
    "unlimited liability",
];

const CUSTOMER_DISCLAIMERS: &[&str] = &[
    "Terms and conditions apply.",
    "Please review the full policy document for complete details.",
];

const INTERNAL_DISCLAIMERS: &[&str] = &["For internal use only. Do not distribute externally."];

const LEGAL_DISCLAIMERS: &[&str] = &[
    "This document does not constitute legal advice.",
    "Consult with legal counsel before taking action based on this document.",
];

const STRICT_DISCLAIMERS: &[&str] = &[
    "All information is subject to change without notice.",
    "Past performance does not guarantee future results.",
];

/// Restricted-phrase and required-disclaimer checks. Matching is
/// case-insensitive substring matching.
#[derive(Debug, Default, Clone)]
pub struct StaticComplianceRules;

impl StaticComplianceRules {
    pub fn new() -> Self {
        Self
    }
}

impl ComplianceRules for StaticComplianceRules {
    fn check(&self, text: &str, audience: Audience, strict: bool) -> ComplianceReport {
        let lower = text.to_lowercase();
        let mut issues = Vec::new();

        for phrase in RESTRICTED_PHRASES {
            if lower.contains(phrase) {
                issues.push(ComplianceIssue::new(
                    IssueType::RestrictedPhrase,
                    format!("The phrase '{}' is restricted and should be avoided.", phrase),
                    IssueSeverity::Med,
                ));
            }
        }

        let required_disclaimers = self.required_disclaimers(audience, strict);
        let missing_disclaimers: Vec<String> = required_disclaimers
            .iter()
            .filter(|d| !lower.contains(&d.to_lowercase()))
            .cloned()
            .collect();

        let missing_severity = if strict {
            IssueSeverity::High
        } else {
            IssueSeverity::Med
        };
        for disclaimer in &missing_disclaimers {
            issues.push(ComplianceIssue::new(
                IssueType::MissingDisclaimer,
                format!("Required disclaimer missing: '{}'", disclaimer),
                missing_severity,
            ));
        }

        ComplianceReport {
            issues,
            required_disclaimers,
            missing_disclaimers,
        }
    }

    fn required_disclaimers(&self, audience: Audience, strict: bool) -> Vec<String> {
        let base = match audience {
            Audience::Customer => CUSTOMER_DISCLAIMERS,
            Audience::Internal => INTERNAL_DISCLAIMERS,
            Audience::Legal => LEGAL_DISCLAIMERS,
        };

        let extra: &[&str] = if strict { STRICT_DISCLAIMERS } else { &[] };

        base.iter()
            .chain(extra.iter())
            .map(|d| d.to_string())
            .collect()
    }

    fn restricted_phrases(&self) -> Vec<String> {
        RESTRICTED_PHRASES.iter().map(|p| p.to_string()).collect()
    }
}
