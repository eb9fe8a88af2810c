use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

use crate::domain::workflow::Audience;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Low,
    #[serde(alias = "medium")]
    Med,
    High,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Med => write!(f, "med"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    RestrictedPhrase,
    MissingDisclaimer,
    Ambiguous,
    LegalRisk,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub detail: String,
    pub severity: IssueSeverity,
}

impl ComplianceIssue {
    pub fn new(issue_type: IssueType, detail: impl Into<String>, severity: IssueSeverity) -> Self {
        Self {
            issue_type,
            detail: detail.into(),
            severity,
        }
    }
}

/// Result of a deterministic rules check
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComplianceReport {
    pub issues: Vec<ComplianceIssue>,
    pub required_disclaimers: Vec<String>,
    pub missing_disclaimers: Vec<String>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Deterministic compliance rules applied before the LLM review
pub trait ComplianceRules: Send + Sync + Debug {
    fn check(&self, text: &str, audience: Audience, strict: bool) -> ComplianceReport;

    fn required_disclaimers(&self, audience: Audience, strict: bool) -> Vec<String>;

    fn restricted_phrases(&self) -> Vec<String>;
}
