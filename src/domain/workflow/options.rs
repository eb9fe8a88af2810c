//! Options chosen by the caller when a run is created

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;

/// Who the generated document is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    Customer,
    Internal,
    Legal,
}

impl Audience {
    /// Short description used in writer instructions
    pub fn description(&self) -> &'static str {
        match self {
            Self::Customer => {
                "external customers who may not be familiar with technical or legal jargon"
            }
            Self::Internal => "internal employees who understand company context",
            Self::Legal => "legal professionals who expect precise, formal language",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Internal => "Internal",
            Self::Legal => "Legal",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Audience {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "internal" => Ok(Self::Internal),
            "legal" => Ok(Self::Legal),
            other => Err(WorkflowError::validation(format!(
                "Unknown audience '{}': expected customer, internal or legal",
                other
            ))),
        }
    }
}

/// Voice of the rewritten document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Formal,
}

impl Tone {
    /// Style guidance handed to the rewriter
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Professional => {
                "Professional: clear and authoritative. Use complete sentences, avoid slang and \
                 exclamation marks, and keep a confident but neutral voice."
            }
            Self::Friendly => {
                "Friendly: warm and approachable. Address the reader directly as \"you\", use \
                 contractions where natural, and keep sentences short without becoming casual \
                 about obligations."
            }
            Self::Formal => {
                "Formal: highly structured and official. Avoid contractions, prefer precise \
                 terminology, use numbered sections where helpful, and keep an impersonal voice."
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Professional => "Professional",
            Self::Friendly => "Friendly",
            Self::Formal => "Formal",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Tone {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "professional" => Ok(Self::Professional),
            "friendly" => Ok(Self::Friendly),
            "formal" => Ok(Self::Formal),
            other => Err(WorkflowError::validation(format!(
                "Unknown tone '{}': expected professional, friendly or formal",
                other
            ))),
        }
    }
}

/// Immutable per-run options, serialized onto the run record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOptions {
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub strict_compliance: bool,
}

impl WorkflowOptions {
    pub fn new(audience: Audience, tone: Tone, strict_compliance: bool) -> Self {
        Self {
            audience,
            tone,
            strict_compliance,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        serde_json::from_str(json)
            .map_err(|e| WorkflowError::validation(format!("Invalid options JSON: {}", e)))
    }
}
