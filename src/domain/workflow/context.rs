//! Mutable payload threaded through the pipeline steps of one run

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;
use super::options::WorkflowOptions;

/// Audit record of one redacted span. The original value never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub placeholder: String,
    pub position: usize,
}

impl RedactedItem {
    pub fn new(item_type: impl Into<String>, placeholder: impl Into<String>, position: usize) -> Self {
        Self {
            item_type: item_type.into(),
            placeholder: placeholder.into(),
            position,
        }
    }
}

/// Intermediate artifacts produced by the steps of a single run.
///
/// Deliberately not `Clone`: use [`WorkflowContext::fork`], which copies the
/// in-memory original input that serialization drops.
#[derive(Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    #[serde(default)]
    pub normalized_input: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_facts_json: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_issues_json: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_rewritten_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_html: Option<String>,

    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(default)]
    pub options: WorkflowOptions,

    #[serde(default)]
    pub redacted_items: Vec<RedactedItem>,

    /// Pre-redaction input; memory only
    #[serde(skip)]
    original_input: Option<String>,
}

impl WorkflowContext {
    pub fn new(normalized_input: impl Into<String>, options: WorkflowOptions) -> Self {
        Self {
            normalized_input: normalized_input.into(),
            options,
            ..Default::default()
        }
    }

    pub fn with_original_input(mut self, original: Option<String>) -> Self {
        self.original_input = original;
        self
    }

    pub fn with_redacted_items(mut self, items: Vec<RedactedItem>) -> Self {
        self.redacted_items = items;
        self
    }

    pub fn original_input(&self) -> Option<&str> {
        self.original_input.as_deref()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Field-by-field copy, including the original input
    pub fn fork(&self) -> Self {
        Self {
            normalized_input: self.normalized_input.clone(),
            extracted_facts_json: self.extracted_facts_json.clone(),
            draft_summary: self.draft_summary.clone(),
            compliance_issues_json: self.compliance_issues_json.clone(),
            compliant_text: self.compliant_text.clone(),
            tone_rewritten_text: self.tone_rewritten_text.clone(),
            final_html: self.final_html.clone(),
            warnings: self.warnings.clone(),
            options: self.options,
            redacted_items: self.redacted_items.clone(),
            original_input: self.original_input.clone(),
        }
    }

    /// Serialized form persisted on step snapshots
    pub fn to_snapshot_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Rebuild a context from a persisted snapshot. The original input is not
    /// recoverable and stays empty.
    pub fn from_snapshot_json(json: &str) -> Result<Self, WorkflowError> {
        serde_json::from_str(json)
            .map_err(|e| WorkflowError::validation(format!("Invalid context snapshot: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::options::{Audience, Tone};

    fn populated() -> WorkflowContext {
        let mut ctx = WorkflowContext::new(
            "My email is [EMAIL_1]",
            WorkflowOptions::new(Audience::Legal, Tone::Formal, true),
        )
        .with_original_input(Some("My email is secret@example.com".to_string()))
        .with_redacted_items(vec![RedactedItem::new("email", "[EMAIL_1]", 12)]);

        ctx.extracted_facts_json = Some(r#"{"entities":[]}"#.to_string());
        ctx.draft_summary = Some("Summary".to_string());
        ctx.add_warning("Input text is very short");
        ctx
    }

    #[test]
    fn test_fork_copies_every_field() {
        let ctx = populated();
        let forked = ctx.fork();

        assert_eq!(forked, ctx);
        assert_eq!(
            forked.original_input(),
            Some("My email is secret@example.com")
        );
    }

    #[test]
    fn test_fork_does_not_alias() {
        let ctx = populated();
        let mut forked = ctx.fork();
        forked.add_warning("only on the fork");
        forked.draft_summary = Some("changed".to_string());

        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.draft_summary.as_deref(), Some("Summary"));
    }

    #[test]
    fn test_snapshot_excludes_original_input() {
        let forked = populated().fork();
        let json = forked.to_snapshot_json();

        assert!(!json.contains("secret@example.com"));
        assert!(!json.to_lowercase().contains("originalinput"));
        assert!(json.contains("[EMAIL_1]"));
        assert!(json.contains("\"normalizedInput\""));
        assert!(json.contains("\"type\": \"email\""));
    }

    #[test]
    fn test_snapshot_omits_unset_fields() {
        let ctx = WorkflowContext::new("text", WorkflowOptions::default());
        let json = ctx.to_snapshot_json();
        assert!(!json.contains("finalHtml"));
        assert!(!json.contains("draftSummary"));
    }

    #[test]
    fn test_snapshot_restore() {
        let ctx = populated();
        let restored = WorkflowContext::from_snapshot_json(&ctx.to_snapshot_json()).unwrap();

        assert_eq!(restored.normalized_input, ctx.normalized_input);
        assert_eq!(restored.draft_summary, ctx.draft_summary);
        assert_eq!(restored.options, ctx.options);
        assert_eq!(restored.redacted_items, ctx.redacted_items);
        assert_eq!(restored.original_input(), None);
    }

    #[test]
    fn test_restore_rejects_truncated_snapshot() {
        let result = WorkflowContext::from_snapshot_json("{\"normalizedInput\": \"abc...[TRUNCATED]");
        assert!(result.is_err());
    }
}
