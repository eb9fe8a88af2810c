use std::fmt::Debug;

use crate::domain::workflow::RedactedItem;

/// One span replaced by a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionMatch {
    pub item_type: String,
    /// Pre-redaction value; never persisted
    pub original_value: String,
    pub placeholder: String,
    /// Byte offset of the match in the text it was found in
    pub position: usize,
}

impl RedactionMatch {
    /// Audit form without the original value
    pub fn to_audit(&self) -> RedactedItem {
        RedactedItem::new(&self.item_type, &self.placeholder, self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedactionResult {
    pub redacted_text: String,
    pub items: Vec<RedactionMatch>,
}

impl RedactionResult {
    pub fn audit_items(&self) -> Vec<RedactedItem> {
        self.items.iter().map(RedactionMatch::to_audit).collect()
    }

    pub fn count_of(&self, item_type: &str) -> usize {
        self.items.iter().filter(|i| i.item_type == item_type).count()
    }
}

/// Replaces personal data in raw input before anything is stored
pub trait PiiRedactor: Send + Sync + Debug {
    fn redact(&self, text: &str) -> RedactionResult;
}
