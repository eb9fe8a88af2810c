//! Regex-based PII redaction

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::compliance::{PiiRedactor, RedactionMatch, RedactionResult};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[\w.-]+@[\w.-]+\.\w{2,}\b").unwrap());

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap()
});

/// Redacts email addresses and North American phone numbers.
///
/// Placeholders are numbered per type in order of appearance
/// (`[EMAIL_1]`, `[PHONE_1]`, ...); repeated values reuse their placeholder.
/// Positions are byte offsets into the original text.
#[derive(Debug, Default, Clone)]
pub struct RegexPiiRedactor;

impl RegexPiiRedactor {
    pub fn new() -> Self {
        Self
    }
}

struct Found<'t> {
    item_type: &'static str,
    label: &'static str,
    start: usize,
    end: usize,
    value: &'t str,
}

impl PiiRedactor for RegexPiiRedactor {
    fn redact(&self, text: &str) -> RedactionResult {
        let mut found: Vec<Found<'_>> = EMAIL_PATTERN
            .find_iter(text)
            .map(|m| Found {
                item_type: "email",
                label: "EMAIL",
                start: m.start(),
                end: m.end(),
                value: m.as_str(),
            })
            .collect();

        // Digits inside an address are not a phone number
        let phones: Vec<Found<'_>> = PHONE_PATTERN
            .find_iter(text)
            .filter(|m| !found.iter().any(|e| m.start() < e.end && e.start < m.end()))
            .map(|m| Found {
                item_type: "phone",
                label: "PHONE",
                start: m.start(),
                end: m.end(),
                value: m.as_str(),
            })
            .collect();
        found.extend(phones);
        found.sort_by_key(|f| f.start);

        let mut redacted = String::with_capacity(text.len());
        let mut items = Vec::with_capacity(found.len());
        let mut placeholders: HashMap<(&str, &str), String> = HashMap::new();
        let mut counters: HashMap<&str, usize> = HashMap::new();
        let mut cursor = 0;

        for f in found {
            let placeholder = placeholders
                .entry((f.item_type, f.value))
                .or_insert_with(|| {
                    let n = counters.entry(f.item_type).or_insert(0);
                    *n += 1;
                    format!("[{}_{}]", f.label, n)
                })
                .clone();

            redacted.push_str(&text[cursor..f.start]);
            redacted.push_str(&placeholder);
            cursor = f.end;

            items.push(RedactionMatch {
                item_type: f.item_type.to_string(),
                original_value: f.value.to_string(),
                placeholder,
                position: f.start,
            });
        }
        redacted.push_str(&text[cursor..]);

        RedactionResult {
            redacted_text: redacted,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_email() {
        let result = RegexPiiRedactor::new().redact("My email is a@b.com, refund my $50 charge");

        assert_eq!(
            result.redacted_text,
            "My email is [EMAIL_1], refund my $50 charge"
        );
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].item_type, "email");
        assert_eq!(result.items[0].original_value, "a@b.com");
        assert_eq!(result.items[0].position, 12);
    }

    #[test]
    fn test_emails_and_phones_numbered_per_type() {
        let text = "Email helpdesk@company.com or call 555-123-4567. \
                    Warranty: warranty@widgets.com, 1-800-555-0199.";
        let result = RegexPiiRedactor::new().redact(text);

        assert_eq!(result.count_of("email"), 2);
        assert_eq!(result.count_of("phone"), 2);
        assert!(result.redacted_text.contains("[EMAIL_1]"));
        assert!(result.redacted_text.contains("[EMAIL_2]"));
        assert!(result.redacted_text.contains("[PHONE_1]"));
        assert!(result.redacted_text.contains("[PHONE_2]"));
        assert!(!result.redacted_text.contains("555-123-4567"));
        assert!(!result.redacted_text.contains("@"));
    }

    #[test]
    fn test_repeated_value_shares_placeholder() {
        let result = RegexPiiRedactor::new().redact("a@b.com then a@b.com again");

        assert_eq!(result.redacted_text, "[EMAIL_1] then [EMAIL_1] again");
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[1].position, 13);
    }

    #[test]
    fn test_phone_formats() {
        for phone in ["(555) 123-4567", "555.123.4567", "+1 555 123 4567"] {
            let result = RegexPiiRedactor::new().redact(&format!("Call {} now", phone));
            assert_eq!(result.count_of("phone"), 1, "format {}", phone);
        }
    }

    #[test]
    fn test_no_pii() {
        let result = RegexPiiRedactor::new().redact("Refund my $50 charge");
        assert_eq!(result.redacted_text, "Refund my $50 charge");
        assert!(result.items.is_empty());

        assert_eq!(RegexPiiRedactor::new().redact(""), RedactionResult::default());
    }

    #[test]
    fn test_audit_items_drop_original_value() {
        let result = RegexPiiRedactor::new().redact("ping me at x@y.org");
        let audit = result.audit_items();

        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].placeholder, "[EMAIL_1]");
        let json = serde_json::to_string(&audit).unwrap();
        assert!(!json.contains("x@y.org"));
    }
}
