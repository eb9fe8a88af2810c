//! Bounded snapshots of step input and output

use serde::{Deserialize, Serialize};

/// Default snapshot bound, in characters
pub const DEFAULT_MAX_LENGTH: usize = 50_000;

/// Appended to every truncated snapshot
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Outcome of [`truncate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub text: String,
    pub is_truncated: bool,
    /// Length of the untruncated text, in characters
    pub full_length: usize,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Cap `text` at `max_length` characters, ending a truncated result with
/// [`TRUNCATION_MARKER`].
///
/// Lengths are counted in `char`s so multi-byte text is never split inside a
/// code point. `None` behaves like the empty string. A bound shorter than the
/// marker yields a prefix of the marker.
pub fn truncate<'a>(text: impl Into<Option<&'a str>>, max_length: usize) -> Snapshot {
    let text = text.into().unwrap_or_default();
    let full_length = text.chars().count();

    if full_length <= max_length {
        return Snapshot {
            text: text.to_string(),
            is_truncated: false,
            full_length,
        };
    }

    let marker_length = TRUNCATION_MARKER.chars().count();
    let truncated = if max_length <= marker_length {
        TRUNCATION_MARKER.chars().take(max_length).collect()
    } else {
        let keep = max_length - marker_length;
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(TRUNCATION_MARKER);
        out
    };

    Snapshot {
        text: truncated,
        is_truncated: true,
        full_length,
    }
}
