//! Turns raw model text into a [`Decision`].
//!
//! Parsing never fails: every field that cannot be read falls back to a
//! fixed default, and the outcome records which fields were defaulted.

use serde::{Deserialize, Serialize};

/// Rating used when no usable `stars:` line is found.
pub const DEFAULT_STARS: f64 = 3.0;

/// Review used when no usable `review:` line is found.
pub const DEFAULT_REVIEW: &str = "No review generated.";

/// Reviews are cut to this many characters.
pub const MAX_REVIEW_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The simulated user's review of one business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub stars: f64,
    pub review: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funny: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cool: Option<u32>,
}

impl Decision {
    /// The sentinel returned when a workflow fails: zero stars, empty review.
    pub fn failed() -> Self {
        Self {
            stars: 0.0,
            review: String::new(),
            useful: None,
            funny: None,
            cool: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.stars == 0.0 && self.review.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parse outcome
// ---------------------------------------------------------------------------

/// Why a field fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    /// There was no model output at all.
    NoInput,
    /// No line carried the field's label.
    MissingLine,
    /// The line was there but its value was unreadable.
    Unreadable,
}

/// Whether a field was read from the text or defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOutcome {
    Parsed,
    Defaulted(DefaultReason),
}

impl FieldOutcome {
    pub fn is_parsed(self) -> bool {
        matches!(self, Self::Parsed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDecision {
    pub decision: Decision,
    pub stars: FieldOutcome,
    pub review: FieldOutcome,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse `stars:` / `review:` lines (and optional `useful:` / `funny:` /
/// `cool:` counts) from model output.
///
/// The first line containing each label, case-insensitively, wins. The value
/// is everything after that line's first colon. Ratings are taken as
/// written; an empty review is kept empty. Reviews are truncated to
/// [`MAX_REVIEW_CHARS`] characters.
pub fn parse_decision(raw: Option<&str>) -> ParsedDecision {
    let Some(text) = raw else {
        return ParsedDecision {
            decision: Decision {
                stars: DEFAULT_STARS,
                review: DEFAULT_REVIEW.to_owned(),
                useful: None,
                funny: None,
                cool: None,
            },
            stars: FieldOutcome::Defaulted(DefaultReason::NoInput),
            review: FieldOutcome::Defaulted(DefaultReason::NoInput),
        };
    };

    let (stars, stars_outcome) = match labelled_value(text, "stars:") {
        None => (DEFAULT_STARS, FieldOutcome::Defaulted(DefaultReason::MissingLine)),
        Some(value) => match value.parse::<f64>() {
            Ok(v) if v.is_finite() => (v, FieldOutcome::Parsed),
            _ => (DEFAULT_STARS, FieldOutcome::Defaulted(DefaultReason::Unreadable)),
        },
    };

    let (review, review_outcome) = match labelled_value(text, "review:") {
        None => (
            DEFAULT_REVIEW.to_owned(),
            FieldOutcome::Defaulted(DefaultReason::MissingLine),
        ),
        Some(value) => (truncate_chars(value, MAX_REVIEW_CHARS), FieldOutcome::Parsed),
    };

    ParsedDecision {
        decision: Decision {
            stars,
            review,
            useful: count(text, "useful:"),
            funny: count(text, "funny:"),
            cool: count(text, "cool:"),
        },
        stars: stars_outcome,
        review: review_outcome,
    }
}

/// Trimmed text after the first colon of the first line containing `label`.
fn labelled_value<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let line = text
        .split('\n')
        .find(|line| line.to_lowercase().contains(label))?;
    let (_, value) = line.split_once(':')?;
    Some(value.trim())
}

fn count(text: &str, label: &str) -> Option<u32> {
    labelled_value(text, label)?.parse().ok()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => text[..byte].to_owned(),
        None => text.to_owned(),
    }
}
