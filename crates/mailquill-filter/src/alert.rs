//! User-facing validation alerts.
//!
//! Alerts carry a stable tag (consumed by the UI layer to pick the
//! dialog text) plus an optional detail string. The tags here match the
//! alert identifiers the dialogs key on, so they must not change.

use std::fmt;

/// A validation failure to present to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Stable alert tag, e.g. `filter:no-name`.
    pub tag: &'static str,
    /// Optional detail, e.g. the name of the offending part.
    pub detail: Option<String>,
}

impl Alert {
    /// Rule has no name.
    pub const NO_NAME: &'static str = "filter:no-name";
    /// Rule has no condition parts, or a part is missing its value.
    pub const NO_CONDITION: &'static str = "filter:no-condition";
    /// A rule with the same name already exists.
    pub const BAD_NAME: &'static str = "filter:bad-name-notunique";

    /// Creates an alert with just a tag.
    #[must_use]
    pub const fn new(tag: &'static str) -> Self {
        Self { tag, detail: None }
    }

    /// Creates an alert with a detail string.
    #[must_use]
    pub fn with_detail(tag: &'static str, detail: impl Into<String>) -> Self {
        Self {
            tag,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.tag),
            None => write!(f, "{}", self.tag),
        }
    }
}

impl std::error::Error for Alert {}
