//! Error types for the filter-rule engine.

use crate::alert::Alert;

/// Result type alias for filter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur loading, saving, or compiling filter rules.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// XML parse or write failure.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute in a rule file.
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Rule file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rule file content was not valid UTF-8.
    #[error("Invalid UTF-8 in rule file: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A rule document was structurally invalid.
    #[error("Malformed rule document: {0}")]
    MalformedDocument(String),

    /// A rule failed validation.
    #[error("Rule validation failed: {0}")]
    Validation(#[from] Alert),

    /// A rule was looked up by a name not present in the context.
    #[error("No rule named {name} with source {source_list}")]
    RuleNotFound {
        /// The rule name.
        name: String,
        /// The source list searched.
        source_list: String,
    },
}
