//! The content-editor capability.
//!
//! The embedded editor owns the draft being typed; the composer asks it
//! asynchronously for the fully-rendered content variants when a
//! message is built or a draft is saved.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// An inline image referenced from the HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Content-ID the HTML references the image by.
    pub content_id: String,
    /// Original filename, if any.
    pub filename: Option<String>,
}

/// The named content variants the editor can serialize.
///
/// A missing variant means the editor failed to produce it; the
/// pipeline degrades to an empty body with a logged warning, then
/// reports the failure after content shaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorContent {
    /// Processed plain text, ready to send.
    pub to_send_plain: Option<String>,
    /// Processed HTML, ready to send.
    pub to_send_html: Option<String>,
    /// Raw editor state for draft round-tripping.
    pub raw_draft: Option<String>,
    /// Inline images referenced from the HTML body.
    pub inline_images: Vec<InlineImage>,
}

/// Async capability for fetching rendered content from the editor.
#[async_trait]
pub trait ContentEditor: Send + Sync {
    /// Serializes the editor state into its content variants.
    ///
    /// # Errors
    ///
    /// Returns a message describing the failure; cancellation is
    /// signalled through the token, not the error.
    async fn content(&self, cancel: &CancellationToken) -> Result<EditorContent, String>;
}
