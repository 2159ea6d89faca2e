//! Composer attachments.

use mailquill_mime::Part;

/// A file attached to the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename shown to recipients.
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Raw file bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Builds the MIME part for this attachment.
    #[must_use]
    pub fn to_part(&self) -> Part {
        Part::attachment(self.data.clone(), &self.mime_type, &self.filename)
    }
}
