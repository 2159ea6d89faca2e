//! Outer message: envelope headers plus a content part tree.

use crate::error::Result;
use crate::header::Headers;
use crate::part::Part;

/// A complete message: envelope headers and a top-level content part.
///
/// Envelope headers (From, To, Subject, ...) live on the message; the
/// content headers (Content-Type, Content-Transfer-Encoding) live on
/// the top-level part, so the two can be composed independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Envelope headers.
    pub headers: Headers,
    /// Top-level content part.
    pub body: Part,
}

impl Message {
    /// Creates a message from envelope headers and a content part.
    #[must_use]
    pub const fn new(headers: Headers, body: Part) -> Self {
        Self { headers, body }
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers.get("to")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Renders the whole message to wire format.
    ///
    /// # Errors
    ///
    /// Returns an error if the content part tree is malformed.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(self.body.to_wire()?.as_slice());
        Ok(out)
    }
}
