//! MIME part trees.
//!
//! A [`Part`] is a set of headers plus either raw content bytes or an
//! ordered list of child parts. The composer builds nested structures
//! such as:
//!
//! ```text
//! multipart/related
//!     multipart/alternative
//!         text/plain
//!         text/html
//!     image/png
//!     image/jpeg
//! ```

use crate::content_type::ContentType;
use crate::encoding::{TransferEncoding, encode_base64_wrapped, encode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use uuid::Uuid;

/// Generates a fresh multipart boundary.
#[must_use]
pub fn generate_boundary() -> String {
    format!("=-{}", Uuid::new_v4().simple())
}

/// Generates a Message-ID local to `domain`.
#[must_use]
pub fn generate_message_id(domain: &str) -> String {
    format!("<{}@{domain}>", Uuid::new_v4().simple())
}

/// Content of a MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw, unencoded content bytes.
    Data(Vec<u8>),
    /// Ordered child parts of a multipart.
    Multipart(Vec<Part>),
}

/// A MIME part: headers plus content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part content.
    pub body: Body,
}

impl Part {
    /// Creates a part with the given headers and raw content.
    #[must_use]
    pub const fn new(headers: Headers, data: Vec<u8>) -> Self {
        Self {
            headers,
            body: Body::Data(data),
        }
    }

    /// Creates a text part with an explicit transfer encoding.
    #[must_use]
    pub fn text(
        content_type: ContentType,
        text: impl Into<String>,
        encoding: TransferEncoding,
    ) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", content_type.to_string());
        headers.set("Content-Transfer-Encoding", encoding.to_string());
        Self::new(headers, text.into().into_bytes())
    }

    /// Creates an inline image part keyed by content-id.
    #[must_use]
    pub fn inline_image(
        data: Vec<u8>,
        mime_type: &str,
        content_id: &str,
        filename: Option<&str>,
    ) -> Self {
        let mut headers = Headers::new();
        match filename {
            Some(name) => {
                headers.set("Content-Type", format!("{mime_type}; name=\"{name}\""));
                headers.set(
                    "Content-Disposition",
                    format!("inline; filename=\"{name}\""),
                );
            }
            None => {
                headers.set("Content-Type", mime_type);
                headers.set("Content-Disposition", "inline");
            }
        }
        headers.set("Content-ID", format!("<{content_id}>"));
        headers.set(
            "Content-Transfer-Encoding",
            TransferEncoding::Base64.to_string(),
        );
        Self::new(headers, data)
    }

    /// Creates an attachment part.
    #[must_use]
    pub fn attachment(data: Vec<u8>, mime_type: &str, filename: &str) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", format!("{mime_type}; name=\"{filename}\""));
        headers.set(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        );
        headers.set(
            "Content-Transfer-Encoding",
            TransferEncoding::Base64.to_string(),
        );
        Self::new(headers, data)
    }

    /// Creates a multipart part from a content type carrying a boundary.
    #[must_use]
    pub fn multipart(content_type: ContentType, children: Vec<Self>) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", content_type.to_string());
        Self {
            headers,
            body: Body::Multipart(children),
        }
    }

    /// Creates a multipart/alternative with a fresh boundary.
    ///
    /// The caller is responsible for child ordering; the composer always
    /// places the plain part before the HTML part.
    #[must_use]
    pub fn multipart_alternative(children: Vec<Self>) -> Self {
        Self::multipart(
            ContentType::multipart_alternative(generate_boundary()),
            children,
        )
    }

    /// Creates a multipart/related wrapping `inner_type` content.
    #[must_use]
    pub fn multipart_related(inner_type: &str, children: Vec<Self>) -> Self {
        Self::multipart(
            ContentType::multipart_related(inner_type, generate_boundary()),
            children,
        )
    }

    /// Creates a multipart/mixed with a fresh boundary.
    #[must_use]
    pub fn multipart_mixed(children: Vec<Self>) -> Self {
        Self::multipart(ContentType::multipart_mixed(generate_boundary()), children)
    }

    /// Creates a multipart/signed (detached signature) container.
    #[must_use]
    pub fn multipart_signed(protocol: &str, micalg: &str, content: Self, signature: Self) -> Self {
        Self::multipart(
            ContentType::multipart_signed(protocol, micalg, generate_boundary()),
            vec![content, signature],
        )
    }

    /// Creates a multipart/encrypted container with its version and
    /// payload parts.
    #[must_use]
    pub fn multipart_encrypted(protocol: &str, version: Self, payload: Self) -> Self {
        Self::multipart(
            ContentType::multipart_encrypted(protocol, generate_boundary()),
            vec![version, payload],
        )
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Sets the transfer encoding header.
    pub fn set_transfer_encoding(&mut self, encoding: TransferEncoding) {
        self.headers
            .set("Content-Transfer-Encoding", encoding.to_string());
    }

    /// Checks if this is a multipart part.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    /// Returns the child parts of a multipart, or an empty slice.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Multipart(children) => children,
            Body::Data(_) => &[],
        }
    }

    /// Renders the part to wire format (headers, blank line, encoded
    /// body; multiparts framed by their boundary).
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart has no boundary parameter.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_wire(&mut out)?;
        Ok(out)
    }

    fn write_wire(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        match &self.body {
            Body::Data(data) => match self.transfer_encoding() {
                TransferEncoding::Base64 => {
                    out.extend_from_slice(encode_base64_wrapped(data).as_bytes());
                }
                TransferEncoding::QuotedPrintable => {
                    let text = String::from_utf8_lossy(data);
                    out.extend_from_slice(encode_quoted_printable(&text).as_bytes());
                    if !out.ends_with(b"\r\n") {
                        out.extend_from_slice(b"\r\n");
                    }
                }
                _ => {
                    out.extend_from_slice(data);
                    if !data.is_empty() && !out.ends_with(b"\r\n") {
                        out.extend_from_slice(b"\r\n");
                    }
                }
            },
            Body::Multipart(children) => {
                let content_type = self.content_type()?;
                let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
                if children.is_empty() {
                    return Err(Error::InvalidMultipart(
                        "multipart with no child parts".to_string(),
                    ));
                }
                for child in children {
                    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    child.write_wire(out)?;
                }
                out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            }
        }

        Ok(())
    }
}
