//! # mailquill-mime
//!
//! MIME message model and generation for the mailquill composer.
//!
//! This crate provides:
//!
//! - **Part trees**: nested multipart structures (mixed, alternative,
//!   related, signed, encrypted) with generated boundaries
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header
//!   encoding
//! - **Charset selection**: the composer's charset and transfer-encoding
//!   heuristics (US-ASCII first, then the configured charset, then a
//!   UTF-8 fallback)
//! - **Wire output**: RFC 2045/2046 rendering with CRLF line endings
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailquill_mime::{ContentType, Part, TransferEncoding};
//!
//! let plain = Part::text(ContentType::text_plain(), "Hello, World!\r\n", TransferEncoding::SevenBit);
//! let html = Part::text(ContentType::text_html(), "<b>Hello</b>\r\n", TransferEncoding::QuotedPrintable);
//! let body = Part::multipart_alternative(vec![plain, html]);
//!
//! let wire = body.to_wire()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod charset;
mod content_type;
mod error;
mod header;
mod message;
mod part;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::Message;
pub use part::{Body, Part, generate_boundary, generate_message_id};

pub use encoding::TransferEncoding;
