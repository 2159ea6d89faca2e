//! # mailquill-compose
//!
//! Outgoing-message assembly: turns a draft (body variants, recipients,
//! attachments, inline images) plus composer flags into a single
//! well-formed MIME message.
//!
//! This crate provides:
//! - The assembly pipeline: charset/encoding selection,
//!   multipart/alternative and multipart/related construction,
//!   attachment wrapping
//! - The sign/encrypt pass: PGP and S/MIME through an external
//!   [`CipherContext`] capability, with the sign-then-encrypt ordering
//!   contract
//! - Composer state: identities, destination lists, the header table
//! - The async content-editor capability and a shared content cache so
//!   concurrent build requests issue a single editor fetch

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod builder;
mod cache;
pub mod crypto;
mod destination;
mod editor;
mod error;
mod header_table;
mod identity;

pub use attachment::Attachment;
pub use builder::{Composer, ComposerFlags};
pub use cache::{ContentCache, ContentLease};
pub use crypto::{
    CipherContext, CryptoError, EncryptRequest, HashAlgorithm, RecipientCertificateResolver,
    SignMode, SignRequest,
};
pub use destination::{Destination, DestinationList};
pub use editor::{ContentEditor, EditorContent, InlineImage};
pub use error::{Error, Result};
pub use header_table::HeaderTable;
pub use identity::{Identity, IdentityRegistry, OpenPgpSettings, SmimeSettings};
