//! The message assembly pipeline.
//!
//! `Composer::build_message` turns the draft plus a set of flags into
//! one well-formed MIME message:
//!
//! 1. Build the text/plain part, picking charset and transfer encoding.
//! 2. In HTML mode, wrap plain and HTML in multipart/alternative with
//!    the plain part strictly first.
//! 3. With inline images, wrap the alternative in multipart/related.
//! 4. With attachments, wrap everything in multipart/mixed.
//! 5. Run the sign/encrypt pass on a blocking worker when requested.
//! 6. Finalize the envelope headers and attach the content part.
//!
//! Exactly one message is produced per call; any failure before the
//! final step returns an error and no message.

use crate::attachment::Attachment;
use crate::cache::ContentCache;
use crate::crypto::{CipherContext, RecipientCertificateResolver, SignEncryptPass};
use crate::editor::{ContentEditor, EditorContent};
use crate::error::{Error, Result};
use crate::header_table::HeaderTable;
use crate::identity::Identity;
use mailquill_mime::charset::best_charset;
use mailquill_mime::{ContentType, Headers, Message, Part, TransferEncoding, generate_message_id};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Flags controlling one build.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposerFlags {
    /// Include the HTML body variant.
    pub html_content: bool,
    /// Sign with PGP. Ignored when saving a draft.
    pub pgp_sign: bool,
    /// Encrypt with PGP.
    pub pgp_encrypt: bool,
    /// Sign with S/MIME. Ignored when saving a draft.
    pub smime_sign: bool,
    /// Encrypt with S/MIME.
    pub smime_encrypt: bool,
    /// Build for the drafts folder rather than for sending.
    pub save_draft: bool,
    /// Request a read receipt (Disposition-Notification-To).
    pub request_receipt: bool,
    /// Mark the message as high priority (X-Priority: 1).
    pub prioritize: bool,
    /// Request a delivery status notification.
    pub request_dsn: bool,
}

impl ComposerFlags {
    /// Effective PGP signing: drafts are never signed.
    #[must_use]
    pub const fn pgp_sign_effective(&self) -> bool {
        self.pgp_sign && !self.save_draft
    }

    /// Effective S/MIME signing: drafts are never signed.
    #[must_use]
    pub const fn smime_sign_effective(&self) -> bool {
        self.smime_sign && !self.save_draft
    }

    /// Whether the sign/encrypt pass must run.
    #[must_use]
    pub const fn needs_crypto(&self) -> bool {
        self.pgp_sign_effective()
            || self.pgp_encrypt
            || self.smime_sign_effective()
            || self.smime_encrypt
    }
}

/// One composer session: draft state plus the external capabilities
/// needed to assemble an outgoing message.
pub struct Composer {
    identity: Identity,
    /// Header state, mutated by the UI as the user edits.
    pub header_table: HeaderTable,
    attachments: Vec<Attachment>,
    alternative_body: Option<Attachment>,
    charset: Option<String>,
    editor: Arc<dyn ContentEditor>,
    cache: ContentCache,
    pgp_cipher: Option<Arc<dyn CipherContext>>,
    smime_cipher: Option<Arc<dyn CipherContext>>,
    resolver: Option<Arc<dyn RecipientCertificateResolver>>,
    cached_certificates: HashMap<String, String>,
}

impl Composer {
    /// Creates a composer for the given identity and content editor.
    #[must_use]
    pub fn new(identity: Identity, editor: Arc<dyn ContentEditor>) -> Self {
        let mut header_table = HeaderTable::new();
        header_table.set_identity(&identity);
        Self {
            identity,
            header_table,
            attachments: Vec::new(),
            alternative_body: None,
            charset: None,
            editor,
            cache: ContentCache::new(),
            pgp_cipher: None,
            smime_cipher: None,
            resolver: None,
            cached_certificates: HashMap::new(),
        }
    }

    /// Switches the From identity, recomputing auto-generated
    /// destinations.
    pub fn set_identity(&mut self, identity: Identity) {
        self.header_table.set_identity(&identity);
        self.identity = identity;
    }

    /// The current identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sets the user-configured charset for this message.
    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = Some(charset.into());
    }

    /// Adds a regular attachment.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Sets an "alternative body" attachment, folded into the
    /// multipart/alternative instead of the attachment list.
    pub fn set_alternative_body(&mut self, attachment: Attachment) {
        self.alternative_body = Some(attachment);
    }

    /// Installs the PGP cipher capability.
    pub fn set_pgp_cipher(&mut self, cipher: Arc<dyn CipherContext>) {
        self.pgp_cipher = Some(cipher);
    }

    /// Installs the S/MIME cipher capability.
    pub fn set_smime_cipher(&mut self, cipher: Arc<dyn CipherContext>) {
        self.smime_cipher = Some(cipher);
    }

    /// Installs the external recipient-certificate resolver.
    pub fn set_certificate_resolver(&mut self, resolver: Arc<dyn RecipientCertificateResolver>) {
        self.resolver = Some(resolver);
    }

    /// Caches a recipient certificate from autocomplete results; the
    /// sign/encrypt pass consults these before the resolver.
    pub fn cache_recipient_certificate(
        &mut self,
        address: impl Into<String>,
        certificate: impl Into<String>,
    ) {
        self.cached_certificates
            .insert(address.into().to_lowercase(), certificate.into());
    }

    /// Builds the outgoing message.
    ///
    /// Concurrent calls share one editor fetch through the content
    /// cache. The sign/encrypt pass runs on a blocking worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the token fires, a
    /// content-fetch error when a required body variant is missing, or
    /// a crypto error from the sign/encrypt pass.
    pub async fn build_message(
        &self,
        flags: ComposerFlags,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let lease = self.cache.acquire(self.editor.as_ref(), cancel).await?;
        let content = lease.content();

        let mut fetch_error = None;
        let top_level_part = self.assemble_content(content, flags, &mut fetch_error);

        // Body retrieval degrades to an empty string, but the failure
        // still aborts the build before any headers are finalized.
        if let Some(message) = fetch_error {
            return Err(Error::ContentFetch(message));
        }

        let top_level_part = if flags.needs_crypto() {
            self.run_crypto_pass(flags, top_level_part, cancel).await?
        } else {
            top_level_part
        };

        let headers = self.finalize_headers(flags)?;
        Ok(Message::new(headers, top_level_part))
    }

    /// Steps 1-4: body parts and multipart wrapping. Synchronous; no
    /// partial state escapes.
    fn assemble_content(
        &self,
        content: &EditorContent,
        flags: ComposerFlags,
        fetch_error: &mut Option<String>,
    ) -> Part {
        let plain_text = content.to_send_plain.clone().unwrap_or_else(|| {
            warn!("failed to retrieve text/plain processed content");
            *fetch_error = Some("missing text/plain processed content".to_string());
            String::new()
        });
        let plain_text = ensure_trailing_newline(plain_text);

        let (charset, plain_encoding) = best_charset(plain_text.as_bytes(), self.charset.as_deref());
        let mut plain_type = ContentType::text_plain();
        if let Some(charset) = charset {
            plain_type.set_parameter("charset", charset);
        }
        let plain_part = Part::text(plain_type, plain_text, plain_encoding);

        let mut top_level_part = plain_part.clone();

        if flags.html_content || flags.save_draft {
            let html_text = if flags.save_draft {
                content.raw_draft.clone()
            } else {
                content.to_send_html.clone()
            };
            let html_text = html_text.unwrap_or_else(|| {
                warn!("failed to retrieve text/html processed content");
                if fetch_error.is_none() {
                    *fetch_error = Some("missing text/html processed content".to_string());
                }
                String::new()
            });
            let html_text = ensure_trailing_newline(html_text);

            // HTML is always quoted-printable, which also covers the
            // "From " hazard that would otherwise corrupt mbox storage.
            let html_part = Part::text(
                ContentType::text_html(),
                html_text,
                TransferEncoding::QuotedPrintable,
            );

            // The plain part always precedes the HTML part; mail
            // clients render the last part they understand.
            let mut alternatives = vec![plain_part, html_part];
            if let Some(alternative_body) = &self.alternative_body {
                alternatives.push(alternative_body.to_part());
            }
            let alternative = Part::multipart_alternative(alternatives);

            top_level_part = if content.inline_images.is_empty() {
                alternative
            } else {
                let mut children = vec![alternative];
                for image in &content.inline_images {
                    children.push(Part::inline_image(
                        image.data.clone(),
                        &image.mime_type,
                        &image.content_id,
                        image.filename.as_deref(),
                    ));
                }
                Part::multipart_related("multipart/alternative", children)
            };
        } else if let Some(alternative_body) = &self.alternative_body {
            top_level_part =
                Part::multipart_alternative(vec![plain_part, alternative_body.to_part()]);
        }

        if !self.attachments.is_empty() {
            let mut children = vec![top_level_part];
            for attachment in &self.attachments {
                children.push(attachment.to_part());
            }
            top_level_part = Part::multipart_mixed(children);
        }

        top_level_part
    }

    /// Step 5: dispatch the sign/encrypt pass to a blocking worker.
    async fn run_crypto_pass(
        &self,
        flags: ComposerFlags,
        part: Part,
        cancel: &CancellationToken,
    ) -> Result<Part> {
        let pass = SignEncryptPass {
            identity: self.identity.clone(),
            is_draft: flags.save_draft,
            pgp_sign: flags.pgp_sign_effective(),
            pgp_encrypt: flags.pgp_encrypt,
            smime_sign: flags.smime_sign_effective(),
            smime_encrypt: flags.smime_encrypt,
            recipients: self.header_table.recipient_addresses(),
            cached_certificates: self.cached_certificates.clone(),
            pgp_cipher: self.pgp_cipher.clone(),
            smime_cipher: self.smime_cipher.clone(),
            resolver: self.resolver.clone(),
        };

        let task = tokio::task::spawn_blocking(move || pass.apply(part));
        let result = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = task => result,
        };
        Ok(result.map_err(|e| Error::TaskJoin(e.to_string()))??)
    }

    /// Step 6: envelope headers.
    fn finalize_headers(&self, flags: ComposerFlags) -> Result<Headers> {
        let table = &self.header_table;
        let mut headers = Headers::new();

        headers.set(
            "Message-ID",
            generate_message_id(self.identity.address_domain()),
        );
        headers.set("Date", chrono::Utc::now().to_rfc2822());
        headers.set("From", self.identity.from_header());

        let reply_to = table
            .reply_to
            .as_deref()
            .or(self.identity.reply_to.as_deref());
        if let Some(reply_to) = reply_to {
            headers.set("Reply-To", reply_to);
        }

        if let Some(to) = table.to.header_value() {
            headers.set("To", to);
        }
        if let Some(cc) = table.cc.header_value() {
            headers.set("Cc", cc);
        }
        if let Some(bcc) = table.bcc.header_value() {
            headers.set("Bcc", bcc);
        }

        headers.set("Subject", Headers::encode_value(&table.subject)?);

        if let Some(organization) = self.identity.organization.as_deref() {
            if !organization.is_empty() {
                headers.set("Organization", Headers::encode_value(organization)?);
            }
        }

        headers.set("X-Evolution-Identity", self.identity.uid.clone());
        for folder in &table.post_to {
            headers.add("X-Evolution-PostTo", folder.clone());
        }

        if flags.request_receipt {
            headers.set("Disposition-Notification-To", self.identity.from_header());
        }
        if flags.prioritize {
            headers.add("X-Priority", "1");
        }
        if flags.request_dsn {
            headers.add("X-Evolution-Request-DSN", "1");
        }

        if flags.save_draft {
            let format = if flags.html_content {
                "text/html"
            } else {
                "text/plain"
            };
            headers.set("X-Evolution-Format", format);
            headers.set("X-Evolution-Composer-Mode", format);
        }

        for (name, value) in &table.custom_headers {
            headers.add(name.clone(), value.clone());
        }

        Ok(headers)
    }
}

/// Bodies must end with a line break before encoding.
fn ensure_trailing_newline(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push_str("\r\n");
    }
    text
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crypto::{CryptoResult, EncryptRequest, SignRequest};
    use crate::editor::InlineImage;
    use async_trait::async_trait;

    struct StubEditor {
        content: EditorContent,
    }

    impl StubEditor {
        fn plain(text: &str) -> Self {
            Self {
                content: EditorContent {
                    to_send_plain: Some(text.to_string()),
                    to_send_html: None,
                    raw_draft: None,
                    inline_images: Vec::new(),
                },
            }
        }

        fn html(plain: &str, html: &str) -> Self {
            Self {
                content: EditorContent {
                    to_send_plain: Some(plain.to_string()),
                    to_send_html: Some(html.to_string()),
                    raw_draft: Some(html.to_string()),
                    inline_images: Vec::new(),
                },
            }
        }
    }

    #[async_trait]
    impl ContentEditor for StubEditor {
        async fn content(
            &self,
            _cancel: &CancellationToken,
        ) -> std::result::Result<EditorContent, String> {
            Ok(self.content.clone())
        }
    }

    fn composer_with(editor: StubEditor) -> Composer {
        let mut composer = Composer::new(
            Identity::new("id1", "Alice", "alice@example.com"),
            Arc::new(editor),
        );
        composer
            .header_table
            .to
            .push(crate::Destination::user(Some("Bob"), "bob@example.com"));
        composer.header_table.subject = "Greetings".to_string();
        composer
    }

    #[tokio::test]
    async fn test_ascii_body_is_seven_bit_without_charset() {
        let composer = composer_with(StubEditor::plain("plain ascii body\r\n"));
        let message = composer
            .build_message(ComposerFlags::default(), &CancellationToken::new())
            .await
            .unwrap();

        let ct = message.body.content_type().unwrap();
        assert!(ct.is("text", "plain"));
        assert!(ct.charset().is_none());
        assert_eq!(message.body.transfer_encoding(), TransferEncoding::SevenBit);
    }

    #[tokio::test]
    async fn test_from_line_body_is_quoted_printable() {
        let composer = composer_with(StubEditor::plain("From the beginning\r\n"));
        let message = composer
            .build_message(ComposerFlags::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            message.body.transfer_encoding(),
            TransferEncoding::QuotedPrintable
        );
    }

    #[tokio::test]
    async fn test_html_mode_orders_plain_before_html() {
        let composer = composer_with(StubEditor::html("plain\r\n", "<b>html</b>\r\n"));
        let flags = ComposerFlags {
            html_content: true,
            ..ComposerFlags::default()
        };
        let message = composer
            .build_message(flags, &CancellationToken::new())
            .await
            .unwrap();

        let ct = message.body.content_type().unwrap();
        assert!(ct.is("multipart", "alternative"));

        let children = message.body.children();
        assert_eq!(children.len(), 2);
        assert!(children[0].content_type().unwrap().is("text", "plain"));
        assert!(children[1].content_type().unwrap().is("text", "html"));
    }

    #[tokio::test]
    async fn test_inline_images_wrap_in_related() {
        let mut editor = StubEditor::html("plain\r\n", "<img src=\"cid:img1\">\r\n");
        editor.content.inline_images.push(InlineImage {
            data: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
            content_id: "img1".to_string(),
            filename: None,
        });
        let composer = composer_with(editor);
        let flags = ComposerFlags {
            html_content: true,
            ..ComposerFlags::default()
        };
        let message = composer
            .build_message(flags, &CancellationToken::new())
            .await
            .unwrap();

        let ct = message.body.content_type().unwrap();
        assert!(ct.is("multipart", "related"));
        assert_eq!(ct.parameter("type"), Some("multipart/alternative"));

        let children = message.body.children();
        assert_eq!(children.len(), 2);
        assert!(
            children[0]
                .content_type()
                .unwrap()
                .is("multipart", "alternative")
        );
        assert_eq!(children[1].headers.get("Content-ID"), Some("<img1>"));
    }

    #[tokio::test]
    async fn test_attachments_wrap_in_mixed() {
        let mut composer = composer_with(StubEditor::plain("body\r\n"));
        composer.add_attachment(Attachment::new(
            "doc.pdf",
            "application/pdf",
            vec![0xFF; 16],
        ));
        let message = composer
            .build_message(ComposerFlags::default(), &CancellationToken::new())
            .await
            .unwrap();

        let ct = message.body.content_type().unwrap();
        assert!(ct.is("multipart", "mixed"));

        let children = message.body.children();
        assert_eq!(children.len(), 2);
        assert!(children[0].content_type().unwrap().is("text", "plain"));
        assert!(children[1].content_type().unwrap().is("application", "pdf"));
    }

    #[tokio::test]
    async fn test_missing_plain_content_aborts() {
        let editor = StubEditor {
            content: EditorContent::default(),
        };
        let composer = composer_with(editor);
        let err = composer
            .build_message(ComposerFlags::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentFetch(_)));
    }

    #[tokio::test]
    async fn test_cancellation_before_fetch() {
        let composer = composer_with(StubEditor::plain("body\r\n"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = composer
            .build_message(ComposerFlags::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_envelope_headers() {
        let composer = composer_with(StubEditor::plain("body\r\n"));
        let flags = ComposerFlags {
            prioritize: true,
            request_dsn: true,
            ..ComposerFlags::default()
        };
        let message = composer
            .build_message(flags, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            message.from(),
            Some("\"Alice\" <alice@example.com>")
        );
        assert_eq!(message.to(), Some("\"Bob\" <bob@example.com>"));
        assert_eq!(message.subject(), Some("Greetings"));
        assert!(message.message_id().unwrap().ends_with("@example.com>"));
        assert_eq!(
            message.headers.get("X-Evolution-Identity"),
            Some("id1")
        );
        assert_eq!(message.headers.get("X-Priority"), Some("1"));
        assert_eq!(message.headers.get("X-Evolution-Request-DSN"), Some("1"));
    }

    #[tokio::test]
    async fn test_draft_carries_format_headers() {
        let composer = composer_with(StubEditor::html("plain\r\n", "<p>draft</p>\r\n"));
        let flags = ComposerFlags {
            html_content: true,
            save_draft: true,
            ..ComposerFlags::default()
        };
        let message = composer
            .build_message(flags, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(message.headers.get("X-Evolution-Format"), Some("text/html"));
        assert_eq!(
            message.headers.get("X-Evolution-Composer-Mode"),
            Some("text/html")
        );
    }

    /// Cipher that wraps sign requests in multipart/signed and records
    /// nothing else.
    struct WrapCipher;

    impl CipherContext for WrapCipher {
        fn sign(&self, request: &SignRequest<'_>) -> CryptoResult<Part> {
            let signature = Part::new(Headers::new(), b"SIG".to_vec());
            Ok(Part::multipart_signed(
                "application/pgp-signature",
                "pgp-sha256",
                request.part.clone(),
                signature,
            ))
        }

        fn encrypt(&self, request: &EncryptRequest<'_>) -> CryptoResult<Part> {
            let version = Part::new(Headers::new(), b"Version: 1".to_vec());
            let payload = Part::new(Headers::new(), b"PGP".to_vec());
            let _ = request;
            Ok(Part::multipart_encrypted(
                "application/pgp-encrypted",
                version,
                payload,
            ))
        }
    }

    #[tokio::test]
    async fn test_pgp_sign_replaces_top_level_part() {
        let mut composer = composer_with(StubEditor::plain("body\r\n"));
        composer.set_pgp_cipher(Arc::new(WrapCipher));
        let flags = ComposerFlags {
            pgp_sign: true,
            ..ComposerFlags::default()
        };
        let message = composer
            .build_message(flags, &CancellationToken::new())
            .await
            .unwrap();

        let ct = message.body.content_type().unwrap();
        assert!(ct.is("multipart", "signed"));
        assert_eq!(ct.parameter("protocol"), Some("application/pgp-signature"));
    }

    #[tokio::test]
    async fn test_draft_skips_signing_but_keeps_encryption() {
        let flags = ComposerFlags {
            pgp_sign: true,
            pgp_encrypt: true,
            save_draft: true,
            ..ComposerFlags::default()
        };
        assert!(!flags.pgp_sign_effective());
        assert!(flags.needs_crypto());

        let mut composer = composer_with(StubEditor::plain("body\r\n"));
        composer.set_pgp_cipher(Arc::new(WrapCipher));
        let message = composer
            .build_message(flags, &CancellationToken::new())
            .await
            .unwrap();

        let ct = message.body.content_type().unwrap();
        assert!(ct.is("multipart", "encrypted"));
    }
}
