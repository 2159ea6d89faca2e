//! Sign/encrypt pass over the assembled content part.
//!
//! Crypto itself is delegated to an external [`CipherContext`]
//! capability (a GPG or S/MIME engine). This module owns the part
//! restructuring and the ordering contract: when both signing and
//! encryption are requested, the content is signed first and the signed
//! envelope is then encrypted. For S/MIME the sign step additionally
//! switches to enveloped-sign mode so the result is compatible with
//! clients that cannot verify a signature inside an encrypted blob.

use crate::identity::Identity;
use mailquill_mime::Part;
use std::collections::HashMap;
use std::sync::Arc;

/// Result type alias for cipher operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Errors reported by the sign/encrypt pass.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Signing requested but the identity has no signing certificate.
    #[error("Cannot sign outgoing message: no signing certificate set for this account")]
    NoSigningCertificate,

    /// Encryption requested but the identity has no encryption
    /// certificate.
    #[error("Cannot encrypt outgoing message: no encryption certificate set for this account")]
    NoEncryptionCertificate,

    /// No key or certificate found for a recipient. Recoverable: the
    /// caller may offer to send without encryption.
    #[error("No key or certificate found for recipient {recipient}")]
    KeyNotFound {
        /// The recipient address that could not be resolved.
        recipient: String,
    },

    /// The external cipher reported a failure.
    #[error("Cipher error: {0}")]
    Cipher(String),
}

impl CryptoError {
    /// Whether the failure offers a recovery action instead of aborting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

/// Signing hash algorithm, from the identity configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// Let the cipher pick.
    #[default]
    Default,
    /// SHA-1 (legacy).
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Parses the configuration string form ("sha256", ...).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sha1" | "sha-1" => Self::Sha1,
            "sha256" | "sha-256" => Self::Sha256,
            "sha512" | "sha-512" => Self::Sha512,
            _ => Self::Default,
        }
    }
}

/// How the signature is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    /// Detached signature next to cleartext content.
    Clear,
    /// Signature enveloped with the content (S/MIME sign+encrypt).
    Enveloped,
}

/// A signing request handed to the cipher capability.
#[derive(Debug)]
pub struct SignRequest<'a> {
    /// Key or certificate identifier.
    pub key_id: &'a str,
    /// Hash algorithm.
    pub hash: HashAlgorithm,
    /// Clear or enveloped signing.
    pub mode: SignMode,
    /// Trust keys without explicit validity (PGP).
    pub always_trust: bool,
    /// Prefer inline PGP over PGP/MIME.
    pub prefer_inline: bool,
    /// The content part to sign.
    pub part: &'a Part,
}

/// An encryption request handed to the cipher capability.
#[derive(Debug)]
pub struct EncryptRequest<'a> {
    /// Key identifier of the sender, when the protocol wants one.
    pub key_id: Option<&'a str>,
    /// Recipient key/certificate identifiers.
    pub recipients: &'a [String],
    /// Trust keys without explicit validity (PGP).
    pub always_trust: bool,
    /// Prefer inline PGP over PGP/MIME.
    pub prefer_inline: bool,
    /// Allow keyserver lookup for missing keys (PGP).
    pub locate_keys: bool,
    /// The content part to encrypt.
    pub part: &'a Part,
}

/// External cipher capability (PGP or S/MIME engine).
///
/// `sign` returns a replacement part wrapping the content (typically
/// `multipart/signed` with a detached signature); `encrypt` returns an
/// opaque encrypted part (`multipart/encrypted` or
/// `application/pkcs7-mime`) that replaces the content wholesale.
pub trait CipherContext: Send + Sync {
    /// Signs a content part.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is unusable or the engine fails.
    fn sign(&self, request: &SignRequest<'_>) -> CryptoResult<Part>;

    /// Encrypts a content part to the given recipients.
    ///
    /// # Errors
    ///
    /// Returns an error when a recipient key is missing or the engine
    /// fails.
    fn encrypt(&self, request: &EncryptRequest<'_>) -> CryptoResult<Part>;
}

/// External lookup of recipient encryption certificates, keyed by email
/// address (e.g. an address book or keyserver query).
pub trait RecipientCertificateResolver: Send + Sync {
    /// Returns the certificate identifier for an address, if known.
    fn certificate_for(&self, address: &str) -> Option<String>;
}

/// The sign/encrypt pass. Owns copies of everything it needs so it can
/// run on a blocking worker without touching composer state.
pub struct SignEncryptPass {
    pub(crate) identity: Identity,
    pub(crate) is_draft: bool,
    pub(crate) pgp_sign: bool,
    pub(crate) pgp_encrypt: bool,
    pub(crate) smime_sign: bool,
    pub(crate) smime_encrypt: bool,
    pub(crate) recipients: Vec<String>,
    /// Certificates collected from recipient autocomplete; consulted
    /// before the resolver.
    pub(crate) cached_certificates: HashMap<String, String>,
    pub(crate) pgp_cipher: Option<Arc<dyn CipherContext>>,
    pub(crate) smime_cipher: Option<Arc<dyn CipherContext>>,
    pub(crate) resolver: Option<Arc<dyn RecipientCertificateResolver>>,
}

impl SignEncryptPass {
    /// Runs the pass, returning the replacement top-level part.
    ///
    /// # Errors
    ///
    /// Propagates cipher failures; certificate-configuration errors are
    /// raised before any crypto runs.
    pub fn apply(&self, part: Part) -> CryptoResult<Part> {
        let part = self.apply_pgp(part)?;
        self.apply_smime(part)
    }

    fn apply_pgp(&self, part: Part) -> CryptoResult<Part> {
        if !self.pgp_sign && !self.pgp_encrypt {
            return Ok(part);
        }

        let cipher = self
            .pgp_cipher
            .as_ref()
            .ok_or_else(|| CryptoError::Cipher("No PGP cipher available".to_string()))?;

        let settings = &self.identity.openpgp;
        let key_id = self.identity.pgp_key_id();
        let mut part = part;

        if self.pgp_sign {
            part = cipher.sign(&SignRequest {
                key_id,
                hash: settings.signing_algorithm,
                mode: SignMode::Clear,
                always_trust: settings.always_trust,
                prefer_inline: settings.prefer_inline,
                part: &part,
            })?;
        }

        if self.pgp_encrypt {
            // Drafts are always encrypted to self so they stay readable.
            let encrypt_to_self = self.is_draft || settings.encrypt_to_self;
            let mut recipients = self.recipients.clone();
            if encrypt_to_self {
                recipients.push(key_id.to_string());
            }

            part = cipher.encrypt(&EncryptRequest {
                key_id: Some(key_id),
                recipients: &recipients,
                always_trust: settings.always_trust,
                prefer_inline: settings.prefer_inline,
                locate_keys: settings.locate_keys,
                part: &part,
            })?;
        }

        Ok(part)
    }

    fn apply_smime(&self, part: Part) -> CryptoResult<Part> {
        if !self.smime_sign && !self.smime_encrypt {
            return Ok(part);
        }

        let cipher = self
            .smime_cipher
            .as_ref()
            .ok_or_else(|| CryptoError::Cipher("No S/MIME cipher available".to_string()))?;

        let settings = &self.identity.smime;

        let signing_certificate = settings
            .signing_certificate
            .as_deref()
            .filter(|c| !c.is_empty());
        let encryption_certificate = settings
            .encryption_certificate
            .as_deref()
            .filter(|c| !c.is_empty());

        // Configuration errors are raised before any crypto runs.
        if self.smime_sign && signing_certificate.is_none() {
            return Err(CryptoError::NoSigningCertificate);
        }
        if self.smime_encrypt && encryption_certificate.is_none() {
            return Err(CryptoError::NoEncryptionCertificate);
        }

        let mut part = part;

        if self.smime_sign {
            // When also encrypting, envelope-sign rather than clear-sign.
            let mode = if self.smime_encrypt {
                SignMode::Enveloped
            } else {
                SignMode::Clear
            };

            let key_id = signing_certificate.unwrap_or_default();
            part = cipher.sign(&SignRequest {
                key_id,
                hash: settings.signing_algorithm,
                mode,
                always_trust: false,
                prefer_inline: false,
                part: &part,
            })?;
        }

        if self.smime_encrypt {
            let own_certificate = encryption_certificate.unwrap_or_default();
            let encrypt_to_self = self.is_draft || settings.encrypt_to_self;

            let mut certificates = Vec::with_capacity(self.recipients.len() + 1);
            for recipient in &self.recipients {
                certificates.push(self.resolve_certificate(recipient)?);
            }
            if encrypt_to_self {
                certificates.push(own_certificate.to_string());
            }

            // The encrypted part replaces the whole content wholesale.
            part = cipher.encrypt(&EncryptRequest {
                key_id: None,
                recipients: &certificates,
                always_trust: false,
                prefer_inline: false,
                locate_keys: false,
                part: &part,
            })?;
        }

        Ok(part)
    }

    /// Resolves a recipient's encryption certificate: locally cached
    /// autocomplete results first, then the external resolver.
    fn resolve_certificate(&self, address: &str) -> CryptoResult<String> {
        if let Some(certificate) = self.cached_certificates.get(&address.to_lowercase()) {
            return Ok(certificate.clone());
        }
        if let Some(resolver) = &self.resolver {
            if let Some(certificate) = resolver.certificate_for(address) {
                return Ok(certificate);
            }
        }
        Err(CryptoError::KeyNotFound {
            recipient: address.to_string(),
        })
    }
}
