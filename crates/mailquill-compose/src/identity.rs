//! Sending identities and their crypto defaults.

use crate::crypto::HashAlgorithm;

/// OpenPGP defaults for an identity.
#[derive(Debug, Clone, Default)]
pub struct OpenPgpSettings {
    /// Signing/encryption key id; falls back to the From address when
    /// empty.
    pub key_id: Option<String>,
    /// Trust keys without explicit validity.
    pub always_trust: bool,
    /// Also encrypt outgoing mail to the sender's own key.
    pub encrypt_to_self: bool,
    /// Prefer inline PGP over PGP/MIME.
    pub prefer_inline: bool,
    /// Allow the cipher to locate missing keys on a keyserver.
    pub locate_keys: bool,
    /// Signing hash algorithm.
    pub signing_algorithm: HashAlgorithm,
}

/// S/MIME defaults for an identity.
#[derive(Debug, Clone, Default)]
pub struct SmimeSettings {
    /// Signing certificate identifier; signing fails without one.
    pub signing_certificate: Option<String>,
    /// Encryption certificate identifier; encrypting fails without one.
    pub encryption_certificate: Option<String>,
    /// Also encrypt outgoing mail to the sender's own certificate.
    pub encrypt_to_self: bool,
    /// Signing hash algorithm.
    pub signing_algorithm: HashAlgorithm,
}

/// A named sending identity.
///
/// Looked up by UID from the registry; the composer holds a read copy
/// and never mutates it.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Registry UID.
    pub uid: String,
    /// Display name used in the From header.
    pub name: String,
    /// Sending address.
    pub address: String,
    /// Organization header value, if any.
    pub organization: Option<String>,
    /// Default Reply-To address, if any.
    pub reply_to: Option<String>,
    /// Addresses automatically added to Cc for every message.
    pub auto_cc: Vec<String>,
    /// Addresses automatically added to Bcc for every message.
    pub auto_bcc: Vec<String>,
    /// OpenPGP defaults.
    pub openpgp: OpenPgpSettings,
    /// S/MIME defaults.
    pub smime: SmimeSettings,
}

impl Identity {
    /// Creates a minimal identity with the given uid, name, and address.
    #[must_use]
    pub fn new(uid: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            address: address.into(),
            organization: None,
            reply_to: None,
            auto_cc: Vec::new(),
            auto_bcc: Vec::new(),
            openpgp: OpenPgpSettings::default(),
            smime: SmimeSettings::default(),
        }
    }

    /// The From header value: `"Name" <address>` or the bare address.
    #[must_use]
    pub fn from_header(&self) -> String {
        if self.name.is_empty() {
            self.address.clone()
        } else {
            format!("\"{}\" <{}>", self.name, self.address)
        }
    }

    /// The domain of the sending address, used for Message-ID
    /// generation. Falls back to `localhost`.
    #[must_use]
    pub fn address_domain(&self) -> &str {
        match self.address.split_once('@') {
            Some((_, domain)) if !domain.is_empty() => domain,
            _ => "localhost",
        }
    }

    /// The PGP key id to use: the configured key or the From address.
    #[must_use]
    pub fn pgp_key_id(&self) -> &str {
        match self.openpgp.key_id.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => &self.address,
        }
    }
}

/// Read-only registry of identities, keyed by UID.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    identities: Vec<Identity>,
}

impl IdentityRegistry {
    /// Creates a registry from a list of identities.
    #[must_use]
    pub fn new(identities: Vec<Identity>) -> Self {
        Self { identities }
    }

    /// Looks up an identity by UID.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.uid == uid)
    }

    /// Iterates identities in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_with_name() {
        let identity = Identity::new("id1", "Alice Example", "alice@example.com");
        assert_eq!(identity.from_header(), "\"Alice Example\" <alice@example.com>");
    }

    #[test]
    fn test_from_header_bare_address() {
        let identity = Identity::new("id1", "", "alice@example.com");
        assert_eq!(identity.from_header(), "alice@example.com");
    }

    #[test]
    fn test_address_domain_fallback() {
        let identity = Identity::new("id1", "Alice", "not-an-address");
        assert_eq!(identity.address_domain(), "localhost");

        let identity = Identity::new("id1", "Alice", "alice@example.com");
        assert_eq!(identity.address_domain(), "example.com");
    }

    #[test]
    fn test_pgp_key_id_falls_back_to_address() {
        let mut identity = Identity::new("id1", "Alice", "alice@example.com");
        assert_eq!(identity.pgp_key_id(), "alice@example.com");

        identity.openpgp.key_id = Some("0xDEADBEEF".to_string());
        assert_eq!(identity.pgp_key_id(), "0xDEADBEEF");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = IdentityRegistry::new(vec![
            Identity::new("a", "A", "a@example.com"),
            Identity::new("b", "B", "b@example.com"),
        ]);
        assert!(registry.get("b").is_some());
        assert!(registry.get("c").is_none());
    }
}
