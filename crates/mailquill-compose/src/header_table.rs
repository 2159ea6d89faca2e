//! Composer header state.
//!
//! Holds everything that ends up in the envelope headers: the selected
//! identity, subject, reply-to, the three destination lists, post-to
//! folders, and custom headers. Header finalization onto the outgoing
//! message happens in the builder.

use crate::destination::DestinationList;
use crate::identity::Identity;

/// Mutable header state for one composer session.
#[derive(Debug, Clone, Default)]
pub struct HeaderTable {
    /// UID of the selected From identity.
    pub identity_uid: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Reply-To override; the identity default applies when empty.
    pub reply_to: Option<String>,
    /// To recipients.
    pub to: DestinationList,
    /// Cc recipients.
    pub cc: DestinationList,
    /// Bcc recipients.
    pub bcc: DestinationList,
    /// Folders to post the message to (X-Evolution-PostTo).
    pub post_to: Vec<String>,
    /// Custom headers appended verbatim, in order.
    pub custom_headers: Vec<(String, String)>,
}

impl HeaderTable {
    /// Creates an empty header table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a new From identity and recomputes the auto-generated
    /// Cc/Bcc entries from it. User-entered entries are untouched.
    pub fn set_identity(&mut self, identity: &Identity) {
        self.identity_uid = Some(identity.uid.clone());
        self.cc.set_auto(&identity.auto_cc);
        self.bcc.set_auto(&identity.auto_bcc);
    }

    /// All recipient addresses across To, Cc, and Bcc, in field order.
    #[must_use]
    pub fn recipient_addresses(&self) -> Vec<String> {
        let mut addresses = self.to.addresses();
        addresses.extend(self.cc.addresses());
        addresses.extend(self.bcc.addresses());
        addresses
    }

    /// Adds a custom header.
    pub fn add_custom_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.custom_headers.push((name.into(), value.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;

    #[test]
    fn test_set_identity_recomputes_auto_entries() {
        let mut table = HeaderTable::new();
        table.cc.push(Destination::user(None, "typed@example.com"));

        let mut first = Identity::new("a", "A", "a@example.com");
        first.auto_cc = vec!["list-a@example.com".to_string()];
        table.set_identity(&first);
        assert_eq!(
            table.cc.addresses(),
            vec!["typed@example.com", "list-a@example.com"]
        );

        let mut second = Identity::new("b", "B", "b@example.com");
        second.auto_cc = vec!["list-b@example.com".to_string()];
        table.set_identity(&second);
        assert_eq!(
            table.cc.addresses(),
            vec!["typed@example.com", "list-b@example.com"]
        );
        assert_eq!(table.identity_uid.as_deref(), Some("b"));
    }

    #[test]
    fn test_auto_entry_never_duplicates_user_entry() {
        let mut table = HeaderTable::new();
        table.bcc.push(Destination::user(None, "me@example.com"));

        let mut identity = Identity::new("a", "A", "a@example.com");
        identity.auto_bcc = vec!["me@example.com".to_string()];
        table.set_identity(&identity);

        assert_eq!(table.bcc.len(), 1);
    }

    #[test]
    fn test_recipient_addresses_order() {
        let mut table = HeaderTable::new();
        table.to.push(Destination::user(None, "to@example.com"));
        table.cc.push(Destination::user(None, "cc@example.com"));
        table.bcc.push(Destination::user(None, "bcc@example.com"));

        assert_eq!(
            table.recipient_addresses(),
            vec!["to@example.com", "cc@example.com", "bcc@example.com"]
        );
    }
}
