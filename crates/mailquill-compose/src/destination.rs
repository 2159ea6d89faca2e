//! Recipient destinations.

use std::fmt;

/// A single recipient: optional display name, address, and whether the
/// entry was auto-generated from the identity (auto-cc/auto-bcc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Display name, if any.
    pub name: Option<String>,
    /// Email address.
    pub address: String,
    /// True for entries derived from the identity rather than typed by
    /// the user.
    pub auto_generated: bool,
}

impl Destination {
    /// Creates a user-entered destination.
    #[must_use]
    pub fn user(name: Option<&str>, address: impl Into<String>) -> Self {
        Self {
            name: name.map(ToString::to_string),
            address: address.into(),
            auto_generated: false,
        }
    }

    /// Creates an auto-generated destination.
    #[must_use]
    pub fn auto(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
            auto_generated: true,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "\"{name}\" <{}>", self.address),
            _ => write!(f, "{}", self.address),
        }
    }
}

/// Ordered list of destinations for one recipient field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationList {
    entries: Vec<Destination>,
}

impl DestinationList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user-entered destination.
    pub fn push(&mut self, destination: Destination) {
        self.entries.push(destination);
    }

    /// Replaces the auto-generated entries with entries for `addresses`.
    ///
    /// Called whenever the From identity changes. User-entered entries
    /// are kept in place; an auto entry is not added when the user has
    /// already entered the same address.
    pub fn set_auto(&mut self, addresses: &[String]) {
        self.entries.retain(|d| !d.auto_generated);
        for address in addresses {
            let duplicate = self
                .entries
                .iter()
                .any(|d| d.address.eq_ignore_ascii_case(address));
            if !duplicate {
                self.entries.push(Destination::auto(address.clone()));
            }
        }
    }

    /// Iterates entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &Destination> {
        self.entries.iter()
    }

    /// Returns the bare addresses in order.
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.entries.iter().map(|d| d.address.clone()).collect()
    }

    /// Checks whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The header value: comma-separated formatted destinations, or
    /// `None` when the list is empty.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
