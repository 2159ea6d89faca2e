//! Typed argument values inside a filter part.

use std::fmt::Write;

/// The value carried by one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Free-text search string.
    String(String),
    /// One choice out of a fixed option set; the value is the option's
    /// code token, emitted unquoted.
    Option(String),
    /// Numeric argument (sizes, scores, day counts).
    Integer(i64),
    /// Email address argument.
    Address(String),
}

impl ElementValue {
    /// The `type` attribute used in XML persistence.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Option(_) => "option",
            Self::Integer(_) => "integer",
            Self::Address(_) => "address",
        }
    }
}

/// A named, typed argument slot of a filter part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Slot name, referenced as `${name}` from the part's code template.
    pub name: String,
    /// Current value.
    pub value: ElementValue,
}

impl Element {
    /// Creates a string element.
    #[must_use]
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ElementValue::String(value.into()),
        }
    }

    /// Creates an option element.
    #[must_use]
    pub fn option(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ElementValue::Option(value.into()),
        }
    }

    /// Creates an integer element.
    #[must_use]
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: ElementValue::Integer(value),
        }
    }

    /// Creates an address element.
    #[must_use]
    pub fn address(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ElementValue::Address(value.into()),
        }
    }

    /// Whether the element requires a non-empty value to validate.
    #[must_use]
    pub const fn requires_value(&self) -> bool {
        matches!(
            self.value,
            ElementValue::String(_) | ElementValue::Address(_)
        )
    }

    /// Whether the element's value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.value {
            ElementValue::String(s) | ElementValue::Option(s) | ElementValue::Address(s) => {
                s.is_empty()
            }
            ElementValue::Integer(_) => false,
        }
    }

    /// Appends the element's S-expression form to `out`.
    ///
    /// Strings and addresses are quoted, options are emitted as bare
    /// code tokens, integers in decimal.
    pub fn write_sexp(&self, out: &mut String) {
        match &self.value {
            ElementValue::String(s) | ElementValue::Address(s) => encode_sexp_string(s, out),
            ElementValue::Option(s) => out.push_str(s),
            ElementValue::Integer(n) => {
                // Writing an integer into a String cannot fail.
                let _ = write!(out, "{n}");
            }
        }
    }

    /// The string form stored in the XML `value` attribute.
    #[must_use]
    pub fn xml_value(&self) -> String {
        match &self.value {
            ElementValue::String(s) | ElementValue::Option(s) | ElementValue::Address(s) => {
                s.clone()
            }
            ElementValue::Integer(n) => n.to_string(),
        }
    }

    /// Rebuilds an element from its XML `type` and `value` attributes.
    ///
    /// Returns `None` for an unknown type or a malformed integer.
    #[must_use]
    pub fn from_xml(name: &str, type_name: &str, value: &str) -> Option<Self> {
        let value = match type_name {
            "string" => ElementValue::String(value.to_string()),
            "option" => ElementValue::Option(value.to_string()),
            "address" => ElementValue::Address(value.to_string()),
            "integer" => ElementValue::Integer(value.parse().ok()?),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Appends `s` as a quoted S-expression string, escaping backslashes
/// and double quotes.
fn encode_sexp_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sexp(element: &Element) -> String {
        let mut out = String::new();
        element.write_sexp(&mut out);
        out
    }

    #[test]
    fn test_string_is_quoted_and_escaped() {
        assert_eq!(sexp(&Element::string("word", "hello")), "\"hello\"");
        assert_eq!(
            sexp(&Element::string("word", "say \"hi\" \\ bye")),
            "\"say \\\"hi\\\" \\\\ bye\""
        );
    }

    #[test]
    fn test_option_is_bare() {
        assert_eq!(sexp(&Element::option("match-type", "contains")), "contains");
    }

    #[test]
    fn test_integer() {
        assert_eq!(sexp(&Element::integer("size", 1024)), "1024");
    }

    #[test]
    fn test_xml_round_trip() {
        for element in [
            Element::string("word", "needle"),
            Element::option("kind", "is"),
            Element::integer("versus", -3),
            Element::address("sender", "a@example.com"),
        ] {
            let rebuilt = Element::from_xml(
                &element.name,
                element.value.type_name(),
                &element.xml_value(),
            );
            assert_eq!(rebuilt.as_ref(), Some(&element));
        }
    }

    #[test]
    fn test_from_xml_rejects_unknown_type() {
        assert!(Element::from_xml("x", "regex", "v").is_none());
        assert!(Element::from_xml("x", "integer", "not-a-number").is_none());
    }
}
