//! Filter parts: named predicate templates with typed arguments.
//!
//! A part is one row of a rule ("Subject contains X"): a code template
//! with `${name}` slots plus the elements that fill them. The context
//! holds the available templates; a rule owns independent clones.

use crate::alert::Alert;
use crate::element::Element;
use crate::error::Result;
use quick_xml::Writer;
use std::io;
use tracing::warn;

/// One predicate of a filter rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPart {
    /// Machine name, referenced from rule XML. The name `body` marks
    /// body-text searches, which code generation groups separately.
    pub name: String,
    /// Human-readable title shown in the editor and in alerts.
    pub title: String,
    /// S-expression code template with `${name}` slots.
    pub code: String,
    /// Argument slots, in template order.
    pub elements: Vec<Element>,
}

impl FilterPart {
    /// Creates a part template.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        code: impl Into<String>,
        elements: Vec<Element>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            code: code.into(),
            elements,
        }
    }

    /// Whether this part is a body-text search.
    #[must_use]
    pub fn is_body_search(&self) -> bool {
        self.name == "body"
    }

    /// Finds an element by slot name.
    #[must_use]
    pub fn find_element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Finds an element by slot name, mutably.
    pub fn find_element_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.name == name)
    }

    /// Validates the part's argument values.
    ///
    /// # Errors
    ///
    /// Returns a `filter:no-condition` alert naming the part when a
    /// required text value is empty.
    pub fn validate(&self) -> std::result::Result<(), Alert> {
        for element in &self.elements {
            if element.requires_value() && element.is_empty() {
                return Err(Alert::with_detail(Alert::NO_CONDITION, self.title.clone()));
            }
        }
        Ok(())
    }

    /// Appends the compiled predicate to `out`, substituting each
    /// `${name}` slot with its element's S-expression form.
    ///
    /// A slot without a matching element is logged and expands to
    /// nothing.
    pub fn build_code(&self, out: &mut String) {
        let mut rest = self.code.as_str();
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let slot = &after[..end];
                    match self.find_element(slot) {
                        Some(element) => element.write_sexp(out),
                        None => {
                            warn!(part = %self.name, slot, "no element for code template slot");
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // Unterminated slot; emit the rest verbatim.
                    out.push_str(&rest[start..]);
                    return;
                }
            }
        }
        out.push_str(rest);
    }

    /// Sets an element's value from decoded XML attributes.
    ///
    /// Unknown slot names and type mismatches are logged and skipped so
    /// stale rule files degrade instead of failing the load.
    pub fn set_value_from_xml(&mut self, slot: &str, type_name: &str, value: &str) {
        let part = self.name.clone();
        match self.find_element_mut(slot) {
            Some(element) => match Element::from_xml(slot, type_name, value) {
                Some(decoded) if decoded.value.type_name() == element.value.type_name() => {
                    *element = decoded;
                }
                _ => {
                    warn!(part = %part, slot, type_name, "ignoring mismatched element value");
                }
            },
            None => {
                warn!(part = %part, slot, "ignoring value for unknown element");
            }
        }
    }

    /// Writes the part's XML form: `<part name=..>` wrapping one
    /// `<value/>` per element.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_xml<W: io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer
            .create_element("part")
            .with_attribute(("name", self.name.as_str()))
            .write_inner_content(|writer| -> Result<()> {
                for element in &self.elements {
                    writer
                        .create_element("value")
                        .with_attributes([
                            ("name", element.name.as_str()),
                            ("type", element.value.type_name()),
                            ("value", element.xml_value().as_str()),
                        ])
                        .write_empty()?;
                }
                Ok(())
            })?;
        Ok(())
    }
}
