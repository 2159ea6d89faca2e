//! Filter rules: validation, code generation, XML persistence, and
//! change notification.

use crate::alert::Alert;
use crate::context::RuleContext;
use crate::error::{Error, Result};
use crate::part::FilterPart;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt;
use std::io;
use tracing::warn;

/// How a rule's parts are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleGrouping {
    /// Every part must match (logical AND).
    #[default]
    All,
    /// Any part may match (logical OR).
    Any,
}

impl RuleGrouping {
    /// The XML attribute value.
    #[must_use]
    pub const fn as_xml(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

/// Thread expansion applied around the compiled expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleThreading {
    /// Match individual messages only.
    #[default]
    None,
    /// Match all messages in a matching thread.
    All,
    /// Match replies to matching messages.
    Replies,
    /// Match replies and their parents.
    RepliesParents,
    /// Match threads with a single message.
    Single,
}

impl RuleThreading {
    /// The XML attribute value; `None` emits no attribute.
    #[must_use]
    pub const fn as_xml(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::All => Some("all"),
            Self::Replies => Some("replies"),
            Self::RepliesParents => Some("replies_parents"),
            Self::Single => Some("single"),
        }
    }

    /// The `match-threads` mode token; identical to the XML value.
    #[must_use]
    pub const fn mode_name(self) -> Option<&'static str> {
        self.as_xml()
    }
}

/// External settings consulted during code generation.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenOptions {
    /// Whether the evaluator threads messages by subject; when off the
    /// `match-threads` mode gets a `no-subject,` prefix.
    pub thread_by_subject: bool,
}

impl Default for CodeGenOptions {
    fn default() -> Self {
        Self {
            thread_by_subject: true,
        }
    }
}

type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// A mail filtering rule: an ordered list of predicate parts plus how
/// they combine.
///
/// Mutating setters fire change notifications; [`FilterRule::batch`]
/// suppresses them so a bulk operation (XML decode, copy) notifies
/// once at the end. Listeners are excluded from equality and cloning.
pub struct FilterRule {
    /// Rule name, unique within its source list.
    pub name: String,
    /// Disabled rules are kept but not applied.
    pub enabled: bool,
    /// AND/OR combination of the parts.
    pub grouping: RuleGrouping,
    /// Thread expansion mode.
    pub threading: RuleThreading,
    /// Which rule list this belongs to ("incoming", "outgoing", ...).
    pub source: String,
    parts: Vec<FilterPart>,
    listeners: Vec<ChangeListener>,
    frozen: u32,
    pending: bool,
}

impl FilterRule {
    /// Creates an empty enabled rule with the default "incoming" source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            grouping: RuleGrouping::All,
            threading: RuleThreading::None,
            source: "incoming".to_string(),
            parts: Vec::new(),
            listeners: Vec::new(),
            frozen: 0,
            pending: false,
        }
    }

    /// The rule's parts, in evaluation order.
    #[must_use]
    pub fn parts(&self) -> &[FilterPart] {
        &self.parts
    }

    /// Mutable access to a part by index.
    pub fn part_mut(&mut self, index: usize) -> Option<&mut FilterPart> {
        self.parts.get_mut(index)
    }

    /// Renames the rule.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.emit_changed();
        }
    }

    /// Enables or disables the rule.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.emit_changed();
        }
    }

    /// Sets the grouping mode.
    pub fn set_grouping(&mut self, grouping: RuleGrouping) {
        if self.grouping != grouping {
            self.grouping = grouping;
            self.emit_changed();
        }
    }

    /// Sets the threading mode.
    pub fn set_threading(&mut self, threading: RuleThreading) {
        if self.threading != threading {
            self.threading = threading;
            self.emit_changed();
        }
    }

    /// Sets the source list.
    pub fn set_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if self.source != source {
            self.source = source;
            self.emit_changed();
        }
    }

    /// Appends a part.
    pub fn add_part(&mut self, part: FilterPart) {
        self.parts.push(part);
        self.emit_changed();
    }

    /// Removes the part at `index`, if present.
    pub fn remove_part(&mut self, index: usize) -> Option<FilterPart> {
        if index >= self.parts.len() {
            return None;
        }
        let part = self.parts.remove(index);
        self.emit_changed();
        Some(part)
    }

    /// Registers a change listener, fired after every completed
    /// mutation.
    pub fn subscribe(&mut self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Runs a batch of mutations with notifications suppressed; a
    /// single notification fires at the end when anything changed.
    pub fn batch(&mut self, f: impl FnOnce(&mut Self)) {
        self.frozen += 1;
        f(self);
        self.frozen -= 1;
        if self.frozen == 0 && self.pending {
            self.pending = false;
            self.emit_changed();
        }
    }

    fn emit_changed(&mut self) {
        if self.frozen > 0 {
            self.pending = true;
            return;
        }
        for listener in &self.listeners {
            listener();
        }
    }

    /// Copies all rule fields and parts from `other`, notifying once.
    pub fn copy_from(&mut self, other: &Self) {
        self.batch(|rule| {
            rule.set_name(other.name.clone());
            rule.set_enabled(other.enabled);
            rule.set_grouping(other.grouping);
            rule.set_threading(other.threading);
            rule.set_source(other.source.clone());
            rule.parts = other.parts.clone();
            rule.emit_changed();
        });
    }

    /// Validates the rule.
    ///
    /// # Errors
    ///
    /// Returns `filter:no-name` for an empty name, `filter:no-condition`
    /// for an empty part list, else the first failing part's alert.
    pub fn validate(&self) -> std::result::Result<(), Alert> {
        if self.name.is_empty() {
            return Err(Alert::new(Alert::NO_NAME));
        }
        if self.parts.is_empty() {
            return Err(Alert::new(Alert::NO_CONDITION));
        }
        for part in &self.parts {
            part.validate()?;
        }
        Ok(())
    }

    /// Compiles the rule into the S-expression consumed by the external
    /// evaluator. An empty rule compiles to an empty string.
    ///
    /// Body-text searches are split from the other predicates and each
    /// group compiled separately under the rule's grouping operator, so
    /// the evaluator can short-circuit cheap header predicates before
    /// the expensive body scan. This restructuring keeps the logical
    /// expression unchanged and must be preserved as-is.
    #[must_use]
    pub fn build_code(&self, options: &CodeGenOptions) -> String {
        let mut out = String::new();
        if self.parts.is_empty() {
            return out;
        }

        let has_body_search = self.parts.iter().any(FilterPart::is_body_search);
        if has_body_search {
            let (body_searches, other_searches): (Vec<&FilterPart>, Vec<&FilterPart>) =
                self.parts.iter().partition(|p| p.is_body_search());

            if !other_searches.is_empty() && !body_searches.is_empty() {
                out.push_str(match self.grouping {
                    RuleGrouping::All => "(and ",
                    RuleGrouping::Any => "(or ",
                });
                self.append_parts_code(&other_searches, false, true, options, &mut out);
                out.push(' ');
                self.append_parts_code(&body_searches, true, false, options, &mut out);
                out.push(')');
                return out;
            }
        }

        let parts: Vec<&FilterPart> = self.parts.iter().collect();
        self.append_parts_code(&parts, false, false, options, &mut out);
        out
    }

    /// Emits one group of parts, optionally wrapped in `match-threads`
    /// and `match-all`. The exact spacing and line breaks are part of
    /// the contract with the evaluator.
    fn append_parts_code(
        &self,
        parts: &[&FilterPart],
        without_match_all: bool,
        force_match_all: bool,
        options: &CodeGenOptions,
        out: &mut String,
    ) {
        let thread_no_subject = if options.thread_by_subject {
            ""
        } else {
            "no-subject,"
        };

        if let Some(mode) = self.threading.mode_name() {
            out.push_str(&format!(" (match-threads \"{thread_no_subject}{mode}\" "));
        }

        if (self.threading != RuleThreading::None && !without_match_all) || force_match_all {
            out.push_str("(match-all ");
        }

        if parts.len() > 1 {
            out.push_str(match self.grouping {
                RuleGrouping::All => " (and\n  ",
                RuleGrouping::Any => " (or\n  ",
            });
        }

        for part in parts {
            part.build_code(out);
            out.push_str("\n  ");
        }

        if parts.len() > 1 {
            out.push_str(")\n");
        }

        if self.threading == RuleThreading::None {
            if force_match_all {
                out.push_str(")\n");
            }
        } else if without_match_all && !force_match_all {
            out.push_str(")\n");
        } else {
            out.push_str("))\n");
        }
    }

    /// Writes the rule's XML form to an open writer.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn write_xml<W: io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut rule = BytesStart::new("rule");
        rule.push_attribute(("enabled", if self.enabled { "true" } else { "false" }));
        rule.push_attribute(("grouping", self.grouping.as_xml()));
        if let Some(threading) = self.threading.as_xml() {
            rule.push_attribute(("threading", threading));
        }
        rule.push_attribute(("source", self.source.as_str()));

        writer.write_event(Event::Start(rule))?;

        writer
            .create_element("title")
            .write_text_content(BytesText::new(&self.name))?;

        writer
            .create_element("partset")
            .write_inner_content(|writer| -> Result<()> {
                for part in &self.parts {
                    part.write_xml(writer)?;
                }
                Ok(())
            })?;

        writer.write_event(Event::End(BytesEnd::new("rule")))?;
        Ok(())
    }

    /// Renders the rule as a standalone XML string.
    ///
    /// # Errors
    ///
    /// Propagates writer failures.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_xml(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::MalformedDocument(e.to_string()))
    }

    /// Decodes a rule from an XML string, looking up part templates in
    /// `context`. The whole decode is one batch: listeners fire once.
    ///
    /// Tolerances: missing `enabled` defaults to true, missing or
    /// unknown `threading` to [`RuleThreading::None`], missing `source`
    /// to "incoming"; unknown child elements and unknown part names are
    /// logged and skipped. The `threading` attribute is ignored
    /// entirely when the context does not support threading.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or a document without a
    /// `<rule>` element.
    pub fn xml_decode(&mut self, xml: &str, context: &RuleContext) -> Result<()> {
        let decoded = Self::from_xml(xml, context)?;
        self.copy_from(&decoded);
        Ok(())
    }

    /// Parses a rule from an XML string. See [`FilterRule::xml_decode`]
    /// for the tolerances applied.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or a document without a
    /// `<rule>` element.
    pub fn from_xml(xml: &str, context: &RuleContext) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event()? {
                Event::Start(start) if start.name().as_ref() == b"rule" => {
                    return Self::decode_rule(&start, &mut reader, context);
                }
                Event::Eof => {
                    return Err(Error::MalformedDocument(
                        "no <rule> element found".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    pub(crate) fn decode_rule(
        start: &BytesStart<'_>,
        reader: &mut Reader<&[u8]>,
        context: &RuleContext,
    ) -> Result<Self> {
        let mut rule = Self::new("");

        rule.enabled = match attribute(start, "enabled")? {
            Some(value) => value != "false",
            None => true,
        };
        rule.grouping = match attribute(start, "grouping")?.as_deref() {
            Some("any") => RuleGrouping::Any,
            _ => RuleGrouping::All,
        };
        if context.supports_threading() {
            rule.threading = match attribute(start, "threading")?.as_deref() {
                Some("all") => RuleThreading::All,
                Some("replies") => RuleThreading::Replies,
                Some("replies_parents") => RuleThreading::RepliesParents,
                Some("single") => RuleThreading::Single,
                _ => RuleThreading::None,
            };
        }
        if let Some(source) = attribute(start, "source")? {
            rule.source = source;
        }

        loop {
            match reader.read_event()? {
                Event::Start(child) => match child.name().as_ref() {
                    b"title" | b"_title" => {
                        rule.name = read_text(reader, "title")?;
                    }
                    b"partset" => {
                        rule.parts = decode_partset(reader, context)?;
                    }
                    other => {
                        let name = String::from_utf8_lossy(other).to_string();
                        warn!(element = %name, "skipping unknown element in <rule>");
                        reader.read_to_end(child.name())?;
                    }
                },
                Event::End(end) if end.name().as_ref() == b"rule" => break,
                Event::Eof => {
                    return Err(Error::MalformedDocument(
                        "unterminated <rule> element".to_string(),
                    ));
                }
                _ => {}
            }
        }

        Ok(rule)
    }
}

/// Reads a rule child element's text content up to its end tag.
fn read_text(reader: &mut Reader<&[u8]>, element: &str) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::End(end) if end.name().as_ref() == element.as_bytes() => return Ok(text),
            Event::Eof => {
                return Err(Error::MalformedDocument(format!(
                    "unterminated <{element}> element"
                )));
            }
            _ => {}
        }
    }
}

/// Decodes the `<partset>` children, cloning each named template from
/// the context and filling its element values.
fn decode_partset(reader: &mut Reader<&[u8]>, context: &RuleContext) -> Result<Vec<FilterPart>> {
    let mut parts = Vec::new();
    let mut current: Option<FilterPart> = None;

    loop {
        match reader.read_event()? {
            Event::Start(child) if child.name().as_ref() == b"part" => {
                match attribute(&child, "name")? {
                    Some(name) => match context.clone_part(&name) {
                        Some(part) => current = Some(part),
                        None => {
                            warn!(part = %name, "skipping rule part with unknown name");
                            reader.read_to_end(child.name())?;
                        }
                    },
                    None => {
                        warn!("skipping <part> without a name attribute");
                        reader.read_to_end(child.name())?;
                    }
                }
            }
            Event::Empty(value) if value.name().as_ref() == b"value" => {
                if let Some(part) = current.as_mut() {
                    decode_value(&value, part)?;
                }
            }
            Event::Start(value) if value.name().as_ref() == b"value" => {
                if let Some(part) = current.as_mut() {
                    decode_value(&value, part)?;
                }
                reader.read_to_end(value.name())?;
            }
            Event::End(end) => match end.name().as_ref() {
                b"part" => {
                    if let Some(part) = current.take() {
                        parts.push(part);
                    }
                }
                b"partset" => return Ok(parts),
                _ => {}
            },
            Event::Eof => {
                return Err(Error::MalformedDocument(
                    "unterminated <partset> element".to_string(),
                ));
            }
            _ => {}
        }
    }
}

fn decode_value(value: &BytesStart<'_>, part: &mut FilterPart) -> Result<()> {
    let slot = attribute(value, "name")?;
    let type_name = attribute(value, "type")?;
    let content = attribute(value, "value")?;
    if let (Some(slot), Some(type_name)) = (slot, type_name) {
        part.set_value_from_xml(&slot, &type_name, content.as_deref().unwrap_or_default());
    } else {
        warn!(part = %part.name, "ignoring <value> without name and type attributes");
    }
    Ok(())
}

/// Reads an unescaped attribute value by name.
fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match start.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

impl fmt::Debug for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRule")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("grouping", &self.grouping)
            .field("threading", &self.threading)
            .field("source", &self.source)
            .field("parts", &self.parts)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Clone for FilterRule {
    /// Clones the rule data; listeners do not carry over.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            enabled: self.enabled,
            grouping: self.grouping,
            threading: self.threading,
            source: self.source.clone(),
            parts: self.parts.clone(),
            listeners: Vec::new(),
            frozen: 0,
            pending: false,
        }
    }
}

impl PartialEq for FilterRule {
    /// Structural equality over enabled, grouping, threading, name,
    /// source, and pairwise parts. Listeners are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.grouping == other.grouping
            && self.threading == other.threading
            && self.name == other.name
            && self.source == other.source
            && self.parts == other.parts
    }
}

impl Eq for FilterRule {}
