//! The rule registry: part templates plus persisted rules.
//!
//! Rules come from two files: a read-only system file seeded with
//! defaults, merged with a read-write user file. User entries override
//! same-named system entries. Saving writes only non-system rules back
//! to the user file.

use crate::alert::Alert;
use crate::error::{Error, Result};
use crate::part::FilterPart;
use crate::rule::FilterRule;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use tracing::{info, warn};

struct StoredRule {
    rule: FilterRule,
    /// Seeded from the system file and untouched by the user; system
    /// rules are not written back on save.
    system: bool,
}

/// Registry of part templates and persisted rules.
pub struct RuleContext {
    threading: bool,
    part_templates: Vec<FilterPart>,
    rules: Vec<StoredRule>,
}

impl RuleContext {
    /// Creates an empty context. `threading` controls whether rule
    /// decoding honors the `threading` attribute.
    #[must_use]
    pub const fn new(threading: bool) -> Self {
        Self {
            threading,
            part_templates: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Whether rules in this context may use thread matching.
    #[must_use]
    pub const fn supports_threading(&self) -> bool {
        self.threading
    }

    /// Registers a part template.
    pub fn add_part_template(&mut self, part: FilterPart) {
        self.part_templates.push(part);
    }

    /// The registered part templates, in registration order.
    #[must_use]
    pub fn part_templates(&self) -> &[FilterPart] {
        &self.part_templates
    }

    /// Finds a part template by name.
    #[must_use]
    pub fn find_part(&self, name: &str) -> Option<&FilterPart> {
        self.part_templates.iter().find(|p| p.name == name)
    }

    /// Clones a part template into an independent instance a rule can
    /// own and mutate.
    #[must_use]
    pub fn clone_part(&self, name: &str) -> Option<FilterPart> {
        self.find_part(name).cloned()
    }

    /// Adds a user rule.
    ///
    /// # Errors
    ///
    /// Returns a `filter:bad-name-notunique` alert when a rule with the
    /// same name already exists in the same source list.
    pub fn add_rule(&mut self, rule: FilterRule) -> std::result::Result<(), Alert> {
        if self.find_rule(&rule.name, &rule.source).is_some() {
            return Err(Alert::with_detail(Alert::BAD_NAME, rule.name.clone()));
        }
        self.rules.push(StoredRule {
            rule,
            system: false,
        });
        Ok(())
    }

    /// Removes a rule by name and source.
    pub fn remove_rule(&mut self, name: &str, source: &str) -> Option<FilterRule> {
        let index = self
            .rules
            .iter()
            .position(|s| s.rule.name == name && s.rule.source == source)?;
        Some(self.rules.remove(index).rule)
    }

    /// Finds a rule by name and source.
    #[must_use]
    pub fn find_rule(&self, name: &str, source: &str) -> Option<&FilterRule> {
        self.rules
            .iter()
            .find(|s| s.rule.name == name && s.rule.source == source)
            .map(|s| &s.rule)
    }

    pub(crate) fn find_rule_mut(&mut self, name: &str, source: &str) -> Option<&mut FilterRule> {
        self.rules
            .iter_mut()
            .find(|s| s.rule.name == name && s.rule.source == source)
            .map(|s| &mut s.rule)
    }

    /// Iterates all rules in list order.
    pub fn rules(&self) -> impl Iterator<Item = &FilterRule> {
        self.rules.iter().map(|s| &s.rule)
    }

    /// Iterates the rules of one source list, in rank order.
    pub fn rules_for_source<'a>(
        &'a self,
        source: &'a str,
    ) -> impl Iterator<Item = &'a FilterRule> {
        self.rules().filter(move |r| r.source == source)
    }

    /// A rule's rank within its source list.
    #[must_use]
    pub fn get_rank_rule(&self, name: &str, source: &str) -> Option<usize> {
        self.rules_for_source(source).position(|r| r.name == name)
    }

    /// Moves a rule to `rank` within its source list. Rules of other
    /// sources keep their relative order and ranks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleNotFound`] when no such rule exists.
    pub fn rank_rule(&mut self, name: &str, source: &str, rank: usize) -> Result<()> {
        let index = self
            .rules
            .iter()
            .position(|s| s.rule.name == name && s.rule.source == source)
            .ok_or_else(|| Error::RuleNotFound {
                name: name.to_string(),
                source_list: source.to_string(),
            })?;

        let stored = self.rules.remove(index);

        // Global index where the moved rule lands as the rank-th entry
        // of its source list.
        let same_source: Vec<usize> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, s)| s.rule.source == source)
            .map(|(i, _)| i)
            .collect();

        let insert_at = if rank < same_source.len() {
            same_source[rank]
        } else {
            same_source.last().map_or(self.rules.len(), |last| last + 1)
        };

        self.rules.insert(insert_at, stored);
        Ok(())
    }

    /// Loads the seeded system rules. Missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable files or malformed XML.
    pub fn load_system(&mut self, path: &Path) -> Result<()> {
        if let Some(xml) = read_optional(path)? {
            self.load_rules_str(&xml, true)?;
        }
        Ok(())
    }

    /// Loads the user rules, overriding same-named system rules.
    /// Missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable files or malformed XML.
    pub fn load_user(&mut self, path: &Path) -> Result<()> {
        if let Some(xml) = read_optional(path)? {
            self.load_rules_str(&xml, false)?;
        }
        Ok(())
    }

    /// Parses every `<rule>` element in `xml` into the context.
    ///
    /// A non-system rule whose name and source match an existing entry
    /// overrides it in place; the entry then counts as user-owned and
    /// is written back on save.
    fn load_rules_str(&mut self, xml: &str, system: bool) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        let mut loaded = 0_usize;

        loop {
            match reader.read_event()? {
                Event::Start(start) if start.name().as_ref() == b"rule" => {
                    let rule = FilterRule::decode_rule(&start, &mut reader, self)?;
                    loaded += 1;

                    let existing = self
                        .rules
                        .iter_mut()
                        .find(|s| s.rule.name == rule.name && s.rule.source == rule.source);
                    match existing {
                        Some(stored) if !system => {
                            stored.rule.copy_from(&rule);
                            stored.system = false;
                        }
                        Some(_) => {
                            warn!(name = %rule.name, "duplicate system rule ignored");
                        }
                        None => self.rules.push(StoredRule { rule, system }),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        info!(loaded, system, "loaded filter rules");
        Ok(())
    }

    /// Writes all non-system rules to the user rule file.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn save_user(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Start(BytesStart::new("filteroptions")))?;
        writer.write_event(Event::Start(BytesStart::new("ruleset")))?;
        for stored in &self.rules {
            if !stored.system {
                stored.rule.write_xml(&mut writer)?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("ruleset")))?;
        writer.write_event(Event::End(BytesEnd::new("filteroptions")))?;

        std::fs::write(path, writer.into_inner())?;
        Ok(())
    }
}

/// Reads a rule file, mapping a missing file to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(xml) => Ok(Some(xml)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
