//! Clone-edit-commit editing of stored rules.
//!
//! The dialog edits a clone; the stored rule is untouched until the
//! edit is accepted. Dropping the session discards the clone.

use crate::alert::Alert;
use crate::context::RuleContext;
use crate::error::{Error, Result};
use crate::rule::FilterRule;

/// An in-progress edit of one stored rule.
pub struct EditSession<'a> {
    context: &'a mut RuleContext,
    original_name: String,
    source: String,
    working: FilterRule,
}

impl RuleContext {
    /// Starts editing the named rule on a working clone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleNotFound`] when no such rule exists.
    pub fn begin_edit(&mut self, name: &str, source: &str) -> Result<EditSession<'_>> {
        let working = self
            .find_rule(name, source)
            .cloned()
            .ok_or_else(|| Error::RuleNotFound {
                name: name.to_string(),
                source_list: source.to_string(),
            })?;
        Ok(EditSession {
            context: self,
            original_name: name.to_string(),
            source: source.to_string(),
            working,
        })
    }
}

impl EditSession<'_> {
    /// The working clone.
    #[must_use]
    pub const fn rule(&self) -> &FilterRule {
        &self.working
    }

    /// Mutable access to the working clone.
    pub const fn rule_mut(&mut self) -> &mut FilterRule {
        &mut self.working
    }

    /// The part-template registry, for adding conditions to the clone.
    #[must_use]
    pub fn context(&self) -> &RuleContext {
        self.context
    }

    /// Validates the clone and copies its fields back onto the stored
    /// rule. The stored rule's listeners fire once.
    ///
    /// # Errors
    ///
    /// Returns the validation alert, or `filter:bad-name-notunique`
    /// when the clone was renamed to a name already taken in its
    /// source list. The stored rule is untouched on error.
    pub fn commit(self) -> std::result::Result<(), Alert> {
        self.working.validate()?;

        if self.working.name != self.original_name
            && self
                .context
                .find_rule(&self.working.name, &self.source)
                .is_some()
        {
            return Err(Alert::with_detail(
                Alert::BAD_NAME,
                self.working.name.clone(),
            ));
        }

        if let Some(original) = self
            .context
            .find_rule_mut(&self.original_name, &self.source)
        {
            original.copy_from(&self.working);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::part::FilterPart;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context_with_rule() -> RuleContext {
        let mut context = RuleContext::new(true);
        let mut rule = FilterRule::new("keep");
        rule.add_part(FilterPart::new(
            "subject",
            "Subject",
            "(header-contains \"Subject\" ${word})",
            vec![Element::string("word", "hello")],
        ));
        context.add_rule(rule).unwrap();
        context
    }

    #[test]
    fn test_original_untouched_until_commit() {
        let mut context = context_with_rule();

        let mut session = context.begin_edit("keep", "incoming").unwrap();
        session.rule_mut().set_enabled(false);
        assert!(session.context().find_rule("keep", "incoming").unwrap().enabled);

        session.commit().unwrap();
        assert!(!context.find_rule("keep", "incoming").unwrap().enabled);
    }

    #[test]
    fn test_drop_discards_changes() {
        let mut context = context_with_rule();
        {
            let mut session = context.begin_edit("keep", "incoming").unwrap();
            session.rule_mut().set_name("renamed");
        }
        assert!(context.find_rule("keep", "incoming").is_some());
        assert!(context.find_rule("renamed", "incoming").is_none());
    }

    #[test]
    fn test_commit_validates() {
        let mut context = context_with_rule();
        let mut session = context.begin_edit("keep", "incoming").unwrap();
        session.rule_mut().set_name("");

        let alert = session.commit().unwrap_err();
        assert_eq!(alert.tag, Alert::NO_NAME);
        assert!(context.find_rule("keep", "incoming").is_some());
    }

    #[test]
    fn test_commit_rejects_rename_collision() {
        let mut context = context_with_rule();
        let mut other = FilterRule::new("other");
        other.add_part(FilterPart::new("x", "X", "(t)", vec![]));
        context.add_rule(other).unwrap();

        let mut session = context.begin_edit("keep", "incoming").unwrap();
        session.rule_mut().set_name("other");

        let alert = session.commit().unwrap_err();
        assert_eq!(alert.tag, Alert::BAD_NAME);
    }

    #[test]
    fn test_rename_commits_and_notifies_once() {
        let mut context = context_with_rule();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        context
            .find_rule_mut("keep", "incoming")
            .unwrap()
            .subscribe(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let mut session = context.begin_edit("keep", "incoming").unwrap();
        session.rule_mut().set_name("renamed");
        session.rule_mut().set_enabled(false);
        session.commit().unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(context.find_rule("renamed", "incoming").is_some());
    }
}
