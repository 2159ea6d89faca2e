//! XML round-trip property tests for filter rules.
//!
//! Encoding a rule and decoding it through a context holding the same
//! part templates must produce a structurally equal rule, for any
//! combination of grouping, threading, enabled flag, and parts.

#![allow(clippy::unwrap_used)]

use mailquill_filter::{
    Element, FilterPart, FilterRule, RuleContext, RuleGrouping, RuleThreading,
};
use proptest::prelude::*;

fn template(name: &str) -> FilterPart {
    match name {
        "subject" => FilterPart::new(
            "subject",
            "Subject",
            "(header-contains \"Subject\" ${word})",
            vec![Element::string("word", "")],
        ),
        "body" => FilterPart::new(
            "body",
            "Message Body",
            "(body-contains ${word})",
            vec![Element::string("word", "")],
        ),
        "size" => FilterPart::new(
            "size",
            "Size",
            "(${kind} (get-size) ${versus})",
            vec![Element::option("kind", "greater-than"), Element::integer("versus", 0)],
        ),
        "sender" => FilterPart::new(
            "sender",
            "Sender",
            "(header-contains \"From\" ${sender})",
            vec![Element::address("sender", "")],
        ),
        other => panic!("unknown template {other}"),
    }
}

fn context() -> RuleContext {
    let mut context = RuleContext::new(true);
    for name in ["subject", "body", "size", "sender"] {
        context.add_part_template(template(name));
    }
    context
}

fn arb_grouping() -> impl Strategy<Value = RuleGrouping> {
    prop_oneof![Just(RuleGrouping::All), Just(RuleGrouping::Any)]
}

fn arb_threading() -> impl Strategy<Value = RuleThreading> {
    prop_oneof![
        Just(RuleThreading::None),
        Just(RuleThreading::All),
        Just(RuleThreading::Replies),
        Just(RuleThreading::RepliesParents),
        Just(RuleThreading::Single),
    ]
}

fn arb_part() -> impl Strategy<Value = FilterPart> {
    (
        prop_oneof![
            Just("subject"),
            Just("body"),
            Just("size"),
            Just("sender")
        ],
        "[ -~]{0,24}",
        -9999_i64..9999,
    )
        .prop_map(|(name, text, number)| {
            let mut part = template(name);
            if let Some(element) = part.find_element_mut("word") {
                *element = Element::string("word", text.clone());
            }
            if let Some(element) = part.find_element_mut("sender") {
                *element = Element::address("sender", text.clone());
            }
            if let Some(element) = part.find_element_mut("versus") {
                *element = Element::integer("versus", number);
            }
            part
        })
}

fn arb_rule() -> impl Strategy<Value = FilterRule> {
    (
        "[ -~]{0,16}",
        any::<bool>(),
        arb_grouping(),
        arb_threading(),
        prop_oneof![Just("incoming"), Just("outgoing")],
        prop::collection::vec(arb_part(), 0..5),
    )
        .prop_map(|(name, enabled, grouping, threading, source, parts)| {
            let mut rule = FilterRule::new(name);
            rule.set_enabled(enabled);
            rule.set_grouping(grouping);
            rule.set_threading(threading);
            rule.set_source(source);
            for part in parts {
                rule.add_part(part);
            }
            rule
        })
}

proptest! {
    #[test]
    fn xml_round_trip_preserves_structure(rule in arb_rule()) {
        let context = context();
        let xml = rule.to_xml_string().unwrap();
        let decoded = FilterRule::from_xml(&xml, &context).unwrap();
        prop_assert_eq!(decoded, rule);
    }

    #[test]
    fn any_grouping_wraps_two_parts_in_or(
        word_a in "[a-z]{1,8}",
        word_b in "[a-z]{1,8}",
    ) {
        let mut rule = FilterRule::new("r");
        rule.set_grouping(RuleGrouping::Any);
        for word in [&word_a, &word_b] {
            let mut part = template("subject");
            if let Some(element) = part.find_element_mut("word") {
                *element = Element::string("word", word.clone());
            }
            rule.add_part(part);
        }

        let code = rule.build_code(&mailquill_filter::CodeGenOptions::default());
        prop_assert!(code.contains("(or"));
        let quoted_a = format!("\"{word_a}\"");
        let quoted_b = format!("\"{word_b}\"");
        prop_assert!(code.contains(&quoted_a));
        prop_assert!(code.contains(&quoted_b));
    }
}
