/// Property-based tests using proptest
/// Tests invariants of scoring and routing that should hold for all inputs
use leadflow_pipeline::automation::{choose_strategy, route};
use leadflow_pipeline::completeness::{completeness_score, is_valid_email, FIELD_WEIGHTS};
use leadflow_pipeline::intent::{intent_score, priority_topics};
use leadflow_pipeline::models::{IntentSignal, Lead, Strategy as OutreachStrategy};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

fn field_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("")),
        Just(json!("value")),
        Just(json!(true)),
        Just(json!(42)),
        Just(json!("jane@acme.io")),
    ]
}

fn lead_strategy() -> impl Strategy<Value = Lead> {
    proptest::collection::vec(field_value(), FIELD_WEIGHTS.len()).prop_map(|values| {
        let mut lead = Lead::default();
        for ((field, _), value) in FIELD_WEIGHTS.iter().zip(values) {
            lead.set(*field, value);
        }
        lead
    })
}

fn signal_strategy() -> impl Strategy<Value = IntentSignal> {
    ("[a-c]{1,3}", -20.0f64..150.0, 1u32..28).prop_map(|(topic, strength, day)| IntentSignal {
        source: "prop".to_string(),
        topic,
        strength,
        observed_at: Utc.with_ymd_and_hms(2026, 2, day, 0, 0, 0).unwrap(),
    })
}

// Property: completeness never decreases when a field is added
proptest! {
    #[test]
    fn completeness_is_bounded(lead in lead_strategy()) {
        prop_assert!(completeness_score(&lead) <= 100);
    }

    #[test]
    fn adding_fields_never_lowers_completeness(
        lead in lead_strategy(),
        idx in 0usize..FIELD_WEIGHTS.len(),
    ) {
        let before = completeness_score(&lead);
        let mut enriched = lead.clone();
        let (field, _) = FIELD_WEIGHTS[idx];
        let filler = if field == "email" { json!("jane@acme.io") } else { json!("filled") };
        let mut extra = serde_json::Map::new();
        extra.insert(field.to_string(), filler);
        enriched.merge(extra);
        prop_assert!(enriched.has(field));
        prop_assert!(completeness_score(&enriched) >= before);
    }

    #[test]
    fn merging_empty_values_changes_nothing(lead in lead_strategy()) {
        let before = lead.clone();
        let mut merged = lead;
        let mut empties = serde_json::Map::new();
        for (field, _) in FIELD_WEIGHTS {
            empties.insert(field.to_string(), json!(""));
        }
        prop_assert_eq!(merged.merge(empties), 0);
        prop_assert_eq!(merged, before);
    }

    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }
}

// Property: routing is a pure function of the two scores
proptest! {
    #[test]
    fn routing_is_deterministic(q in 0u8..=100, i in 0u8..=100) {
        prop_assert_eq!(route(q, i), route(q, i));
    }

    #[test]
    fn routing_matches_the_rule_table(q in 0u8..=100, i in 0u8..=100) {
        let expected = if q > 80 && i > 70 {
            OutreachStrategy::PremiumOutreach
        } else if q > 60 || i > 50 {
            OutreachStrategy::StandardOutreach
        } else {
            OutreachStrategy::NurtureSequence
        };
        prop_assert_eq!(choose_strategy(q, i), expected);
        prop_assert!(!route(q, i).channels.is_empty());
    }
}

// Property: intent score stays in range and is order independent
proptest! {
    #[test]
    fn intent_score_is_bounded_and_order_independent(
        signals in proptest::collection::vec(signal_strategy(), 0..12)
    ) {
        let score = intent_score(&signals);
        prop_assert!(score <= 100);

        let mut reversed = signals.clone();
        reversed.reverse();
        prop_assert_eq!(intent_score(&reversed), score);
        prop_assert_eq!(priority_topics(&reversed, 5), priority_topics(&signals, 5));
    }
}
