use std::collections::HashSet;

use capsules::capsule::similarity::jaccard_similarity;
use capsules::capsule::tags::{parse_tag, TagClassifier};
use capsules::capsule::types::generate_id;
use proptest::prelude::*;

fn word_set() -> impl Strategy<Value = HashSet<String>> {
    prop::collection::hash_set("[a-z]{3,8}", 0..8)
}

proptest! {
    #[test]
    fn ids_are_deterministic(
        session in "[a-z0-9-]{1,12}",
        phase in "[a-z]{2,10}",
        question in ".{1,80}",
    ) {
        let a = generate_id(&session, &phase, &question);
        let b = generate_id(&session, &phase, &question);
        prop_assert_eq!(&a, &b);

        let prefix = format!("{session}-{phase}-");
        prop_assert!(a.starts_with(&prefix));
        let hash = &a[prefix.len()..];
        prop_assert_eq!(hash.len(), 12);
        prop_assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_ignore_surrounding_whitespace(question in "[a-zA-Z ?]{1,40}") {
        prop_assert_eq!(
            generate_id("s", "plan", &question),
            generate_id("s", "plan", &format!("  {question}\n"))
        );
    }

    #[test]
    fn normalized_tags_carry_exactly_one_prefix(tag in "[a-zA-Z_/.]{1,24}") {
        let classifier = TagClassifier::default();
        let once = classifier.normalize_tag(&tag);
        let (prefix, value) = parse_tag(&once);
        prop_assert!(prefix.is_some());
        prop_assert_eq!(value, tag.as_str());
        prop_assert_eq!(classifier.normalize_tag(&once), once.clone());
    }

    #[test]
    fn jaccard_is_symmetric_and_bounded(a in word_set(), b in word_set()) {
        let ab = jaccard_similarity(&a, &b);
        let ba = jaccard_similarity(&b, &a);
        prop_assert_eq!(ab, ba);
        prop_assert!((0.0..=1.0).contains(&ab));
        if !a.is_empty() {
            prop_assert_eq!(jaccard_similarity(&a, &a), 1.0);
        }
    }
}
