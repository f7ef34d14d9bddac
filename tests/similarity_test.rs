mod helpers;

use capsules::capsule::similarity::{Proposal, SimilarityChecker, SuggestedAction};
use capsules::capsule::store::ListFilter;
use helpers::{capsule_at, insert_capsule, test_store};

#[test]
fn contradicting_answer_suggests_supersede() {
    let (_tmp, store) = test_store();
    let mut existing = capsule_at("s1", "plan", "Which auth approach?", 0);
    existing.choice = "JWT tokens".into();
    let id = insert_capsule(&store, existing);

    let active = store.list(&ListFilter::default()).unwrap();
    let result = SimilarityChecker::default()
        .check(&active, &Proposal::new("Which auth?", "session cookies"))
        .unwrap();

    assert!(result.similar.is_empty());
    assert_eq!(result.contradicting.len(), 1);
    assert_eq!(result.contradicting[0].id, id);
    assert_eq!(result.suggested_action, SuggestedAction::Supersedes(id.clone()));
    assert_eq!(result.suggested_action.to_string(), format!("supersedes:{id}"));
}

#[test]
fn same_question_same_answer_is_duplicate() {
    let (_tmp, store) = test_store();
    let mut existing = capsule_at("s1", "plan", "Which auth approach?", 0);
    existing.choice = "JWT tokens".into();
    let id = insert_capsule(&store, existing);

    let active = store.list(&ListFilter::default()).unwrap();
    let result = SimilarityChecker::default()
        .check(&active, &Proposal::new("which AUTH approach", "jwt tokens"))
        .unwrap();

    assert!(result.contradicting.is_empty());
    assert!(result.similar[0].exact);
    assert_eq!(result.suggested_action, SuggestedAction::DuplicateOf(id));
}

#[test]
fn invalidated_capsules_are_ignored() {
    let (_tmp, store) = test_store();
    let mut existing = capsule_at("s1", "plan", "Which auth approach?", 0);
    existing.choice = "JWT tokens".into();
    let id = insert_capsule(&store, existing);
    store.invalidate(&id, "revisited", None, None).unwrap();

    let everything = store.list(&ListFilter::everything()).unwrap();
    assert_eq!(everything.len(), 1);
    let result = SimilarityChecker::default()
        .check(&everything, &Proposal::new("Which auth approach?", "session cookies"));
    assert!(result.is_none());
}

#[test]
fn unrelated_proposal_has_no_result() {
    let (_tmp, store) = test_store();
    insert_capsule(&store, capsule_at("s1", "plan", "Which database engine?", 0));
    let active = store.list(&ListFilter::default()).unwrap();
    let result = SimilarityChecker::default()
        .check(&active, &Proposal::new("Frontend bundler?", "vite"));
    assert!(result.is_none());
}
