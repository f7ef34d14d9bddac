mod helpers;

use capsules::capsule::codec::decode_session;
use capsules::capsule::store::{ListFilter, CAPSULE_FILE};
use capsules::capsule::types::{generate_id, CapsuleType, Origin, Status};
use capsules::error::CapsuleError;
use helpers::{capsule_at, insert_capsule, test_store};

#[test]
fn stored_capsule_lands_in_session_file() {
    let (tmp, store) = test_store();
    let mut c = capsule_at("s1", "plan", "Which queue for background jobs?", 0);
    c.choice = "Postgres SKIP LOCKED".into();
    c.rationale = "Already run Postgres".into();
    c.alternatives = vec!["Redis".into(), "SQS".into()];
    c.tags = vec!["jobs_table".into(), "src/jobs/mod.rs".into()];
    c.origin = Origin::Human;
    let id = insert_capsule(&store, c);

    let path = tmp.path().join("sessions").join("s1").join(CAPSULE_FILE);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("---\n"));
    assert!(contents.contains("## plan"));
    assert!(contents.contains("### Decision: Which queue for background jobs?"));
    assert!(contents.contains("- **Alternatives:** Redis, SQS"));
    assert!(contents.contains("- **Tags:** table:jobs_table, file:src/jobs/mod.rs"));
    assert!(!contents.contains("**Status:**"));

    let doc = decode_session(&contents).unwrap();
    assert_eq!(doc.session_id, "s1");
    assert_eq!(doc.capsules.len(), 1);
    assert_eq!(doc.capsules[0].id, id);
    assert_eq!(doc.capsules[0].origin, Origin::Human);
    assert!(!path.with_extension("md.tmp").exists());
}

#[test]
fn restore_same_question_is_upsert() {
    let (_tmp, store) = test_store();
    let mut c = capsule_at("s1", "plan", "Which ORM?", 0);
    let first = store.store(c.clone()).unwrap();
    c.choice = "sqlx".into();
    let second = store.store(c.clone()).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(first.id, generate_id("s1", "plan", "Which ORM?"));

    let all = store.list(&ListFilter::everything()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].choice, "sqlx");
}

#[test]
fn hand_edited_file_is_recovered() {
    let (tmp, store) = test_store();
    let dir = tmp.path().join("sessions").join("manual");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(CAPSULE_FILE),
        "---\nsession: manual\ntype: capsules\n---\n\n# Decision Capsules\n\n\
         ## investigate\n\n### Finding: Is the cache hit rate low?\n\
         - **Choice:** yes, 12%\n- **Tags:** caching\n\n\
         ## plan\n\n### Decision: Which eviction policy?\n\
         - **Alternatives:** LRU, LFU\n- **Choice:** LFU\n\
         - **Status:** invalidated\n- **InvalidationReason:** workload shifted\n",
    )
    .unwrap();

    let all = store.list(&ListFilter::everything()).unwrap();
    assert_eq!(all.len(), 2);

    let finding = all.iter().find(|c| c.phase == "investigate").unwrap();
    assert_eq!(finding.kind, CapsuleType::Finding);
    assert_eq!(finding.id, generate_id("manual", "investigate", "Is the cache hit rate low?"));
    assert!(finding.created_at.is_none());

    let decision = store.get(&generate_id("manual", "plan", "Which eviction policy?")).unwrap();
    assert_eq!(decision.kind, CapsuleType::Decision);
    assert_eq!(decision.status, Status::Invalidated);
    assert_eq!(decision.invalidation_reason.as_deref(), Some("workload shifted"));

    // default listing hides the invalidated one
    assert_eq!(store.list(&ListFilter::default()).unwrap().len(), 1);
}

#[test]
fn malformed_session_does_not_hide_others() {
    let (tmp, store) = test_store();
    insert_capsule(&store, capsule_at("good", "plan", "Q?", 0));
    let bad = tmp.path().join("sessions").join("broken");
    std::fs::create_dir_all(&bad).unwrap();
    std::fs::write(bad.join(CAPSULE_FILE), "---\nsession: [unclosed\n---\n").unwrap();

    assert_eq!(store.list(&ListFilter::default()).unwrap().len(), 1);
    assert_eq!(store.session_ids().unwrap(), vec!["broken", "good"]);
    let err = store.load_session("broken").unwrap_err();
    assert!(err.to_string().contains("broken"));
}

#[test]
fn phases_are_written_in_canonical_order() {
    let (tmp, store) = test_store();
    insert_capsule(&store, capsule_at("s1", "record", "R?", 0));
    insert_capsule(&store, capsule_at("s1", "brainstorm", "B?", 1));
    insert_capsule(&store, capsule_at("s1", "ask", "A?", 2));

    let contents =
        std::fs::read_to_string(tmp.path().join("sessions/s1").join(CAPSULE_FILE)).unwrap();
    let ask = contents.find("## ask").unwrap();
    let record = contents.find("## record").unwrap();
    let custom = contents.find("## brainstorm").unwrap();
    assert!(ask < record);
    assert!(record < custom);
}

#[test]
fn blank_or_multiline_phase_is_rejected() {
    let (_tmp, store) = test_store();
    let plan_id = insert_capsule(&store, capsule_at("s1", "plan", "Planned?", 0));

    for phase in ["", " ", "plan\n## execute"] {
        let err = store.store(capsule_at("s1", phase, "Blank phase?", 1)).unwrap_err();
        assert!(matches!(err, CapsuleError::Invalid { .. }), "phase {phase:?}");
    }

    let all = store.list(&ListFilter::everything()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, plan_id);
    assert_eq!(all[0].phase, "plan");
}
