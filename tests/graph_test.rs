mod helpers;

use capsules::capsule::graph::{build_graph, Direction, Relation};
use capsules::error::CapsuleError;
use helpers::{capsule_at, insert_capsule, test_store};

/// root enables c1 enables c2 enables c3, across two sessions.
fn enables_chain() -> (tempfile::TempDir, capsules::capsule::CapsuleStore, Vec<String>) {
    let (tmp, store) = test_store();
    let mut ids: Vec<String> = Vec::new();
    for (i, q) in ["Root?", "C1?", "C2?", "C3?"].iter().enumerate() {
        let session = if i < 2 { "s1" } else { "s2" };
        let mut c = capsule_at(session, "plan", q, i as u32);
        c.enabled_by = ids.last().cloned();
        ids.push(insert_capsule(&store, c));
    }
    (tmp, store, ids)
}

#[test]
fn depth_bounds_the_walk() {
    let (_tmp, store, ids) = enables_chain();
    for depth in 0..=4 {
        let graph = build_graph(&store, &ids[0], depth, Direction::Down).unwrap();
        assert_eq!(graph.nodes.len(), (depth + 1).min(ids.len()), "depth {depth}");
        assert!(graph.nodes.iter().all(|n| n.distance <= depth));
        assert!(graph.edges.iter().all(|e| e.relation == Relation::Enables));
    }
}

#[test]
fn up_walks_towards_enablers() {
    let (_tmp, store, ids) = enables_chain();
    let graph = build_graph(&store, &ids[3], 2, Direction::Up).unwrap();
    let found: Vec<(&str, usize)> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.distance))
        .collect();
    assert_eq!(
        found,
        vec![(ids[3].as_str(), 0), (ids[2].as_str(), 1), (ids[1].as_str(), 2)]
    );

    let down = build_graph(&store, &ids[3], 2, Direction::Down).unwrap();
    assert_eq!(down.nodes.len(), 1);
    assert!(down.edges.is_empty());
}

#[test]
fn supersession_reaches_invalidated_capsules() {
    let (_tmp, store) = test_store();
    let old = insert_capsule(&store, capsule_at("s1", "plan", "Queue?", 0));
    let new = insert_capsule(&store, capsule_at("s2", "plan", "Queue again?", 1));
    store.invalidate(&old, "replaced", None, Some(&new)).unwrap();

    let graph = build_graph(&store, &new, 1, Direction::Down).unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].relation, Relation::Supersedes);
    assert_eq!(graph.edges[0].to, old);

    let rendered = graph.render();
    assert!(rendered.contains("Distance 1:"));
    assert!(rendered.contains("supersedes"));
}

#[test]
fn unknown_root_is_not_found() {
    let (_tmp, store) = test_store();
    let err = build_graph(&store, "nope", 2, Direction::Both).unwrap_err();
    assert!(matches!(err, CapsuleError::NotFound(_)));
}
