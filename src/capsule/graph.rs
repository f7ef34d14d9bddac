//! Breadth-first dependency graph over `enables`, `constrains` and
//! `supersedes` relations.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::capsule::store::{CapsuleStore, ListFilter};
use crate::capsule::types::{truncate_preview, Capsule, Status};
use crate::error::{CapsuleError, Result};

pub const DEFAULT_DEPTH: usize = 2;

/// Which way to walk from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward what enabled, constrained, or superseded the capsule.
    Up,
    /// Toward what the capsule enabled, constrained, or superseded.
    Down,
    #[default]
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "" | "both" => Ok(Self::Both),
            other => Err(format!("unknown direction: {other} (expected up, down or both)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Enables,
    Constrains,
    Supersedes,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enables => "enables",
            Self::Constrains => "constrains",
            Self::Supersedes => "supersedes",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub relation: Relation,
}

impl GraphEdge {
    fn new(from: &str, to: &str, relation: Relation) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            relation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub session_id: String,
    pub phase: String,
    pub question: String,
    pub status: Status,
    /// Hops from the root.
    pub distance: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub root: String,
    pub depth: usize,
    pub direction: Direction,
    /// Nodes in discovery order; the root is first.
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl DependencyGraph {
    /// Plain-text rendering grouped by distance, each node followed by its
    /// outgoing edges.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Dependency graph for {} (depth {}, direction {})\n",
            self.root, self.depth, self.direction
        );
        let max = self.nodes.iter().map(|n| n.distance).max().unwrap_or(0);
        for distance in 0..=max {
            let level: Vec<&GraphNode> =
                self.nodes.iter().filter(|n| n.distance == distance).collect();
            if level.is_empty() {
                continue;
            }
            out.push_str(&format!("\nDistance {distance}:\n"));
            for node in level {
                let marker = if node.status == Status::Invalidated {
                    " [invalidated]"
                } else {
                    ""
                };
                out.push_str(&format!(
                    "  {} ({}){}: {}\n",
                    node.id,
                    node.phase,
                    marker,
                    truncate_preview(&node.question, 80)
                ));
                for edge in self.edges.iter().filter(|e| e.from == node.id) {
                    out.push_str(&format!("    {} -> {}\n", edge.relation, edge.to));
                }
            }
        }
        out
    }
}

/// Edges derived from one capsule's explicit fields and the inverses of its
/// `enabled_by` / `superseded_by`.
fn edges_of(c: &Capsule) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    for to in &c.enables {
        edges.push(GraphEdge::new(&c.id, to, Relation::Enables));
    }
    if let Some(ref parent) = c.enabled_by {
        edges.push(GraphEdge::new(parent, &c.id, Relation::Enables));
    }
    for to in &c.constrains {
        edges.push(GraphEdge::new(&c.id, to, Relation::Constrains));
    }
    for to in &c.supersedes {
        edges.push(GraphEdge::new(&c.id, to, Relation::Supersedes));
    }
    if let Some(ref newer) = c.superseded_by {
        edges.push(GraphEdge::new(newer, &c.id, Relation::Supersedes));
    }
    edges
}

/// Adjacency built once per call from every active capsule.
#[derive(Default)]
struct EdgeIndex {
    outgoing: HashMap<String, Vec<GraphEdge>>,
    incoming: HashMap<String, Vec<GraphEdge>>,
}

impl EdgeIndex {
    fn build<'a>(capsules: impl Iterator<Item = &'a Capsule>) -> Self {
        let mut index = Self::default();
        for capsule in capsules {
            for edge in edges_of(capsule) {
                index.add(edge);
            }
        }
        index
    }

    fn add(&mut self, edge: GraphEdge) {
        let out = self.outgoing.entry(edge.from.clone()).or_default();
        if !out.contains(&edge) {
            out.push(edge.clone());
        }
        let inc = self.incoming.entry(edge.to.clone()).or_default();
        if !inc.contains(&edge) {
            inc.push(edge);
        }
    }

    /// Edges touching `node` in the walk direction, with the node's own
    /// fields included even if it is invalidated.
    fn adjacent(&self, node: &Capsule, direction: Direction) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = Vec::new();
        let own = edges_of(node);
        let down = matches!(direction, Direction::Down | Direction::Both);
        let up = matches!(direction, Direction::Up | Direction::Both);
        let candidates = own
            .into_iter()
            .chain(self.outgoing.get(&node.id).into_iter().flatten().cloned())
            .chain(self.incoming.get(&node.id).into_iter().flatten().cloned());
        for edge in candidates {
            let wanted = (down && edge.from == node.id) || (up && edge.to == node.id);
            if wanted && !edges.contains(&edge) {
                edges.push(edge);
            }
        }
        edges
    }
}

/// Walk the dependency graph from `root_id` up to `depth` hops.
///
/// Each node is visited once at its first-reached distance. Edges found
/// while expanding a node are kept even when the neighbour was already
/// visited. Nodes at the depth limit are not expanded, so edges between two
/// frontier nodes are not reported.
pub fn build_graph(
    store: &CapsuleStore,
    root_id: &str,
    depth: usize,
    direction: Direction,
) -> Result<DependencyGraph> {
    let all: HashMap<String, Capsule> = store
        .list(&ListFilter::everything())?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();
    let root = all
        .get(root_id)
        .ok_or_else(|| CapsuleError::NotFound(root_id.to_string()))?;
    let index = EdgeIndex::build(all.values().filter(|c| c.is_active()));

    let mut nodes = vec![node(root, 0)];
    let mut edges: Vec<GraphEdge> = Vec::new();
    let mut seen_edges: HashSet<GraphEdge> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut queue: VecDeque<(&Capsule, usize)> = VecDeque::from([(root, 0)]);

    while let Some((current, distance)) = queue.pop_front() {
        if distance >= depth {
            continue;
        }
        for edge in index.adjacent(current, direction) {
            let neighbour_id = if edge.from == current.id { &edge.to } else { &edge.from };
            let Some(neighbour) = all.get(neighbour_id) else {
                tracing::debug!(from = %current.id, missing = %neighbour_id, "skipping dangling edge");
                continue;
            };
            if visited.insert(neighbour.id.clone()) {
                nodes.push(node(neighbour, distance + 1));
                queue.push_back((neighbour, distance + 1));
            }
            if seen_edges.insert(edge.clone()) {
                edges.push(edge);
            }
        }
    }

    tracing::debug!(root = root_id, nodes = nodes.len(), edges = edges.len(), "graph built");
    Ok(DependencyGraph {
        root: root_id.to_string(),
        depth,
        direction,
        nodes,
        edges,
    })
}

fn node(c: &Capsule, distance: usize) -> GraphNode {
    GraphNode {
        id: c.id.clone(),
        session_id: c.session_id.clone(),
        phase: c.phase.clone(),
        question: c.question.clone(),
        status: c.status,
        distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _tmp: tempfile::TempDir,
        store: CapsuleStore,
        ids: Vec<String>,
    }

    /// a enables b enables c enables d; e constrains b.
    fn chain() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let store = CapsuleStore::new(tmp.path());
        let mut ids = Vec::new();
        let mut parent: Option<String> = None;
        for q in ["A?", "B?", "C?", "D?"] {
            let mut c = Capsule::new("s1", "plan", q, "yes");
            c.enabled_by = parent.clone();
            store.store(c.clone()).unwrap();
            parent = Some(c.id.clone());
            ids.push(c.id);
        }
        let mut e = Capsule::new("s1", "plan", "E?", "yes");
        e.constrains = vec![ids[1].clone()];
        store.store(e.clone()).unwrap();
        ids.push(e.id);
        Fixture {
            _tmp: tmp,
            store,
            ids,
        }
    }

    fn node_ids(graph: &DependencyGraph) -> Vec<&str> {
        graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn depth_one_down_stops_at_first_hop() {
        let f = chain();
        let graph = build_graph(&f.store, &f.ids[0], 1, Direction::Down).unwrap();
        assert_eq!(node_ids(&graph), vec![f.ids[0].as_str(), f.ids[1].as_str()]);
        assert!(graph.nodes.iter().all(|n| n.distance <= 1));
        assert_eq!(graph.edges, vec![GraphEdge::new(&f.ids[0], &f.ids[1], Relation::Enables)]);
    }

    #[test]
    fn up_walks_toward_enablers_and_constraints() {
        let f = chain();
        let graph = build_graph(&f.store, &f.ids[2], 2, Direction::Up).unwrap();
        let ids = node_ids(&graph);
        assert!(ids.contains(&f.ids[1].as_str()));
        assert!(ids.contains(&f.ids[0].as_str()));
        assert!(ids.contains(&f.ids[4].as_str()));
        assert!(!ids.contains(&f.ids[3].as_str()));
    }

    #[test]
    fn both_directions_by_default() {
        let f = chain();
        let graph = build_graph(&f.store, &f.ids[1], DEFAULT_DEPTH, Direction::default()).unwrap();
        assert_eq!(graph.nodes.len(), 5);
        let d = graph.nodes.iter().find(|n| n.id == f.ids[3]).unwrap();
        assert_eq!(d.distance, 2);
    }

    #[test]
    fn frontier_edges_are_not_reported() {
        let f = chain();
        // b sits on the frontier at depth 1, so its e -> b edge is never seen.
        let graph = build_graph(&f.store, &f.ids[0], 1, Direction::Both).unwrap();
        assert!(!graph.edges.iter().any(|e| e.relation == Relation::Constrains));
    }

    #[test]
    fn supersession_edges_include_invalidated_nodes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CapsuleStore::new(tmp.path());
        let old = Capsule::new("s1", "plan", "Old?", "x");
        let new = Capsule::new("s1", "plan", "New?", "y");
        store.store(old.clone()).unwrap();
        store.store(new.clone()).unwrap();
        store.invalidate(&old.id, "replaced", None, Some(&new.id)).unwrap();

        let graph = build_graph(&store, &old.id, 1, Direction::Up).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[0].status, Status::Invalidated);
        assert_eq!(graph.edges, vec![GraphEdge::new(&new.id, &old.id, Relation::Supersedes)]);
    }

    #[test]
    fn missing_root_and_dangling_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CapsuleStore::new(tmp.path());
        assert!(build_graph(&store, "nope", 2, Direction::Both)
            .unwrap_err()
            .is_not_found());

        let mut c = Capsule::new("s1", "plan", "Q?", "x");
        c.constrains = vec!["ghost".into()];
        store.store(c.clone()).unwrap();
        let graph = build_graph(&store, &c.id, 2, Direction::Both).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn render_groups_by_distance() {
        let f = chain();
        let text = build_graph(&f.store, &f.ids[0], 2, Direction::Down)
            .unwrap()
            .render();
        assert!(text.contains("Distance 0:"));
        assert!(text.contains("Distance 2:"));
        assert!(text.contains(&format!("enables -> {}", f.ids[1])));
    }

    #[test]
    fn parse_direction() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("".parse::<Direction>().unwrap(), Direction::Both);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
