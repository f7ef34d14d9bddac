use anyhow::Result;

use capsules::capsule::graph::{build_graph, Direction};
use capsules::config::CapsulesConfig;

/// Print the dependency graph around a capsule.
pub fn graph(
    config: &CapsulesConfig,
    id: &str,
    depth: Option<usize>,
    direction: Direction,
    json: bool,
) -> Result<()> {
    let store = config.open_store();
    let depth = depth.unwrap_or(config.graph.default_depth);
    let graph = build_graph(&store, id, depth, direction)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        print!("{}", graph.render());
    }
    Ok(())
}
