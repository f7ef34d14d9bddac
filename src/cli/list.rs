use anyhow::Result;

use capsules::capsule::store::ListFilter;
use capsules::config::CapsulesConfig;

/// List capsules matching `filter`, newest first.
pub fn list(config: &CapsulesConfig, filter: &ListFilter, limit: usize, json: bool) -> Result<()> {
    let store = config.open_store();
    let mut capsules = store.list(filter)?;
    let total = capsules.len();
    capsules.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&capsules)?);
        return Ok(());
    }
    if capsules.is_empty() {
        println!("No capsules found.");
        return Ok(());
    }

    println!("Showing {} of {} capsule(s)\n", capsules.len(), total);
    for c in &capsules {
        super::print_capsule_line(c);
    }
    Ok(())
}
