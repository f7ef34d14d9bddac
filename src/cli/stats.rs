use anyhow::Result;

use capsules::capsule::stats::capsule_stats;
use capsules::config::CapsulesConfig;

/// Display capsule statistics in the terminal.
pub fn stats(config: &CapsulesConfig, session: Option<&str>) -> Result<()> {
    let store = config.open_store();
    let response = capsule_stats(&store, session)?;

    println!("Capsule Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total capsules:      {}", response.total_capsules);
    println!("  Active:              {}", response.active_capsules);
    println!("  Invalidated:         {}", response.invalidated_capsules);
    println!("  Sessions:            {}", response.sessions);
    println!("  Linked commits:      {}", response.linked_commits);
    println!();

    println!("By Type:");
    for (t, count) in &response.by_type {
        println!("  {:<12} {}", t, count);
    }
    println!();

    println!("By Phase:");
    let order = store.phase_order();
    let mut phases: Vec<(&String, &u64)> = response.by_phase.iter().collect();
    phases.sort_by_key(|(p, _)| (order.rank(p) == 0, order.rank(p), p.to_string()));
    for (p, count) in phases {
        println!("  {:<12} {}", p, count);
    }

    if let Some(ref oldest) = response.oldest_capsule {
        println!();
        println!("Oldest capsule:        {oldest}");
    }
    if let Some(ref newest) = response.newest_capsule {
        println!("Newest capsule:        {newest}");
    }

    Ok(())
}
