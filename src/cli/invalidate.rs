use anyhow::{Context, Result};

use capsules::config::CapsulesConfig;

/// Invalidate a capsule and report the result.
pub fn invalidate(
    config: &CapsulesConfig,
    id: &str,
    reason: &str,
    learned: Option<&str>,
    superseded_by: Option<&str>,
) -> Result<()> {
    let store = config.open_store();
    let updated = store
        .invalidate(id, reason, learned, superseded_by)
        .with_context(|| format!("failed to invalidate {id}"))?;

    println!("Invalidated {}", updated.id);
    if let Some(ref newer) = updated.superseded_by {
        println!("  Superseded by: {newer}");
    }
    Ok(())
}
