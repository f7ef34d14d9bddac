use anyhow::Result;

use capsules::config::CapsulesConfig;

/// Print tag usage across active capsules.
pub fn tags(config: &CapsulesConfig, prefix: Option<&str>) -> Result<()> {
    let store = config.open_store();
    let tags = store.list_tags(prefix)?;

    if tags.is_empty() {
        println!("No tags found.");
        return Ok(());
    }
    for t in &tags {
        println!("  {:>5}  {}", t.count, t.tag);
    }
    Ok(())
}
