//! CLI `show` command — display full details for a single capsule.

use anyhow::Result;

use capsules::config::CapsulesConfig;

/// Show a single capsule by ID, with its supersession neighbours.
pub fn inspect(config: &CapsulesConfig, id: &str, json: bool) -> Result<()> {
    let store = config.open_store();
    let chain = store.get_chain(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
        return Ok(());
    }

    let c = &chain.capsule;
    println!("Capsule: {}", c.id);
    println!("{}", "=".repeat(50));
    println!("  Session:        {}", c.session_id);
    println!("  Phase:          {}", c.phase);
    println!("  Type:           {}", c.kind);
    println!("  Status:         {}", c.status);
    println!("  Origin:         {}", c.origin);
    if let Some(confirmation) = c.confirmation {
        println!("  Confirmation:   {confirmation}");
    }
    if let Some(created) = c.created_at {
        println!("  Created:        {}", created.to_rfc3339());
    }
    if let Some(invalidated) = c.invalidated_at {
        println!("  Invalidated:    {}", invalidated.to_rfc3339());
    }
    if let Some(ref reason) = c.invalidation_reason {
        println!("  Reason:         {reason}");
    }
    if let Some(ref learned) = c.learned {
        println!("  Learned:        {learned}");
    }
    println!();
    println!("Question:");
    println!("  {}", c.question);
    println!("Choice:");
    println!("  {}", c.choice);
    if !c.rationale.is_empty() {
        println!("Rationale:");
        println!("  {}", c.rationale);
    }

    let lists = [
        ("Alternatives", &c.alternatives),
        ("Tags", &c.tags),
        ("Repos", &c.repos),
        ("Commits", &c.commits),
        ("Enables", &c.enables),
        ("Constrains", &c.constrains),
    ];
    for (label, values) in lists {
        if !values.is_empty() {
            println!("{label}: {}", values.join(", "));
        }
    }
    if let Some(ref parent) = c.enabled_by {
        println!("Enabled by: {parent}");
    }

    if !chain.supersedes.is_empty() {
        println!();
        println!("Supersedes:");
        for old in &chain.supersedes {
            println!("  <-- {} ({})", old.id, old.preview());
        }
    }
    if let Some(ref newer) = chain.superseded_by {
        println!();
        println!("Superseded by:");
        println!("  --> {} ({})", newer.id, newer.preview());
    }

    if !c.challenges.is_empty() {
        println!();
        println!("Challenges:");
        for ch in &c.challenges {
            let learned = ch.learned.as_deref().unwrap_or("");
            println!(
                "  {} [{}] {} {}",
                ch.timestamp.to_rfc3339(),
                ch.resolution,
                ch.reason,
                learned
            );
        }
    }

    Ok(())
}
