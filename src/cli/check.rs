use anyhow::Result;

use capsules::capsule::similarity::Proposal;
use capsules::capsule::store::ListFilter;
use capsules::config::CapsulesConfig;

/// Check a proposed question/choice for duplicates and contradictions.
pub fn check(
    config: &CapsulesConfig,
    question: &str,
    choice: &str,
    session: Option<String>,
) -> Result<()> {
    let store = config.open_store();
    let existing = store.list(&ListFilter {
        session,
        ..ListFilter::default()
    })?;
    let checker = config.similarity_checker();

    let Some(result) = checker.check(&existing, &Proposal::new(question, choice)) else {
        println!("No similar capsules. Suggested action: create");
        return Ok(());
    };

    if !result.similar.is_empty() {
        println!("Similar:");
        for m in &result.similar {
            let exact = if m.exact { ", exact" } else { "" };
            println!(
                "  {} ({:.2}, {:?}{exact}) {}",
                m.id, m.similarity, m.confidence, m.question
            );
        }
    }
    if !result.contradicting.is_empty() {
        println!("Contradicting:");
        for m in &result.contradicting {
            println!("  {} ({:.2}) {} -> {}", m.id, m.similarity, m.question, m.choice);
        }
    }
    println!("Suggested action: {}", result.suggested_action);
    Ok(())
}
