use anyhow::Result;

use capsules::capsule::recall::{format_context, format_terminal, RecallQuery};
use capsules::config::CapsulesConfig;

/// Run a recall query from the terminal.
///
/// With `budget` set, prints the token-budgeted context block instead of the
/// one-line-per-hit listing.
pub fn recall(config: &CapsulesConfig, mut query: RecallQuery, budget: Option<usize>) -> Result<()> {
    if query.repo.is_none() {
        query.repo = config.recall.default_repo.clone();
    }
    let engine = config.recall_engine()?;
    let result = engine.query(&query)?;

    match budget {
        Some(tokens) => print!("{}", format_context(&result, tokens)),
        None => print!("{}", format_terminal(&result)),
    }
    Ok(())
}
