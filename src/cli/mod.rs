pub mod check;
pub mod doctor;
pub mod graph;
pub mod inspect;
pub mod invalidate;
pub mod link_commits;
pub mod list;
pub mod recall;
pub mod stats;
pub mod tags;

use capsules::capsule::types::{truncate_preview, Capsule};

/// One capsule as a two-line terminal entry.
pub(crate) fn print_capsule_line(c: &Capsule) {
    let status = if c.is_active() { "" } else { " [invalidated]" };
    println!("  {} ({}, {}){}", c.id, c.phase, c.kind, status);
    println!(
        "     {} -> {}",
        truncate_preview(&c.question, 100),
        truncate_preview(&c.choice, 80)
    );
}
