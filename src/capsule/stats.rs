use serde::Serialize;
use std::collections::BTreeMap;

use crate::capsule::store::{CapsuleStore, ListFilter};
use crate::capsule::types::{Capsule, CapsuleType};
use crate::error::Result;

/// Response from capsule_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_capsules: u64,
    pub active_capsules: u64,
    pub invalidated_capsules: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_phase: BTreeMap<String, u64>,
    pub sessions: u64,
    pub linked_commits: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_capsule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_capsule: Option<String>,
}

/// Compute store statistics over every revision of every capsule.
///
/// If `session` is provided, counts are limited to that session.
pub fn capsule_stats(store: &CapsuleStore, session: Option<&str>) -> Result<StatsResponse> {
    let capsules = store.list(&ListFilter {
        session: session.map(String::from),
        ..ListFilter::everything()
    })?;
    let sessions = match session {
        Some(_) => u64::from(!capsules.is_empty()),
        None => store.session_ids()?.len() as u64,
    };
    Ok(summarize(&capsules, sessions))
}

fn summarize(capsules: &[Capsule], sessions: u64) -> StatsResponse {
    let total = capsules.len() as u64;
    let active = capsules.iter().filter(|c| c.is_active()).count() as u64;

    let mut by_type = BTreeMap::new();
    for t in [CapsuleType::Decision, CapsuleType::Finding] {
        by_type.insert(t.to_string(), 0);
    }
    let mut by_phase = BTreeMap::new();
    for c in capsules {
        *by_type.entry(c.kind.to_string()).or_insert(0) += 1;
        *by_phase.entry(c.phase.to_lowercase()).or_insert(0) += 1;
    }

    let linked_commits = capsules.iter().map(|c| c.commits.len() as u64).sum();
    let oldest = capsules.iter().filter_map(|c| c.created_at).min();
    let newest = capsules.iter().filter_map(|c| c.created_at).max();

    StatsResponse {
        total_capsules: total,
        active_capsules: active,
        invalidated_capsules: total - active,
        by_type,
        by_phase,
        sessions,
        linked_commits,
        oldest_capsule: oldest.map(|t| t.to_rfc3339()),
        newest_capsule: newest.map(|t| t.to_rfc3339()),
    }
}
