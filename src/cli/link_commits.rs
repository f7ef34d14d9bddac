use anyhow::{bail, Result};

use capsules::config::CapsulesConfig;

/// Attach commits to one capsule or to every active capsule of a session.
pub fn link_commits(
    config: &CapsulesConfig,
    id: Option<&str>,
    session: Option<&str>,
    commits: &[String],
) -> Result<()> {
    if commits.is_empty() {
        bail!("no commits given");
    }
    let store = config.open_store();
    let result = match (id, session) {
        (Some(id), None) => store.link_commits(id, commits)?,
        (None, Some(session)) => store.link_commits_for_session(session, commits)?,
        _ => bail!("provide exactly one of --id or --session"),
    };
    println!(
        "Linked {} new commit reference(s) across {} capsule(s)",
        result.commits_added, result.capsules_updated
    );
    Ok(())
}
