//! CLI `doctor` command — parse every session file and print a health report.

use anyhow::Result;

use capsules::config::CapsulesConfig;
use capsules::sources::{RepoRegistry, TomlRepoRegistry};

/// Parse every session file, check the repo registry, and print a report.
pub fn doctor(config: &CapsulesConfig) -> Result<()> {
    let root = config.resolved_root();
    let sessions_dir = config.sessions_dir();

    println!("Capsules Health Report");
    println!("======================");
    println!();
    println!("Root:              {}", root.display());

    if !sessions_dir.exists() {
        println!("Sessions:          not found at {}", sessions_dir.display());
        println!("Run `capsules serve` or record a capsule to initialize.");
        return Ok(());
    }

    let store = config.open_store();
    let mut ok = 0usize;
    let mut capsule_count = 0usize;
    let mut broken = Vec::new();
    for session in store.session_ids()? {
        match store.load_session(&session) {
            Ok(capsules) => {
                ok += 1;
                capsule_count += capsules.map_or(0, |c| c.len());
            }
            Err(e) => broken.push((session, e)),
        }
    }
    println!("Session files:     {} ok, {} malformed", ok, broken.len());
    println!("Capsules:          {capsule_count}");

    println!();
    match TomlRepoRegistry::load(config.repos_path()) {
        Ok(registry) => {
            let ids = registry.repo_ids();
            println!("Repo registry:     {} repo(s)", ids.len());
            for id in ids {
                let status = match registry.repo_path(&id) {
                    Ok(path) if path.join(".git").exists() => format!("{} (git)", path.display()),
                    Ok(path) if path.exists() => format!("{} (not a git checkout)", path.display()),
                    Ok(path) => format!("{} (missing)", path.display()),
                    Err(e) => e.to_string(),
                };
                println!("  {id:<16} {status}");
            }
        }
        Err(e) => println!("Repo registry:     FAILED ({e})"),
    }

    if !broken.is_empty() {
        println!();
        println!("Malformed sessions:");
        for (session, e) in &broken {
            println!("  {session}: {e}");
        }
        println!();
        println!("Recovery steps:");
        println!("  1. Fix the YAML front matter at the top of each file listed above");
        println!("  2. Run `capsules doctor` again to confirm");
    }

    Ok(())
}
