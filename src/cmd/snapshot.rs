//! Event log and snapshot exchange commands.

use anyhow::{Context, Result};
use std::path::Path;

pub fn cmd_events(project_dir: &Path, limit: usize) -> Result<()> {
    use foreman::config::Config;

    let config = Config::load(project_dir)?;
    let store = config.open_store()?;

    let Some(project) = store.get_active_project()? else {
        println!("No active project. Run 'foreman init' first.");
        return Ok(());
    };

    let events = store.get_events(project.id, limit)?;
    if events.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    for event in &events {
        let agent = event.agent_name.as_deref().unwrap_or("-");
        println!("{}  {:<16} {:<10} {}", event.timestamp, event.event_type, agent, event.data);
    }
    Ok(())
}

pub fn cmd_export(project_dir: &Path, output: Option<&Path>) -> Result<()> {
    use foreman::config::Config;

    let config = Config::load(project_dir)?;
    let store = config.open_store()?;

    let Some(project) = store.get_active_project()? else {
        println!("No active project. Run 'foreman init' first.");
        std::process::exit(1);
    };

    let snapshot = store.export_snapshot(project.id)?;
    let doc = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;

    match output {
        Some(path) => {
            std::fs::write(path, &doc)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported snapshot of '{}' to {}", snapshot.project, path.display());
        }
        None => println!("{}", doc),
    }
    Ok(())
}

pub fn cmd_import(project_dir: &Path, file: &Path) -> Result<()> {
    use foreman::config::Config;
    use foreman::models::Snapshot;

    let config = Config::load(project_dir)?;
    let mut store = config.open_store()?;

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid snapshot document in {}", file.display()))?;

    let project_id = store.import_snapshot(&snapshot)?;
    println!(
        "Imported project '{}' as project {} (phase {})",
        snapshot.project, project_id, snapshot.current_phase
    );
    Ok(())
}
