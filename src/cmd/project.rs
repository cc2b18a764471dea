//! Project initialization, status, and agent update commands.

use anyhow::Result;
use std::path::Path;

pub fn cmd_init(project_dir: &Path, name: Option<&str>, version: Option<&str>) -> Result<()> {
    use foreman::config::Config;
    use foreman::phase::{AGENT_ROSTER, all_phases};

    let config = Config::load(project_dir)?;
    let mut store = config.open_store()?;

    if let Some(project) = store.get_active_project()? {
        println!(
            "Project already tracked: {} v{} (phase {}, {})",
            project.name, project.version, project.current_phase, project.status
        );
        return Ok(());
    }

    let name = name.unwrap_or(&config.default_name);
    let version = version.unwrap_or(&config.default_version);
    let project_id = store.create_project(name, version)?;

    println!("Initialized project '{}' v{} (project {})", name, version, project_id);
    println!("State directory: {}", config.state_dir.display());
    println!();
    println!(
        "{} agents ready across {} phases. Run 'foreman status' to inspect.",
        AGENT_ROSTER.len(),
        all_phases().len()
    );
    Ok(())
}

pub fn cmd_status(project_dir: &Path) -> Result<()> {
    use foreman::config::Config;
    use foreman::models::ProjectStatus;
    use foreman::phase::phase_name;

    let config = Config::load(project_dir)?;
    let store = config.open_store()?;

    println!();
    println!("Foreman Project Status");
    println!("======================");
    println!();

    let Some(project) = store.get_active_project()? else {
        println!("No active project.");
        println!();
        println!("Run 'foreman init' to start tracking one.");
        println!();
        return Ok(());
    };

    let status = match project.status {
        ProjectStatus::Completed => console::style(project.status.as_str()).green(),
        ProjectStatus::Failed => console::style(project.status.as_str()).red(),
        ProjectStatus::InProgress => console::style(project.status.as_str()).cyan(),
        ProjectStatus::Initialized => console::style(project.status.as_str()).dim(),
    };

    println!("Project:  {} v{}", project.name, project.version);
    println!("Status:   {}", status);
    match phase_name(project.current_phase) {
        Some(name) => println!("Phase:    {} - {}", project.current_phase, name),
        None => println!("Phase:    {}", project.current_phase),
    }
    if let Some(ref feature) = project.current_feature {
        println!("Feature:  {}", feature);
    }
    println!("Progress: {}", project.overall_progress);
    if let Some(ref started) = project.started_at {
        println!("Started:  {}", started);
    }
    println!();

    let agents = store.get_agents(project.id)?;
    println!("{:<12} {:<16} {:<13} {:<9} Todos", "Agent", "Phase", "Status", "Progress");
    println!("{:<12} {:<16} {:<13} {:<9} -----", "-----", "-----", "------", "--------");
    for agent in &agents {
        println!(
            "{:<12} {:<16} {:<13} {:<9} {}/{}",
            agent.name,
            agent.phase,
            agent.status,
            agent.progress,
            agent.todos_completed,
            agent.todos_total
        );
    }
    println!();

    let timeline = store.get_phase_timeline(project.id)?;
    if !timeline.is_empty() {
        println!("Phase timeline:");
        for entry in &timeline {
            let name = phase_name(entry.phase_number).unwrap_or("unknown");
            match (entry.started_at.as_deref(), entry.completed_at.as_deref()) {
                (Some(started), Some(completed)) => match entry.duration_minutes {
                    Some(minutes) => println!(
                        "  Phase {} ({}): {} -> {} [{} min]",
                        entry.phase_number, name, started, completed, minutes
                    ),
                    None => println!(
                        "  Phase {} ({}): {} -> {}",
                        entry.phase_number, name, started, completed
                    ),
                },
                (Some(started), None) => {
                    println!("  Phase {} ({}): started {}", entry.phase_number, name, started)
                }
                (None, Some(completed)) => {
                    println!("  Phase {} ({}): completed {}", entry.phase_number, name, completed)
                }
                (None, None) => {}
            }
        }
        println!();
    }

    Ok(())
}

pub fn cmd_agent(
    project_dir: &Path,
    name: &str,
    status: Option<&str>,
    progress: Option<&str>,
    todos_completed: Option<i64>,
    todos_total: Option<i64>,
) -> Result<()> {
    use foreman::config::Config;
    use foreman::store::AgentUpdate;

    let config = Config::load(project_dir)?;
    let mut store = config.open_store()?;

    let Some(project) = store.get_active_project()? else {
        println!("No active project. Run 'foreman init' first.");
        std::process::exit(1);
    };

    let update = AgentUpdate {
        status: status.map(str::to_string),
        progress: progress.map(str::to_string),
        todos_completed,
        todos_total,
        ..Default::default()
    };
    store.update_agent(project.id, name, &update)?;

    if let Some(agent) = store.get_agent(project.id, name)? {
        println!(
            "Updated {}: {} at {} (todos {}/{})",
            agent.name, agent.status, agent.progress, agent.todos_completed, agent.todos_total
        );
    }
    Ok(())
}
