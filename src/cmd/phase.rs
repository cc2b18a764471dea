//! The phase advance command.

use anyhow::Result;
use std::path::Path;

pub fn cmd_advance(project_dir: &Path, target_phase: i64) -> Result<()> {
    use foreman::config::Config;
    use foreman::engine::{TransitionEngine, TransitionOutcome};
    use foreman::errors::EngineError;
    use foreman::phase::{phase_name, tracked_participants};

    let config = Config::load(project_dir)?;
    let mut store = config.open_store()?;
    let parser = config.parser();

    let mut engine = TransitionEngine::new(store.as_mut(), parser.as_ref(), &config.project_root);
    let outcome = match engine.advance(target_phase) {
        Ok(outcome) => outcome,
        Err(EngineError::NoActiveProject) => {
            println!("No active project. Run 'foreman init' first.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    match outcome {
        TransitionOutcome::Rejected { phase, defects } => {
            println!();
            println!(
                "{}",
                console::style(format!("Phase {} validation FAILED", phase)).red().bold()
            );
            println!();
            println!("Found {} issues that must be fixed before advancing:", defects.len());
            println!();
            for (i, defect) in defects.iter().enumerate() {
                println!("  {}. {}", i + 1, defect);
            }
            println!();
            println!("Fix these issues and try again.");
            std::process::exit(1);
        }
        TransitionOutcome::Advanced { from, to, warning } => {
            match warning {
                Some(warning) => {
                    println!("{} {}", console::style("Warning:").yellow().bold(), warning)
                }
                None if from > 0 => println!(
                    "{}",
                    console::style(format!("Phase {} validation PASSED", from)).green()
                ),
                None => {}
            }
            println!();
            println!("Advanced to phase {}: {}", to, phase_name(to).unwrap_or("unknown"));

            let participants = tracked_participants(to).unwrap_or_default();
            if participants.is_empty() {
                println!("Orchestrator-only phase; no agents reset.");
            } else {
                println!("Agents reset to IN_PROGRESS: {}", participants.join(", "));
            }
        }
    }

    Ok(())
}
