//! The phase transition engine.
//!
//! Ties the gates to the store: a transition out of the current phase first
//! runs that phase's completion validator, and only a clean report lets the
//! target phase begin. Rejection is an outcome, not an error; nothing in the
//! store changes on a rejected transition. A validator that cannot run at
//! all (for example a current phase with no validator after a corrupt
//! import) must not wedge the workflow, so the engine proceeds and surfaces
//! a warning instead.

use std::path::PathBuf;

use crate::errors::EngineError;
use crate::gates::{self, DocParser};
use crate::phase;
use crate::store::{PhaseChange, StateStore};
use crate::util;

/// What a call to [`TransitionEngine::advance`] did.
#[derive(Debug)]
pub enum TransitionOutcome {
    Advanced {
        from: i64,
        to: i64,
        /// Set when the current phase's validator faulted and the
        /// transition went through unvalidated.
        warning: Option<String>,
    },
    Rejected {
        phase: i64,
        defects: Vec<String>,
    },
}

pub struct TransitionEngine<'a> {
    store: &'a mut dyn StateStore,
    parser: &'a dyn DocParser,
    project_root: PathBuf,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(
        store: &'a mut dyn StateStore,
        parser: &'a dyn DocParser,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self { store, parser, project_root: project_root.into() }
    }

    /// Attempts to move the active project to `target_phase`.
    ///
    /// The target must be a defined phase. The current phase's gate runs
    /// first unless the project sits at the pre-initialization sentinel 0;
    /// open defects reject the transition with the store untouched. On
    /// success the target phase gets a timeline start stamp and every
    /// tracked agent in its roster is reset to IN_PROGRESS at 0%.
    pub fn advance(&mut self, target_phase: i64) -> Result<TransitionOutcome, EngineError> {
        let participants = phase::tracked_participants(target_phase)
            .ok_or(EngineError::UnknownPhase { number: target_phase })?;

        let project =
            self.store.get_active_project()?.ok_or(EngineError::NoActiveProject)?;

        let mut warning = None;
        if project.current_phase > 0 {
            match gates::validate_phase(project.current_phase, &self.project_root, self.parser) {
                Ok(report) if !report.passed => {
                    return Ok(TransitionOutcome::Rejected {
                        phase: report.phase,
                        defects: report.defects,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        phase = project.current_phase,
                        error = %e,
                        "validator fault, proceeding with transition"
                    );
                    warning = Some(format!(
                        "Validator for phase {} did not run: {:#}",
                        project.current_phase, e
                    ));
                }
            }
        }

        let change = PhaseChange {
            target_phase,
            started_at: util::now_rfc3339(),
            reset_agents: participants.iter().map(|a| a.to_string()).collect(),
        };
        self.store.commit_transition(project.id, &change)?;

        tracing::info!(from = project.current_phase, to = target_phase, "phase transition committed");

        Ok(TransitionOutcome::Advanced { from: project.current_phase, to: target_phase, warning })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::SerdeDocParser;
    use crate::models::{AGENT_STATUS_IN_PROGRESS, DEFAULT_AGENT_STATUS};
    use crate::store::{ProjectUpdate, SqliteStore};
    use anyhow::Result;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn store_with_project() -> Result<(SqliteStore, i64)> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;
        Ok((store, id))
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn plant_phase1(root: &Path) {
        write(root, "agents/architect/output/architecture.md", &"# Arch\n".repeat(200));
        write(
            root,
            "agents/architect/output/api.openapi.yaml",
            "openapi: 3.0.0\ninfo:\n  title: t\npaths:\n  /users: {}\n",
        );
        write(
            root,
            "agents/architect/output/database_schema.prisma",
            &"model User { id Int @id }\n".repeat(5),
        );
        write(root, "agents/architect/output/report.json", r#"{"status": "COMPLETED"}"#);
        write(root, "agents/planner/output/execution_plan.json", r#"{"phases": [1]}"#);
        write(root, "agents/planner/output/task_list.json", r#"{"tasks": ["t1"]}"#);
        write(root, "agents/planner/output/report.json", r#"{"status": "COMPLETED"}"#);
    }

    fn plant_phase4(root: &Path) {
        write(root, "backend/Dockerfile", "FROM node:20");
        write(root, "frontend/Dockerfile", "FROM node:20");
        write(root, "docker-compose.yml", "services: {}");
        write(root, ".github/workflows/ci.yml", "on: push");
    }

    #[test]
    fn test_rejected_transition_mutates_nothing() -> Result<()> {
        let (mut store, id) = store_with_project()?;
        let root = TempDir::new()?;

        let outcome =
            TransitionEngine::new(&mut store, &SerdeDocParser, root.path()).advance(2)?;
        match outcome {
            TransitionOutcome::Rejected { phase, defects } => {
                assert_eq!(phase, 1);
                assert_eq!(defects.len(), 7);
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let project = store.get_project(id)?.unwrap();
        assert_eq!(project.current_phase, 1);
        assert!(store.get_phase_timeline(id)?.is_empty());
        for agent in store.get_agents(id)? {
            assert_eq!(agent.status, DEFAULT_AGENT_STATUS);
        }
        assert_eq!(store.get_events(id, 10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_clean_gate_advances_and_stamps_timeline() -> Result<()> {
        let (mut store, id) = store_with_project()?;
        let root = TempDir::new()?;
        plant_phase1(root.path());

        let outcome =
            TransitionEngine::new(&mut store, &SerdeDocParser, root.path()).advance(2)?;
        match outcome {
            TransitionOutcome::Advanced { from, to, warning } => {
                assert_eq!(from, 1);
                assert_eq!(to, 2);
                assert!(warning.is_none());
            }
            other => panic!("expected advance, got {:?}", other),
        }

        let project = store.get_project(id)?.unwrap();
        assert_eq!(project.current_phase, 2);
        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].phase_number, 2);

        // Phase 2 belongs to the orchestrator alone, so no stored agent is
        // reset and no update events are logged.
        for agent in store.get_agents(id)? {
            assert_eq!(agent.status, DEFAULT_AGENT_STATUS);
        }
        assert_eq!(store.get_events(id, 10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_advance_resets_target_roster() -> Result<()> {
        let (mut store, id) = store_with_project()?;
        let root = TempDir::new()?;
        plant_phase4(root.path());
        store.update_project(id, &ProjectUpdate { current_phase: Some(4), ..Default::default() })?;

        let outcome =
            TransitionEngine::new(&mut store, &SerdeDocParser, root.path()).advance(5)?;
        assert!(matches!(outcome, TransitionOutcome::Advanced { from: 4, to: 5, .. }));

        let docs = store.get_agent(id, "docs")?.unwrap();
        assert_eq!(docs.status, AGENT_STATUS_IN_PROGRESS);
        assert_eq!(docs.progress, "0%");
        let backend = store.get_agent(id, "backend")?.unwrap();
        assert_eq!(backend.status, DEFAULT_AGENT_STATUS);
        Ok(())
    }

    #[test]
    fn test_undefined_target_is_typed_error() -> Result<()> {
        let (mut store, id) = store_with_project()?;
        let root = TempDir::new()?;

        let err = TransitionEngine::new(&mut store, &SerdeDocParser, root.path())
            .advance(9)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownPhase { number: 9 }));

        // Checked before any gate runs or store write happens.
        assert_eq!(store.get_project(id)?.unwrap().current_phase, 1);
        assert!(store.get_phase_timeline(id)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_validator_fault_proceeds_with_warning() -> Result<()> {
        let (mut store, id) = store_with_project()?;
        let root = TempDir::new()?;
        store.update_project(id, &ProjectUpdate { current_phase: Some(9), ..Default::default() })?;

        let outcome =
            TransitionEngine::new(&mut store, &SerdeDocParser, root.path()).advance(1)?;
        match outcome {
            TransitionOutcome::Advanced { from, to, warning } => {
                assert_eq!(from, 9);
                assert_eq!(to, 1);
                let warning = warning.unwrap();
                assert!(warning.contains("phase 9"));
            }
            other => panic!("expected advance, got {:?}", other),
        }

        let architect = store.get_agent(id, "architect")?.unwrap();
        assert_eq!(architect.status, AGENT_STATUS_IN_PROGRESS);
        Ok(())
    }

    #[test]
    fn test_sentinel_phase_skips_validation_quietly() -> Result<()> {
        let (mut store, id) = store_with_project()?;
        let root = TempDir::new()?;
        store.update_project(id, &ProjectUpdate { current_phase: Some(0), ..Default::default() })?;

        let outcome =
            TransitionEngine::new(&mut store, &SerdeDocParser, root.path()).advance(1)?;
        assert!(matches!(
            outcome,
            TransitionOutcome::Advanced { from: 0, to: 1, warning: None }
        ));
        assert_eq!(store.get_project(id)?.unwrap().current_phase, 1);
        Ok(())
    }

    #[test]
    fn test_advance_requires_active_project() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let root = TempDir::new()?;

        let err = TransitionEngine::new(&mut store, &SerdeDocParser, root.path())
            .advance(1)
            .unwrap_err();
        assert!(matches!(err, EngineError::NoActiveProject));
        Ok(())
    }
}
