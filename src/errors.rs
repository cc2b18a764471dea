//! Typed error hierarchy for the tracker.
//!
//! Two top-level enums cover the two subsystems: `StoreError` for state
//! store data-integrity failures and `EngineError` for phase transition
//! failures.
//!
//! Validation defects are not errors: gates collect them as plain string
//! lists and surface them through `GateReport`.

use thiserror::Error;

/// Errors from the state store. Lookups that may legitimately find nothing
/// return `Option`; these variants cover updates addressing records that do
/// not exist, and storage faults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project {id} not found")]
    ProjectNotFound { id: i64 },

    #[error("Agent '{name}' not found in project {project_id}")]
    AgentNotFound { project_id: i64, name: String },

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the transition engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Phase {number} is not a defined phase")]
    UnknownPhase { number: i64 },

    #[error("No active project")]
    NoActiveProject,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
