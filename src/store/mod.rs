//! Persistent state behind one trait, two backends.
//!
//! `StateStore` is the seam between the workflow logic and storage. The
//! SQLite backend keeps relational tables; the context-file backend keeps one
//! flat JSON document. Both enforce the same contract: projects own their
//! agents, events, and timeline rows; updates refresh timestamps; every
//! multi-row operation lands atomically.

mod context_file;
mod sqlite;

pub use context_file::ContextFileStore;
pub use sqlite::SqliteStore;

use serde::Serialize;

use crate::errors::StoreError;
use crate::models::{Agent, EventRecord, PhaseTimelineEntry, Project, ProjectStatus, Snapshot};

/// Partial update for a project row. `None` fields are left untouched.
/// Applying an all-`None` update still refreshes `updated_at`, which is how
/// a project is marked active without changing anything else.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_progress: Option<String>,
}

/// Partial update for an agent row. Serialization skips `None` fields so the
/// AGENT_UPDATED event payload carries exactly the applied fields.
///
/// `last_update` is normally refreshed to now; an explicit value here wins,
/// which is what lets a snapshot import reproduce its source document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todos_completed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todos_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

/// Everything a passed gate commits in one atomic write: the new phase, the
/// timeline start stamp, and the agents reset to IN_PROGRESS/0%.
#[derive(Debug, Clone)]
pub struct PhaseChange {
    pub target_phase: i64,
    pub started_at: String,
    pub reset_agents: Vec<String>,
}

pub trait StateStore {
    /// Creates a project (status INITIALIZED, started now), seeds one agent
    /// row per roster entry in WAITING/READY/0% state, and logs
    /// PROJECT_CREATED. All rows land atomically or not at all.
    fn create_project(&mut self, name: &str, version: &str) -> Result<i64, StoreError>;

    /// The project with the most recent `updated_at` (ties break toward the
    /// newest id). This recency rule is the only notion of "active".
    fn get_active_project(&self) -> Result<Option<Project>, StoreError>;

    fn get_project(&self, project_id: i64) -> Result<Option<Project>, StoreError>;

    /// Applies a partial update and refreshes `updated_at`, even when every
    /// field is `None`.
    fn update_project(&mut self, project_id: i64, update: &ProjectUpdate)
    -> Result<(), StoreError>;

    /// All agents of a project, ordered by name.
    fn get_agents(&self, project_id: i64) -> Result<Vec<Agent>, StoreError>;

    fn get_agent(&self, project_id: i64, name: &str) -> Result<Option<Agent>, StoreError>;

    /// Applies a partial update, refreshes `updated_at` and `last_update`
    /// (explicit `last_update` override wins), and appends exactly one
    /// AGENT_UPDATED event carrying the applied fields.
    fn update_agent(
        &mut self,
        project_id: i64,
        name: &str,
        update: &AgentUpdate,
    ) -> Result<(), StoreError>;

    fn log_event(
        &mut self,
        project_id: i64,
        agent_name: Option<&str>,
        event_type: &str,
        data: &serde_json::Value,
    ) -> Result<(), StoreError>;

    /// The most recent `limit` events, newest first.
    fn get_events(&self, project_id: i64, limit: usize) -> Result<Vec<EventRecord>, StoreError>;

    /// First write for a (project, phase) creates the row with whatever
    /// timestamps were supplied. Later writes only land a completion: the
    /// stored start is kept (first start wins), and when a completion meets
    /// a prior start the duration is persisted in whole minutes.
    fn upsert_phase_timeline(
        &mut self,
        project_id: i64,
        phase_number: i64,
        started_at: Option<&str>,
        completed_at: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Timeline rows ordered by phase number.
    fn get_phase_timeline(&self, project_id: i64)
    -> Result<Vec<PhaseTimelineEntry>, StoreError>;

    /// Materializes the project, its agents keyed by name, and its timeline
    /// flattened to `phase_<n>_started` / `phase_<n>_completed` keys.
    fn export_snapshot(&self, project_id: i64) -> Result<Snapshot, StoreError>;

    /// Inverse of export: creates a project, overrides its fields, replays
    /// agent states and timeline keys (starts before completions, so
    /// durations land), and logs PROJECT_IMPORTED. Agent names outside the
    /// roster are skipped with a warning.
    fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<i64, StoreError>;

    /// Commits a passed gate as one logical update: current phase, timeline
    /// start stamp, agent resets (one AGENT_UPDATED event each).
    fn commit_transition(
        &mut self,
        project_id: i64,
        change: &PhaseChange,
    ) -> Result<(), StoreError>;
}
