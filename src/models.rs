use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Event type tags written by the store itself. The event log accepts
/// arbitrary tags; these are the ones with defined producers.
pub const EVENT_PROJECT_CREATED: &str = "PROJECT_CREATED";
pub const EVENT_AGENT_UPDATED: &str = "AGENT_UPDATED";
pub const EVENT_PROJECT_IMPORTED: &str = "PROJECT_IMPORTED";

/// Seed state for agent rows created alongside a project.
pub const DEFAULT_AGENT_PHASE: &str = "WAITING";
pub const DEFAULT_AGENT_STATUS: &str = "READY";
pub const DEFAULT_PROGRESS: &str = "0%";

/// Status agents are reset to when their phase begins.
pub const AGENT_STATUS_IN_PROGRESS: &str = "IN_PROGRESS";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Initialized,
    InProgress,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "INITIALIZED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIALIZED" => Ok(Self::Initialized),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid project status: {}", s)),
        }
    }
}

/// One tracked unit of multi-phase work. Timestamps are RFC 3339 text,
/// written by the store on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub current_phase: i64,
    pub current_feature: Option<String>,
    pub status: ProjectStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub overall_progress: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A named participant bound to a project. Status and phase label are open
/// sets, stored as free text; the store only ever writes the seed values and
/// IN_PROGRESS resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub phase: String,
    pub status: String,
    pub progress: String,
    pub todos_completed: i64,
    pub todos_total: i64,
    pub last_update: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub project_id: i64,
    pub agent_name: Option<String>,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

/// Start/completion record for one (project, phase) pair. Duration is
/// derived in whole minutes once a completion lands on a prior start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTimelineEntry {
    pub id: i64,
    pub project_id: i64,
    pub phase_number: i64,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_minutes: Option<i64>,
}

fn default_imported_name() -> String {
    "Imported Project".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_phase_number() -> i64 {
    1
}

fn default_status() -> String {
    "INITIALIZED".to_string()
}

fn default_progress() -> String {
    DEFAULT_PROGRESS.to_string()
}

fn default_agent_phase() -> String {
    DEFAULT_AGENT_PHASE.to_string()
}

fn default_agent_status() -> String {
    DEFAULT_AGENT_STATUS.to_string()
}

/// The flattened interchange document: full project state as one tree.
/// Field defaults match what an import assumes when a key is absent, so a
/// partial document parses into a well-formed snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default = "default_imported_name")]
    pub project: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_phase_number")]
    pub current_phase: i64,
    #[serde(default)]
    pub current_feature: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentSnapshot>,
    /// Keys are `phase_<n>_started` / `phase_<n>_completed`.
    #[serde(default)]
    pub phase_timeline: BTreeMap<String, String>,
    #[serde(default = "default_progress")]
    pub overall_progress: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    #[serde(default = "default_agent_phase")]
    pub phase: String,
    #[serde(default = "default_agent_status")]
    pub status: String,
    #[serde(default = "default_progress")]
    pub progress: String,
    #[serde(default)]
    pub todos_completed: i64,
    #[serde(default)]
    pub todos_total: i64,
    #[serde(default)]
    pub last_update: Option<String>,
}

/// Builds the synthesized key pair for one timeline row.
pub fn timeline_key(phase_number: i64, completed: bool) -> String {
    if completed {
        format!("phase_{}_completed", phase_number)
    } else {
        format!("phase_{}_started", phase_number)
    }
}

/// Parses a synthesized timeline key back into (phase number, is_completed).
/// Returns None for keys that do not follow the scheme.
pub fn parse_timeline_key(key: &str) -> Option<(i64, bool)> {
    let rest = key.strip_prefix("phase_")?;
    if let Some(num) = rest.strip_suffix("_started") {
        return num.parse().ok().map(|n| (n, false));
    }
    if let Some(num) = rest.strip_suffix("_completed") {
        return num.parse().ok().map(|n| (n, true));
    }
    None
}
