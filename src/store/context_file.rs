//! Flat-document `StateStore` backend.
//!
//! The whole store is one JSON file: id counters plus a list of project
//! entries, each carrying its agents, events, and timeline inline. Every
//! mutation rewrites the file through a temp-file-then-rename replacement,
//! so a crash mid-write leaves the previous document intact. Lookups are
//! linear scans; the document stays small enough that this never matters.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{AgentUpdate, PhaseChange, ProjectUpdate, StateStore};
use crate::errors::StoreError;
use crate::models::*;
use crate::phase::AGENT_ROSTER;
use crate::util::{minutes_between, now_rfc3339};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ContextDoc {
    #[serde(default)]
    next_project_id: i64,
    #[serde(default)]
    next_agent_id: i64,
    #[serde(default)]
    next_event_id: i64,
    #[serde(default)]
    next_timeline_id: i64,
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectEntry {
    project: Project,
    agents: Vec<Agent>,
    events: Vec<EventRecord>,
    timeline: Vec<PhaseTimelineEntry>,
}

pub struct ContextFileStore {
    path: PathBuf,
    doc: ContextDoc,
}

impl ContextFileStore {
    /// Open the store at the given path. A missing file starts an empty
    /// document; nothing is written until the first mutation.
    pub fn new(path: &Path) -> Result<Self> {
        let doc = if path.exists() {
            let raw = fs::read_to_string(path).context("Failed to read context file")?;
            serde_json::from_str(&raw).context("Failed to parse context file")?
        } else {
            ContextDoc::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    fn save(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.doc)
            .context("Failed to serialize context file")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).context("Failed to write context file")?;
        fs::rename(&tmp, &self.path).context("Failed to replace context file")?;
        Ok(())
    }

    fn entry(&self, project_id: i64) -> Option<&ProjectEntry> {
        self.doc.projects.iter().find(|p| p.project.id == project_id)
    }
}

impl StateStore for ContextFileStore {
    // ── Projects ──────────────────────────────────────────────────────

    fn create_project(&mut self, name: &str, version: &str) -> Result<i64, StoreError> {
        let now = now_rfc3339();
        let doc = &mut self.doc;
        let project_id = alloc_id(&mut doc.next_project_id);
        let mut entry = ProjectEntry {
            project: Project {
                id: project_id,
                name: name.to_string(),
                version: version.to_string(),
                current_phase: 1,
                current_feature: None,
                status: ProjectStatus::Initialized,
                started_at: Some(now.clone()),
                completed_at: None,
                overall_progress: DEFAULT_PROGRESS.to_string(),
                created_at: now.clone(),
                updated_at: now.clone(),
            },
            agents: Vec::new(),
            events: Vec::new(),
            timeline: Vec::new(),
        };
        for agent_name in AGENT_ROSTER {
            let id = alloc_id(&mut doc.next_agent_id);
            entry.agents.push(seed_agent(id, project_id, agent_name, &now));
        }
        let event_id = alloc_id(&mut doc.next_event_id);
        entry.events.push(EventRecord {
            id: event_id,
            project_id,
            agent_name: None,
            event_type: EVENT_PROJECT_CREATED.to_string(),
            data: serde_json::json!({"name": name, "version": version}),
            timestamp: now,
        });
        doc.projects.push(entry);
        self.save()?;
        Ok(project_id)
    }

    fn get_active_project(&self) -> Result<Option<Project>, StoreError> {
        // Timestamps share one fixed-offset RFC 3339 shape, so lexicographic
        // order is chronological order, same as the TEXT ordering in SQLite.
        let active = self
            .doc
            .projects
            .iter()
            .max_by(|a, b| {
                a.project
                    .updated_at
                    .cmp(&b.project.updated_at)
                    .then(a.project.id.cmp(&b.project.id))
            })
            .map(|entry| entry.project.clone());
        Ok(active)
    }

    fn get_project(&self, project_id: i64) -> Result<Option<Project>, StoreError> {
        Ok(self.entry(project_id).map(|e| e.project.clone()))
    }

    fn update_project(
        &mut self,
        project_id: i64,
        update: &ProjectUpdate,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339();
        let entry = self
            .doc
            .projects
            .iter_mut()
            .find(|p| p.project.id == project_id)
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;
        let project = &mut entry.project;
        if let Some(name) = &update.name {
            project.name = name.clone();
        }
        if let Some(version) = &update.version {
            project.version = version.clone();
        }
        if let Some(phase) = update.current_phase {
            project.current_phase = phase;
        }
        if let Some(feature) = &update.current_feature {
            project.current_feature = Some(feature.clone());
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(started) = &update.started_at {
            project.started_at = Some(started.clone());
        }
        if let Some(completed) = &update.completed_at {
            project.completed_at = Some(completed.clone());
        }
        if let Some(progress) = &update.overall_progress {
            project.overall_progress = progress.clone();
        }
        project.updated_at = now;
        self.save()?;
        Ok(())
    }

    // ── Agents ────────────────────────────────────────────────────────

    fn get_agents(&self, project_id: i64) -> Result<Vec<Agent>, StoreError> {
        let mut agents = match self.entry(project_id) {
            Some(entry) => entry.agents.clone(),
            None => Vec::new(),
        };
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    fn get_agent(&self, project_id: i64, name: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self
            .entry(project_id)
            .and_then(|e| e.agents.iter().find(|a| a.name == name))
            .cloned())
    }

    fn update_agent(
        &mut self,
        project_id: i64,
        name: &str,
        update: &AgentUpdate,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339();
        let payload = serde_json::to_value(update).context("Failed to serialize agent update")?;
        let doc = &mut self.doc;
        let entry = doc
            .projects
            .iter_mut()
            .find(|p| p.project.id == project_id)
            .ok_or_else(|| StoreError::AgentNotFound {
                project_id,
                name: name.to_string(),
            })?;
        let agent = entry
            .agents
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| StoreError::AgentNotFound {
                project_id,
                name: name.to_string(),
            })?;
        apply_agent_update(agent, update, &now);
        let event_id = alloc_id(&mut doc.next_event_id);
        entry.events.push(EventRecord {
            id: event_id,
            project_id,
            agent_name: Some(name.to_string()),
            event_type: EVENT_AGENT_UPDATED.to_string(),
            data: payload,
            timestamp: now,
        });
        self.save()?;
        Ok(())
    }

    // ── Events ────────────────────────────────────────────────────────

    fn log_event(
        &mut self,
        project_id: i64,
        agent_name: Option<&str>,
        event_type: &str,
        data: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let doc = &mut self.doc;
        let entry = doc
            .projects
            .iter_mut()
            .find(|p| p.project.id == project_id)
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;
        let event_id = alloc_id(&mut doc.next_event_id);
        entry.events.push(EventRecord {
            id: event_id,
            project_id,
            agent_name: agent_name.map(str::to_string),
            event_type: event_type.to_string(),
            data: data.clone(),
            timestamp: now_rfc3339(),
        });
        self.save()?;
        Ok(())
    }

    fn get_events(&self, project_id: i64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let mut events = match self.entry(project_id) {
            Some(entry) => entry.events.clone(),
            None => Vec::new(),
        };
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        Ok(events)
    }

    // ── Timeline ──────────────────────────────────────────────────────

    fn upsert_phase_timeline(
        &mut self,
        project_id: i64,
        phase_number: i64,
        started_at: Option<&str>,
        completed_at: Option<&str>,
    ) -> Result<(), StoreError> {
        let doc = &mut self.doc;
        let entry = doc
            .projects
            .iter_mut()
            .find(|p| p.project.id == project_id)
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;
        upsert_timeline_row(
            &mut entry.timeline,
            &mut doc.next_timeline_id,
            project_id,
            phase_number,
            started_at,
            completed_at,
        );
        self.save()?;
        Ok(())
    }

    fn get_phase_timeline(
        &self,
        project_id: i64,
    ) -> Result<Vec<PhaseTimelineEntry>, StoreError> {
        let mut timeline = match self.entry(project_id) {
            Some(entry) => entry.timeline.clone(),
            None => Vec::new(),
        };
        timeline.sort_by_key(|t| t.phase_number);
        Ok(timeline)
    }

    // ── Snapshots ─────────────────────────────────────────────────────

    fn export_snapshot(&self, project_id: i64) -> Result<Snapshot, StoreError> {
        let entry = self
            .entry(project_id)
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;

        let mut agents = std::collections::BTreeMap::new();
        for agent in &entry.agents {
            agents.insert(
                agent.name.clone(),
                AgentSnapshot {
                    phase: agent.phase.clone(),
                    status: agent.status.clone(),
                    progress: agent.progress.clone(),
                    todos_completed: agent.todos_completed,
                    todos_total: agent.todos_total,
                    last_update: agent.last_update.clone(),
                },
            );
        }

        let mut phase_timeline = std::collections::BTreeMap::new();
        for row in &entry.timeline {
            if let Some(started) = &row.started_at {
                phase_timeline.insert(timeline_key(row.phase_number, false), started.clone());
            }
            if let Some(completed) = &row.completed_at {
                phase_timeline.insert(timeline_key(row.phase_number, true), completed.clone());
            }
        }

        Ok(Snapshot {
            project: entry.project.name.clone(),
            version: entry.project.version.clone(),
            current_phase: entry.project.current_phase,
            current_feature: entry.project.current_feature.clone(),
            status: entry.project.status.as_str().to_string(),
            started_at: entry.project.started_at.clone(),
            agents,
            phase_timeline,
            overall_progress: entry.project.overall_progress.clone(),
        })
    }

    fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<i64, StoreError> {
        // Validated before anything mutates so a bad document changes nothing.
        let status =
            ProjectStatus::from_str(&snapshot.status).map_err(StoreError::MalformedSnapshot)?;
        let now = now_rfc3339();
        let doc = &mut self.doc;
        let project_id = alloc_id(&mut doc.next_project_id);
        let mut entry = ProjectEntry {
            project: Project {
                id: project_id,
                name: snapshot.project.clone(),
                version: snapshot.version.clone(),
                current_phase: snapshot.current_phase,
                current_feature: snapshot.current_feature.clone(),
                status,
                started_at: snapshot.started_at.clone(),
                completed_at: None,
                overall_progress: snapshot.overall_progress.clone(),
                created_at: now.clone(),
                updated_at: now.clone(),
            },
            agents: Vec::new(),
            events: Vec::new(),
            timeline: Vec::new(),
        };
        for agent_name in AGENT_ROSTER {
            let id = alloc_id(&mut doc.next_agent_id);
            entry.agents.push(seed_agent(id, project_id, agent_name, &now));
        }

        for (name, state) in &snapshot.agents {
            match entry.agents.iter_mut().find(|a| a.name == *name) {
                Some(agent) => {
                    let update = AgentUpdate {
                        phase: Some(state.phase.clone()),
                        status: Some(state.status.clone()),
                        progress: Some(state.progress.clone()),
                        todos_completed: Some(state.todos_completed),
                        todos_total: Some(state.todos_total),
                        last_update: state.last_update.clone(),
                    };
                    apply_agent_update(agent, &update, &now);
                    let payload = serde_json::to_value(&update)
                        .context("Failed to serialize agent update")?;
                    let event_id = alloc_id(&mut doc.next_event_id);
                    entry.events.push(EventRecord {
                        id: event_id,
                        project_id,
                        agent_name: Some(name.clone()),
                        event_type: EVENT_AGENT_UPDATED.to_string(),
                        data: payload,
                        timestamp: now.clone(),
                    });
                }
                None => {
                    tracing::warn!(agent = %name, "snapshot contains unknown agent, skipping");
                }
            }
        }

        // Starts replay before completions so every stored start is in place
        // when its completion computes a duration.
        for (key, value) in &snapshot.phase_timeline {
            if let Some((phase, false)) = parse_timeline_key(key) {
                upsert_timeline_row(
                    &mut entry.timeline,
                    &mut doc.next_timeline_id,
                    project_id,
                    phase,
                    Some(value),
                    None,
                );
            }
        }
        for (key, value) in &snapshot.phase_timeline {
            match parse_timeline_key(key) {
                Some((phase, true)) => {
                    upsert_timeline_row(
                        &mut entry.timeline,
                        &mut doc.next_timeline_id,
                        project_id,
                        phase,
                        None,
                        Some(value),
                    );
                }
                Some(_) => {}
                None => {
                    tracing::warn!(key = %key, "snapshot contains unrecognized timeline key, skipping");
                }
            }
        }

        let event_id = alloc_id(&mut doc.next_event_id);
        entry.events.push(EventRecord {
            id: event_id,
            project_id,
            agent_name: None,
            event_type: EVENT_PROJECT_IMPORTED.to_string(),
            data: serde_json::json!({"source": "JSON"}),
            timestamp: now,
        });
        doc.projects.push(entry);
        self.save()?;
        Ok(project_id)
    }

    fn commit_transition(
        &mut self,
        project_id: i64,
        change: &PhaseChange,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339();
        let reset = AgentUpdate {
            status: Some(AGENT_STATUS_IN_PROGRESS.to_string()),
            progress: Some(DEFAULT_PROGRESS.to_string()),
            ..Default::default()
        };
        let payload = serde_json::to_value(&reset).context("Failed to serialize agent update")?;

        let doc = &mut self.doc;
        let entry = doc
            .projects
            .iter_mut()
            .find(|p| p.project.id == project_id)
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;

        // Every named agent must exist before anything mutates.
        for name in &change.reset_agents {
            if !entry.agents.iter().any(|a| a.name == *name) {
                return Err(StoreError::AgentNotFound {
                    project_id,
                    name: name.clone(),
                });
            }
        }

        entry.project.current_phase = change.target_phase;
        entry.project.updated_at = now.clone();
        upsert_timeline_row(
            &mut entry.timeline,
            &mut doc.next_timeline_id,
            project_id,
            change.target_phase,
            Some(&change.started_at),
            None,
        );
        for name in &change.reset_agents {
            if let Some(agent) = entry.agents.iter_mut().find(|a| a.name == *name) {
                apply_agent_update(agent, &reset, &now);
            }
            let event_id = alloc_id(&mut doc.next_event_id);
            entry.events.push(EventRecord {
                id: event_id,
                project_id,
                agent_name: Some(name.clone()),
                event_type: EVENT_AGENT_UPDATED.to_string(),
                data: payload.clone(),
                timestamp: now.clone(),
            });
        }

        self.save()?;
        Ok(())
    }
}

// ── Document helpers ──────────────────────────────────────────────────

fn alloc_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn seed_agent(id: i64, project_id: i64, name: &str, now: &str) -> Agent {
    Agent {
        id,
        project_id,
        name: name.to_string(),
        phase: DEFAULT_AGENT_PHASE.to_string(),
        status: DEFAULT_AGENT_STATUS.to_string(),
        progress: DEFAULT_PROGRESS.to_string(),
        todos_completed: 0,
        todos_total: 0,
        last_update: None,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}

fn apply_agent_update(agent: &mut Agent, update: &AgentUpdate, now: &str) {
    if let Some(phase) = &update.phase {
        agent.phase = phase.clone();
    }
    if let Some(status) = &update.status {
        agent.status = status.clone();
    }
    if let Some(progress) = &update.progress {
        agent.progress = progress.clone();
    }
    if let Some(completed) = update.todos_completed {
        agent.todos_completed = completed;
    }
    if let Some(total) = update.todos_total {
        agent.todos_total = total;
    }
    agent.last_update = Some(
        update
            .last_update
            .clone()
            .unwrap_or_else(|| now.to_string()),
    );
    agent.updated_at = now.to_string();
}

/// First write for a phase inserts the row as given. Later writes keep the
/// stored start and only land a completion, deriving the duration when that
/// completion meets a prior start.
fn upsert_timeline_row(
    timeline: &mut Vec<PhaseTimelineEntry>,
    next_id: &mut i64,
    project_id: i64,
    phase_number: i64,
    started_at: Option<&str>,
    completed_at: Option<&str>,
) {
    match timeline.iter_mut().find(|t| t.phase_number == phase_number) {
        Some(row) => {
            if let Some(completed) = completed_at {
                row.duration_minutes = row
                    .started_at
                    .as_deref()
                    .and_then(|started| minutes_between(started, completed));
                row.completed_at = Some(completed.to_string());
            }
        }
        None => {
            let id = alloc_id(next_id);
            timeline.push(PhaseTimelineEntry {
                id,
                project_id,
                phase_number,
                started_at: started_at.map(str::to_string),
                completed_at: completed_at.map(str::to_string),
                duration_minutes: None,
            });
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> ContextFileStore {
        ContextFileStore::new(&dir.path().join("context.json")).expect("open store")
    }

    #[test]
    fn test_open_without_file_starts_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir);
        assert!(store.get_active_project()?.is_none());
        // Opening is read-only; the file appears on first mutation.
        assert!(!dir.path().join("context.json").exists());
        Ok(())
    }

    #[test]
    fn test_create_project_persists_across_reopen() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Demo", "1.0.0")?;
        drop(store);

        let store = open(&dir);
        let project = store.get_project(id)?.expect("project should exist");
        assert_eq!(project.name, "Demo");
        assert_eq!(project.current_phase, 1);
        assert_eq!(project.status, ProjectStatus::Initialized);

        let agents = store.get_agents(id)?;
        assert_eq!(agents.len(), AGENT_ROSTER.len());
        for agent in &agents {
            assert_eq!(agent.phase, DEFAULT_AGENT_PHASE);
            assert_eq!(agent.status, DEFAULT_AGENT_STATUS);
        }
        // No stale temp file after the rename.
        assert!(!dir.path().join("context.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_open_error() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("context.json");
        fs::write(&path, "{ not json")?;
        assert!(ContextFileStore::new(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_active_project_follows_updated_at() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let first = store.create_project("First", "1.0.0")?;
        let second = store.create_project("Second", "1.0.0")?;

        assert_eq!(store.get_active_project()?.expect("active").id, second);

        store.update_project(first, &ProjectUpdate::default())?;
        assert_eq!(store.get_active_project()?.expect("active").id, first);
        Ok(())
    }

    #[test]
    fn test_update_agent_persists_fields_and_event() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Demo", "1.0.0")?;
        store.update_agent(
            id,
            "frontend",
            &AgentUpdate {
                status: Some("IN_PROGRESS".to_string()),
                todos_total: Some(8),
                ..Default::default()
            },
        )?;
        drop(store);

        let store = open(&dir);
        let agent = store.get_agent(id, "frontend")?.expect("agent");
        assert_eq!(agent.status, "IN_PROGRESS");
        assert_eq!(agent.todos_total, 8);
        assert!(agent.last_update.is_some());

        let events = store.get_events(id, 10)?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EVENT_AGENT_UPDATED);
        assert_eq!(events[1].event_type, EVENT_PROJECT_CREATED);
        Ok(())
    }

    #[test]
    fn test_update_unknown_agent_saves_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Demo", "1.0.0")?;

        let err = store
            .update_agent(id, "mystery", &AgentUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::AgentNotFound { .. }));
        drop(store);

        let store = open(&dir);
        assert_eq!(store.get_events(id, 10)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_project_reads_are_empty_not_errors() -> Result<()> {
        let dir = TempDir::new()?;
        let store = open(&dir);
        assert!(store.get_project(99)?.is_none());
        assert!(store.get_agents(99)?.is_empty());
        assert!(store.get_agent(99, "backend")?.is_none());
        assert!(store.get_events(99, 10)?.is_empty());
        assert!(store.get_phase_timeline(99)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_log_event_unknown_project_is_error() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let err = store
            .log_event(99, None, "CUSTOM", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectNotFound { id: 99 }));
        Ok(())
    }

    #[test]
    fn test_timeline_first_start_wins_and_duration_floors() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Demo", "1.0.0")?;

        store.upsert_phase_timeline(id, 1, Some("2024-01-01T10:00:00+00:00"), None)?;
        store.upsert_phase_timeline(id, 1, Some("2024-01-01T12:00:00+00:00"), None)?;
        store.upsert_phase_timeline(id, 1, None, Some("2024-01-01T11:30:59+00:00"))?;

        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline.len(), 1);
        assert_eq!(
            timeline[0].started_at.as_deref(),
            Some("2024-01-01T10:00:00+00:00")
        );
        assert_eq!(timeline[0].duration_minutes, Some(90));
        Ok(())
    }

    #[test]
    fn test_export_import_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Round Trip", "2.1.0")?;
        store.update_project(
            id,
            &ProjectUpdate {
                current_phase: Some(2),
                status: Some(ProjectStatus::InProgress),
                ..Default::default()
            },
        )?;
        store.update_agent(
            id,
            "architect",
            &AgentUpdate {
                status: Some("COMPLETED".to_string()),
                progress: Some("100%".to_string()),
                ..Default::default()
            },
        )?;
        store.upsert_phase_timeline(id, 1, Some("2024-01-01T10:00:00+00:00"), None)?;
        store.upsert_phase_timeline(id, 1, None, Some("2024-01-01T10:45:00+00:00"))?;

        let exported = store.export_snapshot(id)?;

        let other_dir = TempDir::new()?;
        let mut other = open(&other_dir);
        let imported_id = other.import_snapshot(&exported)?;
        assert_eq!(other.export_snapshot(imported_id)?, exported);
        assert_eq!(
            other.get_phase_timeline(imported_id)?[0].duration_minutes,
            Some(45)
        );
        Ok(())
    }

    #[test]
    fn test_commit_transition_is_one_persisted_update() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Demo", "1.0.0")?;

        store.commit_transition(
            id,
            &PhaseChange {
                target_phase: 4,
                started_at: "2024-01-01T10:00:00+00:00".to_string(),
                reset_agents: vec!["devops".to_string(), "qa".to_string()],
            },
        )?;
        drop(store);

        let store = open(&dir);
        assert_eq!(store.get_project(id)?.expect("project").current_phase, 4);
        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline[0].phase_number, 4);
        for name in ["devops", "qa"] {
            let agent = store.get_agent(id, name)?.expect("agent");
            assert_eq!(agent.status, AGENT_STATUS_IN_PROGRESS);
            assert_eq!(agent.progress, DEFAULT_PROGRESS);
        }
        Ok(())
    }

    #[test]
    fn test_commit_transition_unknown_agent_mutates_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let mut store = open(&dir);
        let id = store.create_project("Demo", "1.0.0")?;

        let err = store
            .commit_transition(
                id,
                &PhaseChange {
                    target_phase: 4,
                    started_at: "2024-01-01T10:00:00+00:00".to_string(),
                    reset_agents: vec!["devops".to_string(), "mystery".to_string()],
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::AgentNotFound { .. }));

        assert_eq!(store.get_project(id)?.expect("project").current_phase, 1);
        assert!(store.get_phase_timeline(id)?.is_empty());
        let devops = store.get_agent(id, "devops")?.expect("agent");
        assert_eq!(devops.status, DEFAULT_AGENT_STATUS);
        Ok(())
    }
}
