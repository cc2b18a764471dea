use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::{AgentUpdate, PhaseChange, ProjectUpdate, StateStore};
use crate::errors::StoreError;
use crate::models::*;
use crate::phase::AGENT_ROSTER;
use crate::util::{minutes_between, now_rfc3339};

/// SQLite-backed `StateStore`.
///
/// Four tables: projects, agents, events, phase_timeline. All timestamps are
/// RFC 3339 text written by the application, never by SQLite, so the two
/// backends stay byte-comparable. Composite operations run inside a single
/// transaction; an error before commit rolls the whole write back.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    version TEXT NOT NULL,
                    current_phase INTEGER NOT NULL DEFAULT 1,
                    current_feature TEXT,
                    status TEXT NOT NULL DEFAULT 'INITIALIZED',
                    started_at TEXT,
                    completed_at TEXT,
                    overall_progress TEXT NOT NULL DEFAULT '0%',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS agents (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    phase TEXT NOT NULL DEFAULT 'WAITING',
                    status TEXT NOT NULL DEFAULT 'READY',
                    progress TEXT NOT NULL DEFAULT '0%',
                    todos_completed INTEGER NOT NULL DEFAULT 0,
                    todos_total INTEGER NOT NULL DEFAULT 0,
                    last_update TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE(project_id, name)
                );

                CREATE TABLE IF NOT EXISTS events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    agent_name TEXT,
                    event_type TEXT NOT NULL,
                    data TEXT NOT NULL DEFAULT '{}',
                    timestamp TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS phase_timeline (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    phase_number INTEGER NOT NULL,
                    started_at TEXT,
                    completed_at TEXT,
                    duration_minutes INTEGER,
                    UNIQUE(project_id, phase_number)
                );

                CREATE INDEX IF NOT EXISTS idx_agents_project ON agents(project_id);
                CREATE INDEX IF NOT EXISTS idx_events_project ON events(project_id);
                CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
                CREATE INDEX IF NOT EXISTS idx_phase_timeline_project ON phase_timeline(project_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }
}

impl StateStore for SqliteStore {
    // ── Projects ──────────────────────────────────────────────────────

    fn create_project(&mut self, name: &str, version: &str) -> Result<i64, StoreError> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let project_id = insert_project(&tx, name, version, &now)?;
        seed_agents(&tx, project_id, &now)?;
        insert_event(
            &tx,
            project_id,
            None,
            EVENT_PROJECT_CREATED,
            &serde_json::json!({"name": name, "version": version}),
            &now,
        )?;
        tx.commit().context("Failed to commit project creation")?;
        Ok(project_id)
    }

    fn get_active_project(&self) -> Result<Option<Project>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, version, current_phase, current_feature, status, started_at,
                        completed_at, overall_progress, created_at, updated_at
                 FROM projects ORDER BY updated_at DESC, id DESC LIMIT 1",
            )
            .context("Failed to prepare get_active_project")?;
        let mut rows = stmt
            .query_map([], project_row)
            .context("Failed to query active project")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read project row")?;
                Ok(Some(r.into_project()?))
            }
            None => Ok(None),
        }
    }

    fn get_project(&self, project_id: i64) -> Result<Option<Project>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, version, current_phase, current_feature, status, started_at,
                        completed_at, overall_progress, created_at, updated_at
                 FROM projects WHERE id = ?1",
            )
            .context("Failed to prepare get_project")?;
        let mut rows = stmt
            .query_map(params![project_id], project_row)
            .context("Failed to query project")?;
        match rows.next() {
            Some(row) => {
                let r = row.context("Failed to read project row")?;
                Ok(Some(r.into_project()?))
            }
            None => Ok(None),
        }
    }

    fn update_project(
        &mut self,
        project_id: i64,
        update: &ProjectUpdate,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        if let Some(name) = &update.name {
            tx.execute(
                "UPDATE projects SET name = ?1 WHERE id = ?2",
                params![name, project_id],
            )
            .context("Failed to update project name")?;
        }
        if let Some(version) = &update.version {
            tx.execute(
                "UPDATE projects SET version = ?1 WHERE id = ?2",
                params![version, project_id],
            )
            .context("Failed to update project version")?;
        }
        if let Some(phase) = update.current_phase {
            tx.execute(
                "UPDATE projects SET current_phase = ?1 WHERE id = ?2",
                params![phase, project_id],
            )
            .context("Failed to update project phase")?;
        }
        if let Some(feature) = &update.current_feature {
            tx.execute(
                "UPDATE projects SET current_feature = ?1 WHERE id = ?2",
                params![feature, project_id],
            )
            .context("Failed to update project feature")?;
        }
        if let Some(status) = &update.status {
            tx.execute(
                "UPDATE projects SET status = ?1 WHERE id = ?2",
                params![status.as_str(), project_id],
            )
            .context("Failed to update project status")?;
        }
        if let Some(started) = &update.started_at {
            tx.execute(
                "UPDATE projects SET started_at = ?1 WHERE id = ?2",
                params![started, project_id],
            )
            .context("Failed to update project start")?;
        }
        if let Some(completed) = &update.completed_at {
            tx.execute(
                "UPDATE projects SET completed_at = ?1 WHERE id = ?2",
                params![completed, project_id],
            )
            .context("Failed to update project completion")?;
        }
        if let Some(progress) = &update.overall_progress {
            tx.execute(
                "UPDATE projects SET overall_progress = ?1 WHERE id = ?2",
                params![progress, project_id],
            )
            .context("Failed to update project progress")?;
        }

        // Runs unconditionally: an all-None update still refreshes updated_at,
        // and a zero row count is how a missing project is detected.
        let affected = tx
            .execute(
                "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
                params![now, project_id],
            )
            .context("Failed to refresh project updated_at")?;
        if affected == 0 {
            return Err(StoreError::ProjectNotFound { id: project_id });
        }

        tx.commit().context("Failed to commit project update")?;
        Ok(())
    }

    // ── Agents ────────────────────────────────────────────────────────

    fn get_agents(&self, project_id: i64) -> Result<Vec<Agent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, name, phase, status, progress, todos_completed,
                        todos_total, last_update, created_at, updated_at
                 FROM agents WHERE project_id = ?1 ORDER BY name",
            )
            .context("Failed to prepare get_agents")?;
        let rows = stmt
            .query_map(params![project_id], agent_row)
            .context("Failed to query agents")?;
        let mut agents = Vec::new();
        for row in rows {
            agents.push(row.context("Failed to read agent row")?);
        }
        Ok(agents)
    }

    fn get_agent(&self, project_id: i64, name: &str) -> Result<Option<Agent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, name, phase, status, progress, todos_completed,
                        todos_total, last_update, created_at, updated_at
                 FROM agents WHERE project_id = ?1 AND name = ?2",
            )
            .context("Failed to prepare get_agent")?;
        let mut rows = stmt
            .query_map(params![project_id, name], agent_row)
            .context("Failed to query agent")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read agent row")?)),
            None => Ok(None),
        }
    }

    fn update_agent(
        &mut self,
        project_id: i64,
        name: &str,
        update: &AgentUpdate,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if !apply_agent_update(&tx, project_id, name, update, &now)? {
            return Err(StoreError::AgentNotFound {
                project_id,
                name: name.to_string(),
            });
        }
        let payload = serde_json::to_value(update).context("Failed to serialize agent update")?;
        insert_event(&tx, project_id, Some(name), EVENT_AGENT_UPDATED, &payload, &now)?;
        tx.commit().context("Failed to commit agent update")?;
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
        if self.get_project(project_id)?.is_none() {
            return Err(StoreError::ProjectNotFound { id: project_id });
        }
        insert_event(
            &self.conn,
            project_id,
            agent_name,
            event_type,
            data,
            &now_rfc3339(),
        )?;
        Ok(())
    }

    fn get_events(&self, project_id: i64, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, agent_name, event_type, data, timestamp
                 FROM events WHERE project_id = ?1
                 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            )
            .context("Failed to prepare get_events")?;
        let rows = stmt
            .query_map(params![project_id, limit as i64], |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    agent_name: row.get(2)?,
                    event_type: row.get(3)?,
                    data: row.get(4)?,
                    timestamp: row.get(5)?,
                })
            })
            .context("Failed to query events")?;
        let mut events = Vec::new();
        for row in rows {
            let r = row.context("Failed to read event row")?;
            events.push(r.into_record()?);
        }
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
        apply_timeline_upsert(&self.conn, project_id, phase_number, started_at, completed_at)?;
        Ok(())
    }

    fn get_phase_timeline(
        &self,
        project_id: i64,
    ) -> Result<Vec<PhaseTimelineEntry>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, project_id, phase_number, started_at, completed_at, duration_minutes
                 FROM phase_timeline WHERE project_id = ?1 ORDER BY phase_number",
            )
            .context("Failed to prepare get_phase_timeline")?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(PhaseTimelineEntry {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    phase_number: row.get(2)?,
                    started_at: row.get(3)?,
                    completed_at: row.get(4)?,
                    duration_minutes: row.get(5)?,
                })
            })
            .context("Failed to query phase timeline")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read timeline row")?);
        }
        Ok(entries)
    }

    // ── Snapshots ─────────────────────────────────────────────────────

    fn export_snapshot(&self, project_id: i64) -> Result<Snapshot, StoreError> {
        let project = self
            .get_project(project_id)?
            .ok_or(StoreError::ProjectNotFound { id: project_id })?;
        let agents = self.get_agents(project_id)?;
        let timeline = self.get_phase_timeline(project_id)?;

        let mut agent_map = std::collections::BTreeMap::new();
        for agent in agents {
            agent_map.insert(
                agent.name,
                AgentSnapshot {
                    phase: agent.phase,
                    status: agent.status,
                    progress: agent.progress,
                    todos_completed: agent.todos_completed,
                    todos_total: agent.todos_total,
                    last_update: agent.last_update,
                },
            );
        }

        let mut phase_timeline = std::collections::BTreeMap::new();
        for entry in timeline {
            if let Some(started) = entry.started_at {
                phase_timeline.insert(timeline_key(entry.phase_number, false), started);
            }
            if let Some(completed) = entry.completed_at {
                phase_timeline.insert(timeline_key(entry.phase_number, true), completed);
            }
        }

        Ok(Snapshot {
            project: project.name,
            version: project.version,
            current_phase: project.current_phase,
            current_feature: project.current_feature,
            status: project.status.as_str().to_string(),
            started_at: project.started_at,
            agents: agent_map,
            phase_timeline,
            overall_progress: project.overall_progress,
        })
    }

    fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<i64, StoreError> {
        // Validated before the transaction opens so a bad document mutates nothing.
        let status =
            ProjectStatus::from_str(&snapshot.status).map_err(StoreError::MalformedSnapshot)?;
        let now = now_rfc3339();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let project_id = insert_project(&tx, &snapshot.project, &snapshot.version, &now)?;
        seed_agents(&tx, project_id, &now)?;
        tx.execute(
            "UPDATE projects SET current_phase = ?1, current_feature = ?2, status = ?3,
                    started_at = ?4, overall_progress = ?5 WHERE id = ?6",
            params![
                snapshot.current_phase,
                snapshot.current_feature,
                status.as_str(),
                snapshot.started_at,
                snapshot.overall_progress,
                project_id
            ],
        )
        .context("Failed to apply snapshot project fields")?;

        for (name, state) in &snapshot.agents {
            if !AGENT_ROSTER.contains(&name.as_str()) {
                tracing::warn!(agent = %name, "snapshot contains unknown agent, skipping");
                continue;
            }
            let update = AgentUpdate {
                phase: Some(state.phase.clone()),
                status: Some(state.status.clone()),
                progress: Some(state.progress.clone()),
                todos_completed: Some(state.todos_completed),
                todos_total: Some(state.todos_total),
                last_update: state.last_update.clone(),
            };
            apply_agent_update(&tx, project_id, name, &update, &now)?;
            let payload =
                serde_json::to_value(&update).context("Failed to serialize agent update")?;
            insert_event(&tx, project_id, Some(name), EVENT_AGENT_UPDATED, &payload, &now)?;
        }

        // Starts replay before completions so every stored start is in place
        // when its completion computes a duration.
        for (key, value) in &snapshot.phase_timeline {
            if let Some((phase, false)) = parse_timeline_key(key) {
                apply_timeline_upsert(&tx, project_id, phase, Some(value.as_str()), None)?;
            }
        }
        for (key, value) in &snapshot.phase_timeline {
            match parse_timeline_key(key) {
                Some((phase, true)) => {
                    apply_timeline_upsert(&tx, project_id, phase, None, Some(value.as_str()))?;
                }
                Some(_) => {}
                None => {
                    tracing::warn!(key = %key, "snapshot contains unrecognized timeline key, skipping");
                }
            }
        }

        insert_event(
            &tx,
            project_id,
            None,
            EVENT_PROJECT_IMPORTED,
            &serde_json::json!({"source": "JSON"}),
            &now,
        )?;
        tx.commit().context("Failed to commit snapshot import")?;
        Ok(project_id)
    }

    fn commit_transition(
        &mut self,
        project_id: i64,
        change: &PhaseChange,
    ) -> Result<(), StoreError> {
        let now = now_rfc3339();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let affected = tx
            .execute(
                "UPDATE projects SET current_phase = ?1, updated_at = ?2 WHERE id = ?3",
                params![change.target_phase, now, project_id],
            )
            .context("Failed to update project phase")?;
        if affected == 0 {
            return Err(StoreError::ProjectNotFound { id: project_id });
        }

        apply_timeline_upsert(
            &tx,
            project_id,
            change.target_phase,
            Some(change.started_at.as_str()),
            None,
        )?;

        for name in &change.reset_agents {
            let update = AgentUpdate {
                status: Some(AGENT_STATUS_IN_PROGRESS.to_string()),
                progress: Some(DEFAULT_PROGRESS.to_string()),
                ..Default::default()
            };
            if !apply_agent_update(&tx, project_id, name, &update, &now)? {
                return Err(StoreError::AgentNotFound {
                    project_id,
                    name: name.clone(),
                });
            }
            let payload =
                serde_json::to_value(&update).context("Failed to serialize agent update")?;
            insert_event(&tx, project_id, Some(name), EVENT_AGENT_UPDATED, &payload, &now)?;
        }

        tx.commit().context("Failed to commit phase transition")?;
        Ok(())
    }
}

// ── Write helpers ─────────────────────────────────────────────────────
//
// Shared between the single-call trait methods and the transactional
// composites. Each takes a plain `&Connection`; a `Transaction` derefs to
// one, so the same code runs inside or outside an explicit transaction.

fn insert_project(conn: &Connection, name: &str, version: &str, now: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO projects (name, version, started_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3, ?3)",
        params![name, version, now],
    )
    .context("Failed to insert project")?;
    Ok(conn.last_insert_rowid())
}

fn seed_agents(conn: &Connection, project_id: i64, now: &str) -> Result<()> {
    for name in AGENT_ROSTER {
        conn.execute(
            "INSERT INTO agents (project_id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![project_id, name, now],
        )
        .context("Failed to seed agent row")?;
    }
    Ok(())
}

fn insert_event(
    conn: &Connection,
    project_id: i64,
    agent_name: Option<&str>,
    event_type: &str,
    data: &serde_json::Value,
    timestamp: &str,
) -> Result<()> {
    let payload = serde_json::to_string(data).context("Failed to serialize event data")?;
    conn.execute(
        "INSERT INTO events (project_id, agent_name, event_type, data, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![project_id, agent_name, event_type, payload, timestamp],
    )
    .context("Failed to insert event")?;
    Ok(())
}

/// Applies the partial update and refreshes both timestamp fields. Returns
/// false when no such agent row exists (detected on the unconditional
/// timestamp write).
fn apply_agent_update(
    conn: &Connection,
    project_id: i64,
    name: &str,
    update: &AgentUpdate,
    now: &str,
) -> Result<bool> {
    if let Some(phase) = &update.phase {
        conn.execute(
            "UPDATE agents SET phase = ?1 WHERE project_id = ?2 AND name = ?3",
            params![phase, project_id, name],
        )
        .context("Failed to update agent phase")?;
    }
    if let Some(status) = &update.status {
        conn.execute(
            "UPDATE agents SET status = ?1 WHERE project_id = ?2 AND name = ?3",
            params![status, project_id, name],
        )
        .context("Failed to update agent status")?;
    }
    if let Some(progress) = &update.progress {
        conn.execute(
            "UPDATE agents SET progress = ?1 WHERE project_id = ?2 AND name = ?3",
            params![progress, project_id, name],
        )
        .context("Failed to update agent progress")?;
    }
    if let Some(completed) = update.todos_completed {
        conn.execute(
            "UPDATE agents SET todos_completed = ?1 WHERE project_id = ?2 AND name = ?3",
            params![completed, project_id, name],
        )
        .context("Failed to update agent todos_completed")?;
    }
    if let Some(total) = update.todos_total {
        conn.execute(
            "UPDATE agents SET todos_total = ?1 WHERE project_id = ?2 AND name = ?3",
            params![total, project_id, name],
        )
        .context("Failed to update agent todos_total")?;
    }
    let last_update = update.last_update.as_deref().unwrap_or(now);
    let affected = conn
        .execute(
            "UPDATE agents SET last_update = ?1, updated_at = ?2 WHERE project_id = ?3 AND name = ?4",
            params![last_update, now, project_id, name],
        )
        .context("Failed to update agent timestamps")?;
    Ok(affected > 0)
}

/// First write for a (project, phase) inserts the row as given. Later writes
/// keep the stored start and only land a completion, deriving the duration
/// when that completion meets a prior start.
fn apply_timeline_upsert(
    conn: &Connection,
    project_id: i64,
    phase_number: i64,
    started_at: Option<&str>,
    completed_at: Option<&str>,
) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT started_at FROM phase_timeline WHERE project_id = ?1 AND phase_number = ?2")
        .context("Failed to prepare timeline lookup")?;
    let mut rows = stmt
        .query_map(params![project_id, phase_number], |row| {
            row.get::<_, Option<String>>(0)
        })
        .context("Failed to query timeline row")?;
    match rows.next() {
        Some(row) => {
            let existing_start = row.context("Failed to read timeline row")?;
            if let Some(completed) = completed_at {
                let duration = existing_start
                    .as_deref()
                    .and_then(|started| minutes_between(started, completed));
                conn.execute(
                    "UPDATE phase_timeline SET completed_at = ?1, duration_minutes = ?2
                     WHERE project_id = ?3 AND phase_number = ?4",
                    params![completed, duration, project_id, phase_number],
                )
                .context("Failed to update timeline completion")?;
            }
        }
        None => {
            conn.execute(
                "INSERT INTO phase_timeline (project_id, phase_number, started_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![project_id, phase_number, started_at, completed_at],
            )
            .context("Failed to insert timeline row")?;
        }
    }
    Ok(())
}

// ── Row helpers ───────────────────────────────────────────────────────

/// Intermediate row struct for reading projects from SQLite before parsing
/// the status string into its typed value.
struct ProjectRow {
    id: i64,
    name: String,
    version: String,
    current_phase: i64,
    current_feature: Option<String>,
    status: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    overall_progress: String,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project> {
        let status = ProjectStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse project status")?;
        Ok(Project {
            id: self.id,
            name: self.name,
            version: self.version,
            current_phase: self.current_phase,
            current_feature: self.current_feature,
            status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            overall_progress: self.overall_progress,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn project_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        current_phase: row.get(3)?,
        current_feature: row.get(4)?,
        status: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        overall_progress: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn agent_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        phase: row.get(3)?,
        status: row.get(4)?,
        progress: row.get(5)?,
        todos_completed: row.get(6)?,
        todos_total: row.get(7)?,
        last_update: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Intermediate row struct for events before parsing the data column JSON.
struct EventRow {
    id: i64,
    project_id: i64,
    agent_name: Option<String>,
    event_type: String,
    data: String,
    timestamp: String,
}

impl EventRow {
    fn into_record(self) -> Result<EventRecord> {
        let data: serde_json::Value = serde_json::from_str(&self.data)
            .map_err(|e| anyhow::anyhow!("corrupt event data JSON '{}': {}", self.data, e))?;
        Ok(EventRecord {
            id: self.id,
            project_id: self.project_id,
            agent_name: self.agent_name,
            event_type: self.event_type,
            data,
            timestamp: self.timestamp,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_create_tables_and_indexes() -> Result<()> {
        let store = SqliteStore::new_in_memory()?;

        let table_count: i32 = store.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
             AND name IN ('projects', 'agents', 'events', 'phase_timeline')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 4, "Expected 4 tables to exist");

        let index_count: i32 = store.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index'
             AND name IN ('idx_agents_project', 'idx_events_project',
                          'idx_events_timestamp', 'idx_phase_timeline_project')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(index_count, 4, "Expected 4 indexes to exist");

        Ok(())
    }

    #[test]
    fn test_create_project_seeds_full_roster() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        let project = store.get_project(id)?.expect("project should exist");
        assert_eq!(project.name, "Demo");
        assert_eq!(project.version, "1.0.0");
        assert_eq!(project.current_phase, 1);
        assert_eq!(project.status, ProjectStatus::Initialized);
        assert!(project.started_at.is_some());
        assert_eq!(project.overall_progress, "0%");

        let agents = store.get_agents(id)?;
        assert_eq!(agents.len(), AGENT_ROSTER.len());
        let mut expected: Vec<&str> = AGENT_ROSTER.to_vec();
        expected.sort();
        let names: Vec<&str> = agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, expected);
        for agent in &agents {
            assert_eq!(agent.phase, DEFAULT_AGENT_PHASE);
            assert_eq!(agent.status, DEFAULT_AGENT_STATUS);
            assert_eq!(agent.progress, DEFAULT_PROGRESS);
            assert_eq!(agent.todos_completed, 0);
            assert_eq!(agent.todos_total, 0);
            assert!(agent.last_update.is_none());
        }

        Ok(())
    }

    #[test]
    fn test_create_project_logs_created_event() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        let events = store.get_events(id, 10)?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_PROJECT_CREATED);
        assert!(events[0].agent_name.is_none());
        assert_eq!(events[0].data["name"], "Demo");

        Ok(())
    }

    #[test]
    fn test_active_project_follows_updated_at() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let first = store.create_project("First", "1.0.0")?;
        let second = store.create_project("Second", "1.0.0")?;

        let active = store.get_active_project()?.expect("active project");
        assert_eq!(active.id, second);

        // Touching the first project with an empty update makes it active again.
        store.update_project(first, &ProjectUpdate::default())?;
        let active = store.get_active_project()?.expect("active project");
        assert_eq!(active.id, first);

        Ok(())
    }

    #[test]
    fn test_update_project_unknown_id_is_error() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let err = store
            .update_project(42, &ProjectUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectNotFound { id: 42 }));
        Ok(())
    }

    #[test]
    fn test_update_agent_applies_fields_and_logs_one_event() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        let update = AgentUpdate {
            status: Some("IN_PROGRESS".to_string()),
            progress: Some("40%".to_string()),
            todos_completed: Some(4),
            todos_total: Some(10),
            ..Default::default()
        };
        store.update_agent(id, "backend", &update)?;

        let agent = store.get_agent(id, "backend")?.expect("agent should exist");
        assert_eq!(agent.status, "IN_PROGRESS");
        assert_eq!(agent.progress, "40%");
        assert_eq!(agent.todos_completed, 4);
        assert_eq!(agent.todos_total, 10);
        assert!(agent.last_update.is_some());
        assert_eq!(agent.phase, DEFAULT_AGENT_PHASE, "untouched field survives");

        let events = store.get_events(id, 10)?;
        let updates: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == EVENT_AGENT_UPDATED)
            .collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].agent_name.as_deref(), Some("backend"));
        assert_eq!(updates[0].data["progress"], "40%");
        assert!(updates[0].data.get("phase").is_none());

        Ok(())
    }

    #[test]
    fn test_update_agent_unknown_name_rolls_back() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        let err = store
            .update_agent(id, "mystery", &AgentUpdate::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::AgentNotFound { .. }));

        // The rejected update must not have appended an event.
        let events = store.get_events(id, 10)?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EVENT_PROJECT_CREATED);

        Ok(())
    }

    #[test]
    fn test_update_agent_explicit_last_update_wins() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        let stamp = "2024-01-01T00:00:00+00:00";
        let update = AgentUpdate {
            last_update: Some(stamp.to_string()),
            ..Default::default()
        };
        store.update_agent(id, "qa", &update)?;

        let agent = store.get_agent(id, "qa")?.expect("agent should exist");
        assert_eq!(agent.last_update.as_deref(), Some(stamp));

        Ok(())
    }

    #[test]
    fn test_timeline_duration_floors_to_whole_minutes() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        store.upsert_phase_timeline(id, 1, Some("2024-01-01T10:00:00+00:00"), None)?;
        store.upsert_phase_timeline(id, 1, None, Some("2024-01-01T11:30:59+00:00"))?;

        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].phase_number, 1);
        assert_eq!(timeline[0].duration_minutes, Some(90));

        Ok(())
    }

    #[test]
    fn test_timeline_first_start_wins() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        store.upsert_phase_timeline(id, 2, Some("2024-01-01T10:00:00+00:00"), None)?;
        store.upsert_phase_timeline(id, 2, Some("2024-01-01T12:00:00+00:00"), None)?;

        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(
            timeline[0].started_at.as_deref(),
            Some("2024-01-01T10:00:00+00:00")
        );

        // Duration measures from the original start.
        store.upsert_phase_timeline(id, 2, None, Some("2024-01-01T11:00:00+00:00"))?;
        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline[0].duration_minutes, Some(60));

        Ok(())
    }

    #[test]
    fn test_timeline_completion_without_start_has_no_duration() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        store.upsert_phase_timeline(id, 3, None, Some("2024-01-01T11:00:00+00:00"))?;

        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline.len(), 1);
        assert!(timeline[0].started_at.is_none());
        assert!(timeline[0].completed_at.is_some());
        assert!(timeline[0].duration_minutes.is_none());

        Ok(())
    }

    #[test]
    fn test_get_events_returns_newest_first_with_limit() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        for i in 0..5 {
            store.log_event(id, None, "CUSTOM", &serde_json::json!({"n": i}))?;
        }

        let events = store.get_events(id, 2)?;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data["n"], 4);
        assert_eq!(events[1].data["n"], 3);

        Ok(())
    }

    #[test]
    fn test_log_event_unknown_project_is_error() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let err = store
            .log_event(42, None, "CUSTOM", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectNotFound { id: 42 }));
        Ok(())
    }

    #[test]
    fn test_export_import_round_trip() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Round Trip", "2.1.0")?;
        store.update_project(
            id,
            &ProjectUpdate {
                current_phase: Some(3),
                status: Some(ProjectStatus::InProgress),
                overall_progress: Some("45%".to_string()),
                ..Default::default()
            },
        )?;
        store.update_agent(
            id,
            "backend",
            &AgentUpdate {
                status: Some("IN_PROGRESS".to_string()),
                progress: Some("60%".to_string()),
                todos_completed: Some(6),
                todos_total: Some(10),
                ..Default::default()
            },
        )?;
        store.upsert_phase_timeline(id, 1, Some("2024-01-01T10:00:00+00:00"), None)?;
        store.upsert_phase_timeline(id, 1, None, Some("2024-01-01T10:45:00+00:00"))?;
        store.upsert_phase_timeline(id, 2, Some("2024-01-01T10:45:00+00:00"), None)?;

        let exported = store.export_snapshot(id)?;

        let mut other = SqliteStore::new_in_memory()?;
        let imported_id = other.import_snapshot(&exported)?;
        let reexported = other.export_snapshot(imported_id)?;

        assert_eq!(exported, reexported);

        // Durations were recomputed during replay, not copied.
        let timeline = other.get_phase_timeline(imported_id)?;
        assert_eq!(timeline[0].duration_minutes, Some(45));

        Ok(())
    }

    #[test]
    fn test_import_skips_unknown_agents() -> Result<()> {
        let mut snapshot: Snapshot = serde_json::from_str(r#"{"project": "Demo"}"#)?;
        snapshot.agents.insert(
            "mystery".to_string(),
            serde_json::from_str::<AgentSnapshot>("{}")?,
        );

        let mut store = SqliteStore::new_in_memory()?;
        let id = store.import_snapshot(&snapshot)?;

        let agents = store.get_agents(id)?;
        assert_eq!(agents.len(), AGENT_ROSTER.len());
        assert!(agents.iter().all(|a| a.name != "mystery"));

        Ok(())
    }

    #[test]
    fn test_import_invalid_status_mutates_nothing() -> Result<()> {
        let mut snapshot: Snapshot = serde_json::from_str(r#"{"project": "Demo"}"#)?;
        snapshot.status = "BANANA".to_string();

        let mut store = SqliteStore::new_in_memory()?;
        let err = store.import_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshot(_)));
        assert!(store.get_active_project()?.is_none());

        Ok(())
    }

    #[test]
    fn test_commit_transition_applies_phase_timeline_and_resets() -> Result<()> {
        let mut store = SqliteStore::new_in_memory()?;
        let id = store.create_project("Demo", "1.0.0")?;

        let change = PhaseChange {
            target_phase: 3,
            started_at: "2024-01-01T10:00:00+00:00".to_string(),
            reset_agents: vec![
                "backend".to_string(),
                "frontend".to_string(),
                "qa".to_string(),
            ],
        };
        store.commit_transition(id, &change)?;

        let project = store.get_project(id)?.expect("project should exist");
        assert_eq!(project.current_phase, 3);

        let timeline = store.get_phase_timeline(id)?;
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].phase_number, 3);
        assert_eq!(
            timeline[0].started_at.as_deref(),
            Some("2024-01-01T10:00:00+00:00")
        );

        for name in ["backend", "frontend", "qa"] {
            let agent = store.get_agent(id, name)?.expect("agent should exist");
            assert_eq!(agent.status, AGENT_STATUS_IN_PROGRESS);
            assert_eq!(agent.progress, DEFAULT_PROGRESS);
        }
        // Agents outside the reset list keep their seed state.
        let docs = store.get_agent(id, "docs")?.expect("agent should exist");
        assert_eq!(docs.status, DEFAULT_AGENT_STATUS);

        let events = store.get_events(id, 10)?;
        let resets = events
            .iter()
            .filter(|e| e.event_type == EVENT_AGENT_UPDATED)
            .count();
        assert_eq!(resets, 3);

        Ok(())
    }
}
