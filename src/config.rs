//! Runtime configuration.
//!
//! All persistent state lives under `.foreman/` inside the project
//! directory. An optional `.foreman/foreman.toml` selects the storage
//! backend and tunes the gates; a missing file means defaults, so `init`
//! works in a bare directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::gates::{DisabledParser, DocParser, SerdeDocParser};
use crate::models::Snapshot;
use crate::store::{ContextFileStore, SqliteStore, StateStore};

pub const STATE_DIR: &str = ".foreman";
pub const DB_FILE: &str = "foreman.db";
pub const CONTEXT_FILE: &str = "context.json";
pub const SETTINGS_FILE: &str = "foreman.toml";

/// Which persistence backend holds project state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Sqlite,
    ContextFile,
}

/// Contents of `.foreman/foreman.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    backend: BackendKind,
    project: ProjectSettings,
    gates: GateSettings,
}

/// Identity used by `init` when no flags are given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ProjectSettings {
    name: String,
    version: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self { name: "Multi-Agent Development System".to_string(), version: "1.0.0".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct GateSettings {
    yaml_checks: bool,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self { yaml_checks: true }
    }
}

impl FileSettings {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid settings in {}", path.display()))
    }
}

/// Resolved runtime configuration for one project directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub context_path: PathBuf,
    pub backend: BackendKind,
    pub yaml_checks: bool,
    pub default_name: String,
    pub default_version: String,
}

impl Config {
    pub fn load(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root
            .into()
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let state_dir = project_root.join(STATE_DIR);
        let settings = FileSettings::load(&state_dir.join(SETTINGS_FILE))?;

        Ok(Self {
            db_path: state_dir.join(DB_FILE),
            context_path: state_dir.join(CONTEXT_FILE),
            backend: settings.backend,
            yaml_checks: settings.gates.yaml_checks,
            default_name: settings.project.name,
            default_version: settings.project.version,
            project_root,
            state_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).context("Failed to create state directory")?;
        Ok(())
    }

    /// Builds the document parser the gates run with.
    pub fn parser(&self) -> Box<dyn DocParser> {
        if self.yaml_checks {
            Box::new(SerdeDocParser)
        } else {
            Box::new(DisabledParser)
        }
    }

    /// Opens the configured state backend.
    ///
    /// A SQLite store that comes up with no active project next to a legacy
    /// single-project `context.json` imports that document once, so projects
    /// tracked before the SQLite backend existed survive the switch. Import
    /// problems are logged and skipped; they never block opening the store.
    pub fn open_store(&self) -> Result<Box<dyn StateStore>> {
        self.ensure_directories()?;
        match self.backend {
            BackendKind::Sqlite => {
                let mut store = SqliteStore::new(&self.db_path)?;
                self.import_legacy_context(&mut store);
                Ok(Box::new(store))
            }
            BackendKind::ContextFile => {
                Ok(Box::new(ContextFileStore::new(&self.context_path)?))
            }
        }
    }

    fn import_legacy_context(&self, store: &mut SqliteStore) {
        if !self.context_path.exists() {
            return;
        }
        match store.get_active_project() {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "skipping legacy context import");
                return;
            }
        }

        let imported = read_legacy_snapshot(&self.context_path).and_then(|found| match found {
            Some(snapshot) => {
                let id = store.import_snapshot(&snapshot)?;
                Ok(Some(id))
            }
            None => Ok(None),
        });
        match imported {
            Ok(Some(project_id)) => tracing::info!(
                project_id,
                path = %self.context_path.display(),
                "imported legacy context document"
            ),
            Ok(None) => tracing::debug!(
                path = %self.context_path.display(),
                "context document present but not the legacy single-project shape"
            ),
            Err(e) => tracing::warn!(error = %e, "failed to import legacy context document"),
        }
    }
}

/// Reads `context.json` if it carries the legacy single-project document
/// shape. The document backend's multi-project file shares the same path;
/// that shape has no top-level `project` field and is never auto-imported.
fn read_legacy_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Legacy context document is not valid JSON")?;
    if value.get("project").is_none() {
        return Ok(None);
    }
    let snapshot =
        serde_json::from_value(value).context("Legacy context document has unexpected shape")?;
    Ok(Some(snapshot))
}
