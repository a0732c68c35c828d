use crate::attendance::AttendanceMap;
use crate::commit::PendingImport;
use crate::config::Config;
use crate::error::AppError;
use crate::roster::RosterCache;
use crate::store::SqliteStore;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Session state. Each cache is owned separately and only touched by the
/// handlers for its concern.
pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub roster: RosterCache,
    pub attendance: AttendanceMap,
    pub pending_import: Option<PendingImport>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            store: None,
            roster: RosterCache::default(),
            attendance: AttendanceMap::default(),
            pending_import: None,
        }
    }

    /// Opens (or creates) the workspace database and drops every cache.
    pub fn select_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let store = SqliteStore::open(&path)?;
        info!(workspace = %path.display(), "workspace opened");
        self.workspace = Some(path);
        self.store = Some(store);
        self.roster = RosterCache::default();
        self.attendance = AttendanceMap::default();
        self.pending_import = None;
        Ok(())
    }

    /// Re-fetches roster and attendance. Returns (students, attendance entries).
    pub fn reload(&mut self) -> Result<(usize, usize), AppError> {
        let Some(store) = self.store.as_ref() else {
            return Ok((0, 0));
        };
        let students = self.roster.refresh(store)?;
        let entries = self.attendance.refresh(store)?;
        info!(students, entries, "caches loaded");
        Ok((students, entries))
    }
}
