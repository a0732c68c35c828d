use crate::commit::{CommitOptions, DEFAULT_CHUNK_SIZE};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Attendance sidecar: JSON lines on stdin/stdout")]
pub struct Config {
    /// Workspace folder to open at startup.
    #[arg(long, env = "ATTENDD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Rows per insert when committing an import.
    #[arg(long, env = "ATTENDD_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, env = "ATTENDD_ROW_DELAY_MS", default_value_t = 100)]
    pub row_delay_ms: u64,

    #[arg(long, env = "ATTENDD_CHUNK_DELAY_MS", default_value_t = 300)]
    pub chunk_delay_ms: u64,

    /// tracing filter, e.g. "info" or "attendd=debug".
    #[arg(long = "log", env = "ATTENDD_LOG", default_value = "info")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            row_delay_ms: 100,
            chunk_delay_ms: 300,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn commit_options(&self) -> CommitOptions {
        CommitOptions {
            chunk_size: self.chunk_size.max(1),
            row_delay: Duration::from_millis(self.row_delay_ms),
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
        }
    }
}
