use crate::ingest::IngestError;
use crate::store::StoreError;
use thiserror::Error;

/// Failures surfaced to the UI as dismissible notices.
#[derive(Error, Debug)]
pub enum AppError {
    /// Cached data is left as it was.
    #[error("could not load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: StoreError,
    },

    /// `reconciled` is true when the cache was re-fetched after the rejection.
    #[error("write rejected: {source}")]
    Write {
        #[source]
        source: StoreError,
        reconciled: bool,
    },

    #[error("could not read spreadsheet: {0}")]
    Parse(#[from] IngestError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Load { .. } => "load_failed",
            AppError::Write { .. } => "write_failed",
            AppError::Parse(_) => "parse_failed",
        }
    }
}
