use std::io;

use thiserror::Error;

/// Failure reported by an object store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Request(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid bucket: {0}")]
    InvalidBucket(String),

    #[error("invalid destination {path}: {reason}")]
    InvalidDestination { path: String, reason: String },

    #[error("unsupported provider in: {0}")]
    UnsupportedProvider(String),

    #[error("failed to load environment file: {0}")]
    Env(String),

    #[error("failed to initialize client: {0}")]
    Client(String),
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("failed to list page {page} of {bucket}: {source}")]
    Request {
        bucket: String,
        page: usize,
        #[source]
        source: StoreError,
    },

    #[error("listing of {bucket} truncated at page {page} without a continuation token")]
    MissingToken { bucket: String, page: usize },

    #[error("listing of {bucket} repeated continuation token at page {page}")]
    StalledToken { bucket: String, page: usize },
}

/// Per-object failure. Recorded in the summary, never fatal to the run.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("fetch failed for {key} after {bytes_written} bytes: {source}")]
    Fetch {
        key: String,
        bytes_written: u64,
        #[source]
        source: StoreError,
    },

    #[error("write failed for {key} after {bytes_written} bytes: {source}")]
    Write {
        key: String,
        bytes_written: u64,
        #[source]
        source: io::Error,
    },
}

impl ObjectError {
    pub fn fetch(key: &str, bytes_written: u64, source: StoreError) -> Self {
        ObjectError::Fetch {
            key: key.to_string(),
            bytes_written,
            source,
        }
    }

    pub fn write(key: &str, bytes_written: u64, source: io::Error) -> Self {
        ObjectError::Write {
            key: key.to_string(),
            bytes_written,
            source,
        }
    }

    pub fn is_disk_full(&self) -> bool {
        match self {
            ObjectError::Write { source, .. } => source.raw_os_error() == Some(libc::ENOSPC),
            ObjectError::Fetch { .. } => false,
        }
    }
}

/// Fatal error that stops a run before any object is fetched.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("enumeration error: {0}")]
    List(#[from] ListError),
}
