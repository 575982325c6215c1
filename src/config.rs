use std::{num::NonZeroUsize, path::PathBuf};

use clap::ArgMatches;

use crate::{
    model::error::ConfigError,
    util::object::{parse_bucket_uri, Provider},
};

pub const DEFAULT_WORKERS: usize = 16;

/// Degree of parallelism for the fetch workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Concurrency {
    Bounded(NonZeroUsize),
    /// One worker per key.
    Unbounded,
}

impl Concurrency {
    /// `0` means unbounded.
    pub fn from_workers(workers: usize) -> Self {
        match NonZeroUsize::new(workers) {
            Some(n) => Concurrency::Bounded(n),
            None => Concurrency::Unbounded,
        }
    }

    pub fn worker_count(&self, jobs: usize) -> usize {
        match self {
            Concurrency::Bounded(n) => n.get().min(jobs),
            Concurrency::Unbounded => jobs,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::from_workers(DEFAULT_WORKERS)
    }
}

/// What to download and where to put it. Built once, never mutated by a run.
#[derive(Clone, Debug)]
pub struct DownloadConfig {
    pub bucket: String,
    pub prefix: Option<String>,
    pub destination: PathBuf,
    pub concurrency: Concurrency,
    /// Write to a sibling part file and rename on success.
    pub atomic_writes: bool,
    /// Cancel the remaining keys once a write fails with `ENOSPC`.
    pub abort_on_disk_full: bool,
}

impl DownloadConfig {
    pub fn new(bucket: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            destination: destination.into(),
            concurrency: Concurrency::default(),
            atomic_writes: false,
            abort_on_disk_full: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_atomic_writes(mut self, atomic_writes: bool) -> Self {
        self.atomic_writes = atomic_writes;
        self
    }

    pub fn with_abort_on_disk_full(mut self, abort_on_disk_full: bool) -> Self {
        self.abort_on_disk_full = abort_on_disk_full;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::Missing("bucket"));
        }

        if self.bucket.contains('/') {
            return Err(ConfigError::InvalidBucket(self.bucket.clone()));
        }

        if self.destination.as_os_str().is_empty() {
            return Err(ConfigError::Missing("destination"));
        }

        match std::fs::metadata(&self.destination) {
            Ok(meta) if !meta.is_dir() => Err(ConfigError::InvalidDestination {
                path: self.destination.display().to_string(),
                reason: "not a directory".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Connection settings for the object store client.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub provider: Provider,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub credentials: Option<(String, String)>,
    pub force_path_style: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: Provider::AWS,
            endpoint: None,
            region: None,
            credentials: None,
            force_path_style: false,
            timeout_secs: None,
        }
    }
}

/// Loads `.env` from the working directory when one exists.
pub fn load_env_file() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::Env(err.to_string())),
    }
}

/// Builds both configs from the parsed command line.
pub fn from_matches(matches: &ArgMatches) -> Result<(StoreConfig, DownloadConfig), ConfigError> {
    let bucket_uri = matches
        .get_one::<String>("BUCKET")
        .ok_or(ConfigError::Missing("bucket"))?;
    let destination = matches
        .get_one::<PathBuf>("DESTINATION")
        .ok_or(ConfigError::Missing("destination"))?;

    let (provider, bucket) = parse_bucket_uri(bucket_uri)?;

    let credentials = match (
        matches.get_one::<String>("access-key"),
        matches.get_one::<String>("secret-key"),
    ) {
        (Some(access_key), Some(secret_key)) => Some((access_key.clone(), secret_key.clone())),
        (None, None) => None,
        (Some(_), None) => return Err(ConfigError::Missing("secret key")),
        (None, Some(_)) => return Err(ConfigError::Missing("access key")),
    };

    let store = StoreConfig {
        provider,
        endpoint: matches.get_one::<String>("endpoint").cloned(),
        region: matches.get_one::<String>("region").cloned(),
        credentials,
        force_path_style: matches.get_flag("path-style"),
        timeout_secs: matches.get_one::<u64>("timeout").copied(),
    };

    let workers = matches
        .get_one::<usize>("workers")
        .copied()
        .unwrap_or(DEFAULT_WORKERS);

    let mut download = DownloadConfig::new(bucket, destination.clone())
        .with_concurrency(Concurrency::from_workers(workers))
        .with_atomic_writes(matches.get_flag("atomic"))
        .with_abort_on_disk_full(matches.get_flag("abort-on-disk-full"));

    if let Some(prefix) = matches.get_one::<String>("prefix") {
        download = download.with_prefix(prefix.clone());
    }

    download.validate()?;

    Ok((store, download))
}
