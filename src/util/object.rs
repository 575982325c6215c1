use std::{
    ffi::OsString,
    io,
    path::{Component, Path, PathBuf},
};

use crate::model::error::ConfigError;

/// Suffix of the sibling file used by atomic writes.
pub const PART_SUFFIX: &str = ".objectdl-part";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    AWS,
    GCS,
}

impl Provider {
    pub fn is_gcs(&self) -> bool {
        matches!(self, Provider::GCS)
    }
}

/// Splits `s3://bucket`, `gs://bucket` or a bare `bucket` into provider and bucket name.
pub fn parse_bucket_uri(bucket_uri: &str) -> Result<(Provider, &str), ConfigError> {
    match bucket_uri.split_once("://") {
        None => Ok((Provider::AWS, bucket_uri)),
        Some(("s3", bucket)) => Ok((Provider::AWS, bucket)),
        Some(("gs", bucket)) => Ok((Provider::GCS, bucket)),
        Some(_) => Err(ConfigError::UnsupportedProvider(bucket_uri.to_string())),
    }
}

fn invalid_key(key: &str, reason: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("refusing key {:?}: {}", key, reason),
    )
}

/// Maps an object key onto a path under `root`.
///
/// Every `/`-separated segment must be a plain file name. Empty, absolute and
/// dot-segment keys are refused so that no key can land outside `root` or on
/// the same path as another key. A trailing `/` (directory marker) is allowed.
pub fn local_path(root: &Path, key: &str) -> io::Result<PathBuf> {
    if key.is_empty() {
        return Err(invalid_key(key, "empty key"));
    }

    let trimmed = key.strip_suffix('/').unwrap_or(key);
    if trimmed.is_empty() {
        return Err(invalid_key(key, "no path segments"));
    }

    let mut path = root.to_path_buf();
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return Err(invalid_key(key, "empty path segment"));
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == segment => path.push(name),
            _ => return Err(invalid_key(key, "segment is not a plain file name")),
        }
    }

    Ok(path)
}

/// True when any segment of `key` could collide with the part file of another key.
pub fn is_part_key(key: &str) -> bool {
    key.split('/').any(|segment| segment.ends_with(PART_SUFFIX))
}

/// Sibling path an atomic write goes to before being renamed onto `path`.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(PART_SUFFIX);
    path.with_file_name(name)
}
