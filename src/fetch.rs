use std::{io, path::Path};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{
    adapters::ObjectStore,
    fs::{LocalFile, LocalFs},
    model::{
        error::{ObjectError, StoreError},
        object::{ObjectBody, ObjectRef},
        summary::FetchOutcome,
    },
    util::object::{is_part_key, local_path, part_path},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct FetchOptions {
    pub atomic_writes: bool,
}

/// Downloads one object into `root`. Failures are reported in the outcome,
/// never returned.
pub async fn fetch_object(
    client: &dyn ObjectStore,
    fs: &dyn LocalFs,
    bucket: &str,
    object: &ObjectRef,
    root: &Path,
    options: FetchOptions,
) -> FetchOutcome {
    let key = object.key.as_str();

    let path = match local_path(root, key) {
        Ok(path) => path,
        Err(err) => return FetchOutcome::failure(key, ObjectError::write(key, 0, err)),
    };

    if object.is_directory_marker() {
        return match fs.create_dir_all(&path).await {
            Ok(()) => FetchOutcome::success(key, 0),
            Err(err) => FetchOutcome::failure(key, ObjectError::write(key, 0, err)),
        };
    }

    if options.atomic_writes && is_part_key(key) {
        let err = io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing key {:?}: reserved for atomic writes", key),
        );
        return FetchOutcome::failure(key, ObjectError::write(key, 0, err));
    }

    let target = if options.atomic_writes {
        part_path(&path)
    } else {
        path.clone()
    };

    let result = download(client, fs, bucket, object, &target).await;

    let result = match result {
        Ok(bytes_written) if target != path => fs
            .rename(&target, &path)
            .await
            .map(|()| bytes_written)
            .map_err(|err| ObjectError::write(key, bytes_written, err)),
        result => result,
    };

    match result {
        Ok(bytes_written) => {
            debug!(key = key, bytes = bytes_written, "downloaded");
            FetchOutcome::success(key, bytes_written)
        }
        Err(err) => {
            if target != path {
                remove_part(fs, &target).await;
            }
            FetchOutcome::failure(key, err)
        }
    }
}

/// Streams the body of `object` into `target`.
///
/// The body and the file are owned locals, so both are released exactly once
/// on every return path.
async fn download(
    client: &dyn ObjectStore,
    fs: &dyn LocalFs,
    bucket: &str,
    object: &ObjectRef,
    target: &Path,
) -> Result<u64, ObjectError> {
    let key = object.key.as_str();

    let mut body = client
        .get_object(bucket, key)
        .await
        .map_err(|err| ObjectError::fetch(key, 0, err))?;

    if let Some(parent) = target.parent() {
        fs.create_dir_all(parent)
            .await
            .map_err(|err| ObjectError::write(key, 0, err))?;
    }

    let mut file = fs
        .create_file(target)
        .await
        .map_err(|err| ObjectError::write(key, 0, err))?;

    let mut bytes_written = 0u64;
    let copied = copy_body(key, &mut body, &mut file, &mut bytes_written).await;
    drop(body);

    // Flush after a failed copy too, so the partial file matches `bytes_written`.
    let closed = close_file(&mut file).await;
    drop(file);

    copied?;
    closed.map_err(|err| ObjectError::write(key, bytes_written, err))?;

    match object.size {
        Some(size) if size != bytes_written => Err(ObjectError::fetch(
            key,
            bytes_written,
            StoreError::Request(format!(
                "received {} bytes but {} were listed: {}",
                bytes_written, size, key
            )),
        )),
        _ => Ok(bytes_written),
    }
}

async fn copy_body(
    key: &str,
    body: &mut ObjectBody,
    file: &mut LocalFile,
    bytes_written: &mut u64,
) -> Result<(), ObjectError> {
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|err| {
            ObjectError::fetch(
                key,
                *bytes_written,
                StoreError::Request(format!("failed to read body: {}, {}", key, err)),
            )
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|err| ObjectError::write(key, *bytes_written, err))?;
        *bytes_written += chunk.len() as u64;
    }

    Ok(())
}

async fn close_file(file: &mut LocalFile) -> io::Result<()> {
    file.flush().await?;
    file.shutdown().await
}

async fn remove_part(fs: &dyn LocalFs, part: &Path) {
    match fs.remove_file(part).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %part.display(), error_message = %err, error_group = "remove_part", "failed to remove part file");
        }
    }
}
