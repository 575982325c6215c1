use std::{io, path::Path, pin::Pin};

use futures::future::BoxFuture;
use tokio::io::AsyncWrite;

/// Writable handle to a local file. Dropping it closes the file.
pub type LocalFile = Pin<Box<dyn AsyncWrite + Send>>;

/// Local filesystem operations used to materialize downloaded objects.
pub trait LocalFs: Send + Sync {
    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>>;

    /// Creates `path`, truncating it if it already exists.
    fn create_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<LocalFile>>;

    fn rename<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>>;

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioFs;

impl LocalFs for TokioFs {
    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(tokio::fs::create_dir_all(path))
    }

    fn create_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<LocalFile>> {
        Box::pin(async move {
            let file = tokio::fs::File::create(path).await?;
            Ok(Box::pin(file) as LocalFile)
        })
    }

    fn rename<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(tokio::fs::rename(from, to))
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(tokio::fs::remove_file(path))
    }
}
