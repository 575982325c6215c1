use std::io;

use bytes::Bytes;
use futures::stream::BoxStream;

/// Streamed body of a remote object. Dropping it releases the underlying connection.
pub type ObjectBody = BoxStream<'static, io::Result<Bytes>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    pub key: String,
    pub size: Option<u64>,
}

impl ObjectRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
        }
    }

    pub fn with_size(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size: Some(size),
        }
    }

    pub fn is_directory_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// One page of a bucket listing.
#[derive(Clone, Debug, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectRef>,
    pub next_token: Option<String>,
    pub is_truncated: bool,
}
