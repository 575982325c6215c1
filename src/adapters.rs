use futures::future::BoxFuture;

use crate::model::{
    error::StoreError,
    object::{ListPage, ObjectBody},
};

pub mod gcs;
#[cfg(test)]
pub mod mock;
pub mod s3;

/// Read-only view of an object store bucket.
pub trait ObjectStore: Send + Sync {
    /// Lists one page of objects. `continuation_token` is the `next_token` of the previous page.
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        prefix: Option<&'a str>,
        continuation_token: Option<String>,
    ) -> BoxFuture<'a, Result<ListPage, StoreError>>;

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<ObjectBody, StoreError>>;
}
