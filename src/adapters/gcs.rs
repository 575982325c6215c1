use std::io;

use futures::{future::BoxFuture, StreamExt, TryStreamExt};
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::{
        objects::{
            download::Range,
            get::GetObjectRequest,
            list::{ListObjectsRequest, ListObjectsResponse},
        },
        storage_client::StorageClient,
    },
};

use crate::{
    adapters::ObjectStore,
    model::{
        error::{ConfigError, StoreError},
        object::{ListPage, ObjectBody, ObjectRef},
    },
};

/// Builds a GCS client from application default credentials.
pub async fn connect() -> Result<Client, ConfigError> {
    let config = ClientConfig::default()
        .with_auth()
        .await
        .map_err(|err| ConfigError::Client(err.to_string()))?;

    Ok(Client::new(config))
}

fn is_not_found(err: &google_cloud_storage::http::Error) -> bool {
    matches!(err, google_cloud_storage::http::Error::Response(res) if res.code == 404)
}

/// Maps one page of a GCS listing. Negative sizes are treated as unknown.
fn to_list_page(lo: ListObjectsResponse) -> ListPage {
    let objects = lo
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|obj| match u64::try_from(obj.size) {
            Ok(size) => ObjectRef::with_size(obj.name, size),
            Err(_) => ObjectRef::new(obj.name),
        })
        .collect();

    let is_truncated = lo.next_page_token.is_some();

    ListPage {
        objects,
        next_token: lo.next_page_token,
        is_truncated,
    }
}

impl ObjectStore for Client {
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        prefix: Option<&'a str>,
        continuation_token: Option<String>,
    ) -> BoxFuture<'a, Result<ListPage, StoreError>> {
        Box::pin(async move {
            let req = ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix: prefix.map(|p| p.to_string()),
                page_token: continuation_token,
                ..Default::default()
            };

            // `self.list_objects` would resolve to `ObjectStore::list_objects`.
            let lo = StorageClient::list_objects(self, &req)
                .await
                .map_err(|err| {
                    if is_not_found(&err) {
                        StoreError::NotFound(bucket.to_string())
                    } else {
                        StoreError::Request(format!("failed to list_objects in: {}, {}", bucket, err))
                    }
                })?;

            Ok(to_list_page(lo))
        })
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<ObjectBody, StoreError>> {
        Box::pin(async move {
            let req = GetObjectRequest {
                bucket: bucket.to_string(),
                object: key.to_string(),
                ..Default::default()
            };

            let body = self
                .download_streamed_object(&req, &Range::default())
                .await
                .map_err(|err| {
                    if is_not_found(&err) {
                        StoreError::NotFound(key.to_string())
                    } else {
                        StoreError::Request(format!("failed to download_object: {}, {}", key, err))
                    }
                })?;

            Ok(body.map_err(io::Error::other).boxed())
        })
    }
}
