use std::{io, time::Duration};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{error::DisplayErrorContext, operation::list_objects_v2::ListObjectsV2Output};
use futures::{future::BoxFuture, stream, StreamExt};

use crate::{
    adapters::ObjectStore,
    config::StoreConfig,
    model::{
        error::StoreError,
        object::{ListPage, ObjectBody, ObjectRef},
    },
};

const CREDENTIALS_PROVIDER: &str = "objectdl";

/// Builds an S3 client from the default AWS chain, overridden by `config`.
pub async fn connect(config: &StoreConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    if let Some((access_key, secret_key)) = &config.credentials {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        loader = loader.credentials_provider(credentials);
    }

    if let Some(secs) = config.timeout_secs {
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(secs))
            .build();
        loader = loader.timeout_config(timeouts);
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

/// Maps one `ListObjectsV2` page. Entries without a key are dropped and
/// negative sizes are treated as unknown.
fn to_list_page(lo: &ListObjectsV2Output) -> ListPage {
    let objects = lo
        .contents()
        .iter()
        .filter_map(|o| {
            let key = o.key()?.to_string();
            Some(match o.size() {
                Some(size) if size >= 0 => ObjectRef::with_size(key, size as u64),
                _ => ObjectRef::new(key),
            })
        })
        .collect();

    let next_token = lo.next_continuation_token().map(|tok| tok.to_string());
    // Some S3-compatible stores omit the flag and only send the token.
    let is_truncated = lo.is_truncated().unwrap_or(next_token.is_some());

    ListPage {
        objects,
        next_token,
        is_truncated,
    }
}

impl ObjectStore for aws_sdk_s3::Client {
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        prefix: Option<&'a str>,
        continuation_token: Option<String>,
    ) -> BoxFuture<'a, Result<ListPage, StoreError>> {
        Box::pin(async move {
            let mut req = self.list_objects_v2().bucket(bucket);

            if let Some(prefix) = prefix {
                req = req.prefix(prefix);
            }

            if let Some(tok) = continuation_token {
                req = req.continuation_token(tok);
            }

            let lo = req.send().await.map_err(|err| {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_bucket() {
                        return StoreError::NotFound(bucket.to_string());
                    }
                }

                StoreError::Request(format!(
                    "failed to list_objects in: {}, {}",
                    bucket,
                    DisplayErrorContext(&err)
                ))
            })?;

            Ok(to_list_page(&lo))
        })
    }

    fn get_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<ObjectBody, StoreError>> {
        Box::pin(async move {
            let o = self
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| {
                    if let Some(svc_err) = err.as_service_error() {
                        if svc_err.is_no_such_key() {
                            return StoreError::NotFound(key.to_string());
                        }
                    }

                    StoreError::Request(format!(
                        "failed to get_object: {}, {}",
                        key,
                        DisplayErrorContext(&err)
                    ))
                })?;

            let body = stream::try_unfold(o.body, |mut body| async move {
                let chunk = body.try_next().await.map_err(io::Error::other)?;
                Ok::<_, io::Error>(chunk.map(|chunk| (chunk, body)))
            });

            Ok(body.boxed())
        })
    }
}
