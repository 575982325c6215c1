use std::collections::HashSet;

use tracing::{debug, info, span, Instrument, Level};

use crate::{
    adapters::ObjectStore,
    model::{error::ListError, object::ObjectRef},
};

/// Lists every object in `bucket`, following continuation tokens until the
/// store reports the listing complete.
///
/// Either the whole key set is returned or an error is. A page that claims
/// more results without a usable token is an error rather than the end.
pub async fn list_all_objects(
    client: &dyn ObjectStore,
    bucket: &str,
    prefix: Option<&str>,
) -> Result<Vec<ObjectRef>, ListError> {
    let span = span!(Level::INFO, "list_objects", bucket = bucket);

    async move {
        let mut objects = Vec::new();
        let mut seen = HashSet::new();
        let mut continuation_token: Option<String> = None;
        let mut page = 0;

        loop {
            page += 1;

            let lp = client
                .list_objects(bucket, prefix, continuation_token.clone())
                .await
                .map_err(|source| ListError::Request {
                    bucket: bucket.to_string(),
                    page,
                    source,
                })?;

            debug!(page = page, count = lp.objects.len(), "listed page");

            for object in lp.objects {
                if object.key.is_empty() {
                    continue;
                }

                if seen.insert(object.key.clone()) {
                    objects.push(object);
                }
            }

            if !lp.is_truncated {
                break;
            }

            match lp.next_token {
                None => {
                    return Err(ListError::MissingToken {
                        bucket: bucket.to_string(),
                        page,
                    })
                }
                Some(tok) if continuation_token.as_ref() == Some(&tok) => {
                    return Err(ListError::StalledToken {
                        bucket: bucket.to_string(),
                        page,
                    })
                }
                Some(tok) => continuation_token = Some(tok),
            }
        }

        info!(pages = page, objects = objects.len(), "listing complete");

        Ok(objects)
    }
    .instrument(span)
    .await
}
