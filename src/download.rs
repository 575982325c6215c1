use std::sync::Arc;

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::{
    adapters::ObjectStore,
    config::DownloadConfig,
    enumerate::list_all_objects,
    fetch::{fetch_object, FetchOptions},
    fs::LocalFs,
    model::{
        error::{ObjectError, RunError},
        object::ObjectRef,
        summary::{FetchOutcome, Summary},
    },
};

type Queue = Arc<Mutex<mpsc::UnboundedReceiver<ObjectRef>>>;

/// Downloads every object of one bucket into a local directory.
pub struct Downloader {
    client: Arc<dyn ObjectStore>,
    fs: Arc<dyn LocalFs>,
    config: Arc<DownloadConfig>,
}

impl Downloader {
    pub fn new(client: Arc<dyn ObjectStore>, fs: Arc<dyn LocalFs>, config: DownloadConfig) -> Self {
        Self {
            client,
            fs,
            config: Arc::new(config),
        }
    }

    /// Lists the bucket, then fetches every object through the worker pool.
    ///
    /// Only configuration and listing failures are returned as errors.
    /// Per-object failures are collected in the summary. Cancelling `cancel`
    /// stops workers from starting new keys; those keys count as skipped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<Summary, RunError> {
        let span = span!(Level::INFO, "run", bucket = %self.config.bucket);

        async move {
            self.config.validate()?;

            let objects = list_all_objects(
                self.client.as_ref(),
                &self.config.bucket,
                self.config.prefix.as_deref(),
            )
            .await?;

            info!(objects = objects.len(), "found objects to download");

            Ok(self.fetch_all(objects, cancel).await)
        }
        .instrument(span)
        .await
    }

    async fn fetch_all(&self, objects: Vec<ObjectRef>, cancel: CancellationToken) -> Summary {
        let mut summary = Summary::new(objects.len());
        let workers = self.config.concurrency.worker_count(objects.len());
        if workers == 0 {
            return summary.finish();
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for object in objects {
            if let Err(err) = queue_tx.send(object) {
                error!(key = %err.0.key, error_group = "enqueue", "failed to enqueue object");
            }
        }
        drop(queue_tx);

        let queue: Queue = Arc::new(Mutex::new(queue_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        debug!(workers = workers, "starting workers");

        let mut tasks = JoinSet::new();
        for id in 0..workers {
            tasks.spawn(worker(
                id,
                self.client.clone(),
                self.fs.clone(),
                self.config.clone(),
                queue.clone(),
                outcome_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(outcome_tx);

        while let Some(outcome) = outcome_rx.recv().await {
            if let Some(err) = &outcome.error {
                self.report_failure(err, &cancel);
            }
            summary.record(outcome);
        }

        while let Some(res) = tasks.join_next().await {
            if let Err(err) = res {
                error!(error_message = %err, error_group = "join_worker", "worker did not finish");
            }
        }

        let summary = summary.finish();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            bytes = summary.bytes,
            "download finished"
        );

        summary
    }

    fn report_failure(&self, err: &ObjectError, cancel: &CancellationToken) {
        let error_group = match err {
            ObjectError::Fetch { source, .. } if source.is_not_found() => "not_found",
            ObjectError::Fetch { .. } => "fetch",
            ObjectError::Write { .. } => "write",
        };
        warn!(error_message = %err, error_group = error_group, "object failed");

        if self.config.abort_on_disk_full && err.is_disk_full() && !cancel.is_cancelled() {
            error!(error_message = %err, error_group = "disk_full", "disk full, cancelling remaining objects");
            cancel.cancel();
        }
    }
}

async fn worker(
    id: usize,
    client: Arc<dyn ObjectStore>,
    fs: Arc<dyn LocalFs>,
    config: Arc<DownloadConfig>,
    queue: Queue,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
    cancel: CancellationToken,
) {
    let options = FetchOptions {
        atomic_writes: config.atomic_writes,
    };

    loop {
        let next = queue.lock().await.recv().await;
        let Some(object) = next else {
            break;
        };

        if cancel.is_cancelled() {
            debug!(worker = id, "cancelled");
            break;
        }

        let span = span!(Level::INFO, "fetch_object", key = %object.key, worker = id);
        let outcome = fetch_object(
            client.as_ref(),
            fs.as_ref(),
            &config.bucket,
            &object,
            &config.destination,
            options,
        )
        .instrument(span)
        .await;

        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}
