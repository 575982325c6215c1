use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Arg, ArgAction, ArgMatches};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, span, warn, Instrument, Level};
use tracing_subscriber::EnvFilter;

use crate::{
    adapters::ObjectStore,
    download::Downloader,
    fs::TokioFs,
    model::{error::RunError, summary::Summary},
    util::object::Provider,
};

mod adapters;
mod config;
mod download;
mod enumerate;
mod fetch;
mod fs;
mod model;
mod util;

const EXIT_OBJECTS_FAILED: u8 = 1;
const EXIT_FATAL: u8 = 2;

pub fn command() -> clap::Command {
    clap::Command::new("objectdl")
        .version(clap::crate_version!())
        .about("Downloads every object in a bucket into a local directory")
        .arg(
            Arg::new("BUCKET")
                .required(true)
                .index(1)
                .help("bucket name, s3://bucket or gs://bucket"),
        )
        .arg(
            Arg::new("DESTINATION")
                .required(true)
                .index(2)
                .value_parser(clap::value_parser!(PathBuf))
                .help("local root directory"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .env("OBJECTDL_PREFIX")
                .help("only download keys under this prefix"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .env("OBJECTDL_WORKERS")
                .value_parser(clap::value_parser!(usize))
                .default_value("16")
                .help("concurrent downloads, 0 for one per object"),
        )
        .arg(Arg::new("endpoint").long("endpoint").env("OBJECTDL_ENDPOINT"))
        .arg(Arg::new("region").long("region").env("OBJECTDL_REGION"))
        .arg(
            Arg::new("access-key")
                .long("access-key")
                .env("OBJECTDL_ACCESS_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .env("OBJECTDL_SECRET_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(clap::value_parser!(u64))
                .help("connect timeout in seconds"),
        )
        .arg(
            Arg::new("path-style")
                .long("path-style")
                .action(ArgAction::SetTrue)
                .help("use path-style bucket addressing"),
        )
        .arg(
            Arg::new("atomic")
                .long("atomic")
                .action(ArgAction::SetTrue)
                .help("write to a part file and rename it when complete"),
        )
        .arg(
            Arg::new("abort-on-disk-full")
                .long("abort-on-disk-full")
                .action(ArgAction::SetTrue)
                .help("stop starting new downloads once the disk is full"),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Must happen before parsing so clap sees the variables.
    if let Err(err) = config::load_env_file() {
        error!(error_message = %err, error_group = "config");
        eprintln!("objectdl: {}", err);
        return ExitCode::from(EXIT_FATAL);
    }

    let matches = command().get_matches();

    let span = span!(Level::INFO, "main", context = "main");
    match run(&matches).instrument(span).await {
        Err(err) => {
            error!(error_message = %err, error_group = "fatal");
            eprintln!("objectdl: {}", err);
            ExitCode::from(EXIT_FATAL)
        }
        Ok(summary) => {
            for (key, err) in &summary.errors {
                eprintln!("{}: {}", key, err);
            }
            println!("{}", summary);

            if summary.is_complete_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_OBJECTS_FAILED)
            }
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<Summary, RunError> {
    let (store, download) = config::from_matches(matches)?;
    info!(
        bucket = %download.bucket,
        destination = %download.destination.display(),
        "args"
    );

    if store.provider.is_gcs()
        && (store.endpoint.is_some() || store.credentials.is_some() || store.region.is_some())
    {
        warn!("endpoint, region and credentials are ignored for gs:// buckets");
    }

    let client: Arc<dyn ObjectStore> = match store.provider {
        Provider::AWS => Arc::new(adapters::s3::connect(&store).await),
        Provider::GCS => Arc::new(adapters::gcs::connect().await?),
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    Downloader::new(client, Arc::new(TokioFs), download)
        .run(cancel)
        .await
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupted, finishing downloads in flight");
        cancel.cancel();
    }
}
