mod cli;

use clap::Parser;
use cli::Cli;
use downscale_config::{Config, StoreConfig};
use downscale_pipeline::{Job, run};
use downscale_storage::StoreHandle;
use downscale_storage::backend::{DryRunStore, LocalStore, S3Store};
use downscale_storage::error::Result as StoreResult;
use downscale_transcode::format_support;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Respect `RUST_LOG` if set, otherwise pick a default based on `--verbose`.
fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("downscale=debug,downscale_pipeline=debug,downscale_storage=debug,downscale_transcode=debug")
        } else {
            EnvFilter::new("downscale=info,downscale_pipeline=info,downscale_storage=info,downscale_config=info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn build_store(config: &Config) -> StoreResult<StoreHandle> {
    let store: StoreHandle = match &config.store {
        StoreConfig::S3 { region, endpoint, key_id, key_secret } => {
            Arc::new(S3Store::new("s3", region.as_str(), endpoint.clone(), key_id.as_str(), key_secret.as_str()))
        },
        StoreConfig::Local { root } => Arc::new(LocalStore::new("local", root)?),
    };
    if config.dry_run {
        tracing::info!("Dry run: nothing will be uploaded");
        return Ok(Arc::new(DryRunStore::new(store)));
    }
    Ok(store)
}

fn print_formats() {
    println!("{:<8} {:<5} {:<5} {:<8} {:<24} MIME", "FORMAT", "READ", "WRITE", "SEQUENCE", "SUFFIXES");
    for support in format_support() {
        println!("{support}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if cli.list_formats {
        print_formats();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = ?e, "Could not load configuration");
            return ExitCode::FAILURE;
        },
    };
    tracing::debug!(?config, "Loaded configuration");

    let store = match build_store(&config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = ?e, "Could not set up object store");
            return ExitCode::FAILURE;
        },
    };

    // One runtime thread per worker, matching the leaf concurrency limit.
    let runtime = match tokio::runtime::Builder::new_multi_thread().worker_threads(config.workers).enable_all().build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Could not start async runtime");
            return ExitCode::FAILURE;
        },
    };

    let job = Job {
        source_bucket: config.source_bucket,
        destination_bucket: config.destination_bucket,
        scale: config.scale,
        workers: config.workers,
    };
    match runtime.block_on(run(store, &job)) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            let failed: Vec<&str> = report.failed.iter().map(|(key, _)| key.as_str()).collect();
            tracing::warn!(count = failed.len(), keys = ?failed, "Some images could not be downscaled");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(error = ?e, "Could not list source bucket");
            ExitCode::FAILURE
        },
    }
}
