use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use share_storage::{BucketStorage, ContentClassifier, ObjectKeyGenerator};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use cloudshare::{
    server,
    types::Config,
    watcher::DirectoryWatcher,
    worker::Dispatcher,
};

/// All published objects live under this prefix
const KEY_PREFIX: &str = "shots";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // JSON logs in production, human readable output in development
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.environment.json_logs() {
        fmt().json().with_env_filter(env_filter).init();
    } else {
        fmt().with_env_filter(env_filter).init();
    }

    info!(
        "Starting cloudshare in {:?} environment, publishing to bucket {}",
        config.environment, config.bucket_name
    );

    let s3_client = Arc::new(S3Client::from_conf(config.s3_client_config().await));
    let storage = Arc::new(
        BucketStorage::new(
            s3_client,
            config.bucket_name.clone(),
            &config.bucket_domain,
            ObjectKeyGenerator::new(KEY_PREFIX),
        )
        .with_classifier(ContentClassifier::with_extension_types(
            config.extra_mime_types.clone(),
        ))
        .with_part_size(config.part_size),
    );

    let watcher = DirectoryWatcher::new(&config.watch_path)?;

    let mut dispatcher = Dispatcher::new(storage.clone(), config.sink.build(), config.failure_policy);
    let shutdown_token = dispatcher.shutdown_token();

    // Start control surface
    let router = server::router(storage);
    let server_shutdown = shutdown_token.clone();
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = server::start_control_server(router, port, server_shutdown).await {
            error!("Control server error: {e}");
        }
    });

    // Spawn signal handler
    let signal_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                signal_shutdown.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
            }
        }
    });

    let result = dispatcher.run(watcher).await;
    shutdown_token.cancel();

    match result {
        Ok(summary) => {
            info!(
                "cloudshare stopped: {} uploaded, {} failed",
                summary.uploaded, summary.failed
            );
            Ok(())
        }
        Err(e) => {
            error!("Dispatcher error: {e}");
            Err(e.into())
        }
    }
}
