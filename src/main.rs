use std::{process, sync::Arc};

use shieldforge::{
    application::{
        designs::DesignService,
        error::AppError,
        layers::LayerDeliveryService,
        repos::{BlobStore, DesignsRepo},
    },
    cache::LayerCache,
    config,
    infra::{
        error::InfraError,
        http::{self, BrowserConfig, HttpState},
        remote::{RemoteClient, RestTableStore, StorageBucket},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings)?;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("server stopped");
    Ok(())
}

fn build_http_state(settings: &config::Settings) -> Result<HttpState, AppError> {
    let client = RemoteClient::from_settings(&settings.remote)?;
    let repo: Arc<dyn DesignsRepo> = Arc::new(RestTableStore::new(client.clone()));
    let blobs: Arc<dyn BlobStore> = Arc::new(StorageBucket::new(
        client,
        settings.remote.bucket.clone(),
    ));
    let cache = Arc::new(LayerCache::new());

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| InfraError::configuration("uploads.max_request_bytes exceeds usize"))?;

    Ok(HttpState {
        designs: Arc::new(DesignService::new(repo, blobs.clone(), cache.clone())),
        layers: Arc::new(LayerDeliveryService::new(cache, blobs)),
        browser_config: Arc::new(BrowserConfig::from_settings(&settings.remote)),
        max_request_bytes,
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
