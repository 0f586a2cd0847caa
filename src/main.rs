use std::{process, sync::Arc, time::Duration};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use tsuzuri::{
    application::{
        error::AppError,
        generation::{GenerationOptions, GenerationService},
        posts::PostService,
        repos::{Clock, ObjectStorage, SystemClock, TextGenerator},
        uploads::ImageIngestService,
    },
    cache::{CacheState, InvalidationNotifier, ResponseStore},
    config,
    infra::{
        error::InfraError,
        generation::{HttpGeneratorConfig, HttpTextGenerator, UnconfiguredTextGenerator},
        http::{self, ApiState, HttpState, RouterState},
        invalidation::WebhookInvalidator,
        store::PostStore,
        telemetry,
        uploads::FilesystemStorage,
    },
};

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
        config::Command::Visible(args) => run_visible(settings, args).await,
        config::Command::Check(_) => run_check(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = Arc::new(PostStore::new(settings.store.path.clone()));
    // Fail fast on a corrupt collection instead of on the first request.
    let existing = store.load().await?;
    info!(
        target = "tsuzuri::serve",
        path = %store.path().display(),
        posts = existing.len(),
        "post store loaded"
    );

    let state = build_router_state(&settings, store)?;
    serve_http(&settings, state).await
}

fn build_router_state(
    settings: &config::Settings,
    store: Arc<PostStore>,
) -> Result<RouterState, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let responses = ResponseStore::new();

    let mut notifier = InvalidationNotifier::default().with_target(Arc::new(responses.clone()));
    if let Some(url) = settings.invalidation.webhook_url.clone() {
        let webhook = WebhookInvalidator::new(url, settings.invalidation.timeout)?;
        notifier = notifier.with_target(Arc::new(webhook));
    }

    let posts = Arc::new(PostService::new(
        store.clone(),
        notifier.clone(),
        clock.clone(),
        settings.store.utc_offset,
        settings.generation.default_author.clone(),
    ));

    let generator: Arc<dyn TextGenerator> = match settings.generation.api_key.clone() {
        Some(api_key) => Arc::new(HttpTextGenerator::new(HttpGeneratorConfig {
            endpoint: settings.generation.endpoint.clone(),
            api_key,
            model: settings.generation.model.clone(),
            max_tokens: settings.generation.max_tokens.get(),
            timeout: settings.generation.timeout,
        })?),
        None => {
            warn!(
                target = "tsuzuri::serve",
                "generation.api_key is not set; draft generation requests will fail"
            );
            Arc::new(UnconfiguredTextGenerator)
        }
    };
    let generation = Arc::new(GenerationService::new(
        generator,
        store,
        notifier,
        GenerationOptions {
            image_slots: settings.generation.image_slots,
            timeout: settings.generation.timeout,
            default_author: settings.generation.default_author.clone(),
        },
    ));

    let storage: Arc<dyn ObjectStorage> = Arc::new(
        FilesystemStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.public_base_url.clone(),
        )
        .map_err(InfraError::Io)?,
    );
    let upload_limit = settings.uploads.max_request_bytes.get();
    let uploads = Arc::new(ImageIngestService::new(storage.clone(), upload_limit));

    Ok(RouterState {
        http: HttpState {
            posts: posts.clone(),
            storage,
            cache: CacheState {
                store: responses,
                clock,
                offset: settings.store.utc_offset,
            },
        },
        api: ApiState {
            posts,
            generation,
            uploads,
            upload_limit_bytes: usize::try_from(upload_limit).unwrap_or(usize::MAX),
        },
    })
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_application_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "tsuzuri::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let stop = Arc::new(Notify::new());
    let stop_signal = stop.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { stop_signal.notified().await });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut handle => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(target = "tsuzuri::serve", "shutdown requested");
    stop.notify_one();
    wait_for_drain(handle, settings.server.graceful_shutdown).await
}

async fn wait_for_drain(
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, handle).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "tsuzuri::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_visible(settings: config::Settings, args: config::VisibleArgs) -> Result<(), AppError> {
    let store = Arc::new(PostStore::new(settings.store.path.clone()));
    let clock = SystemClock;
    let reference = match args.date {
        Some(date) => date.midnight().assume_offset(settings.store.utc_offset),
        None => clock.now(),
    };

    let service = PostService::new(
        store,
        InvalidationNotifier::disabled(),
        Arc::new(clock),
        settings.store.utc_offset,
        settings.generation.default_author.clone(),
    );
    let visible = service.visible_at(reference).await?;

    let rendered = serde_json::to_string_pretty(&visible)
        .map_err(|err| AppError::unexpected(format!("failed to encode posts: {err}")))?;
    println!("{rendered}");
    Ok(())
}

async fn run_check(settings: config::Settings) -> Result<(), AppError> {
    let store = PostStore::new(settings.store.path.clone());
    let collection = store.load().await?;

    info!(
        target = "tsuzuri::check",
        path = %store.path().display(),
        posts = collection.len(),
        "post store is consistent"
    );
    println!(
        "{}: {} post(s)",
        store.path().display(),
        collection.len()
    );
    Ok(())
}
