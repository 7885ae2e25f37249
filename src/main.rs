use std::{io, process, sync::Arc};

use pawnstats::{
    application::error::AppError,
    cache::{CacheConfig, ResponseCache},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
    upstream::ChessComClient,
};
use tokio::{sync::Notify, task::JoinError};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = ResponseCache::new(&CacheConfig::from(&settings.cache));
    let upstream = ChessComClient::new(&settings.upstream).map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to build upstream client: {err}"
        )))
    })?;

    let state = HttpState {
        cache,
        upstream: Arc::new(upstream),
        expose_cache_status: settings.cache.expose_status,
    };

    serve_http(&settings, state).await
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target: "pawnstats::serve",
        addr = %settings.server.addr,
        upstream = %settings.upstream.base_url,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let drain = Arc::clone(&shutdown);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { drain.notified().await });
    let mut handle = tokio::spawn(server.into_future());

    let stopped_early = tokio::select! {
        joined = &mut handle => Some(joined),
        () = shutdown_signal() => None,
    };
    if let Some(joined) = stopped_early {
        return server_result(joined);
    }

    info!(
        target: "pawnstats::serve",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown signal received, draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, handle).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target: "pawnstats::serve",
                "graceful shutdown timed out, dropping open connections"
            );
            Ok(())
        }
    }
}

fn server_result(joined: Result<io::Result<()>, JoinError>) -> Result<(), AppError> {
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
        () = ctrl_c => {},
        () = terminate => {},
    }
}
