//! Process wiring: pool, migrations, transport, dispatcher and HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use courier_core::repository::OutboxRepository;
use courier_core::transport::TransportClient;
use courier_dispatcher::{DispatchTrigger, Dispatcher};
use courier_outbox_store::{PENDING_CHANNEL, PendingListener, PgOutboxRepository};
use courier_transport::NatsTransport;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::routes;
use crate::state::AppState;

/// Builds the HTTP router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the relay until a shutdown signal arrives.
///
/// Commit notifications from the database wake the dispatcher between polls.
/// On shutdown the HTTP server stops accepting requests, the dispatcher
/// finishes the row it is publishing, and only then is the broker connection
/// released.
///
/// # Errors
///
/// Returns `AppError` if the database, migrations, broker or listener cannot
/// be brought up, or if the server fails.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("database ready");

    let transport = Arc::new(NatsTransport::new(config.transport.clone()));
    transport.start().await?;

    let outbox: Arc<dyn OutboxRepository> = Arc::new(PgOutboxRepository::new(pool.clone()));
    let dispatcher = Dispatcher::new(
        Arc::clone(&outbox),
        transport.clone(),
        config.dispatcher.clone(),
    );

    let shutdown = CancellationToken::new();
    let listener_task = tokio::spawn(forward_pending_notifications(
        pool.clone(),
        dispatcher.trigger(),
        shutdown.clone(),
    ));
    let dispatcher_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { dispatcher.run(shutdown).await }
    });

    let served = serve(&config, AppState::new(outbox), shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = dispatcher_task.await {
        error!(error = %e, "dispatcher task ended abnormally");
    }
    if let Err(e) = listener_task.await {
        error!(error = %e, "notification listener ended abnormally");
    }
    transport.stop().await;
    pool.close().await;
    info!("relay stopped");

    served
}

/// Wakes the dispatcher whenever a commit adds outbox rows, until `shutdown`
/// is cancelled. Polling still picks up anything a lost notification misses.
pub async fn forward_pending_notifications(
    pool: PgPool,
    trigger: DispatchTrigger,
    shutdown: CancellationToken,
) {
    let mut listener = match PendingListener::connect(&pool).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(error = %e, "outbox notifications unavailable, relying on polling");
            return;
        }
    };
    info!(channel = PENDING_CHANNEL, "listening for outbox commits");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = listener.recv() => match received {
                Ok(()) => trigger.notify(),
                Err(e) => {
                    warn!(error = %e, "outbox notification stream interrupted");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            },
        }
    }
}

async fn serve(
    config: &AppConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

/// Resolves on Ctrl-C, SIGTERM, or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("shutdown signal received"),
        () = terminate => info!("shutdown signal received"),
        () = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
