//! Karaoke Back binary entrypoint wiring REST, SSE and the request store.

use std::{env, future::Future, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use karaoke_back::{
    config::AppConfig,
    dao::{
        request_store::{RequestStore, memory::MemoryRequestStore},
        storage::StorageError,
    },
    routes,
    services::{
        handoff::{DeepLinkOpener, LoggingOpener},
        storage_supervisor,
    },
    state::{AppState, SharedState},
};

const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";
const HANDOFF_WEBHOOK_ENV: &str = "HANDOFF_WEBHOOK_URL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config, build_opener());

    start_storage(app_state.clone()).await;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick how staff hand-offs are delivered.
fn build_opener() -> Arc<dyn DeepLinkOpener> {
    let endpoint = env::var(HANDOFF_WEBHOOK_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());

    match endpoint {
        #[cfg(feature = "webhook-handoff")]
        Some(endpoint) => {
            info!(%endpoint, "staff hand-off delivered through webhook");
            Arc::new(karaoke_back::services::handoff::WebhookOpener::new(endpoint))
        }
        #[cfg(not(feature = "webhook-handoff"))]
        Some(_) => {
            warn!("HANDOFF_WEBHOOK_URL set but the webhook-handoff feature is disabled");
            Arc::new(LoggingOpener)
        }
        None => Arc::new(LoggingOpener),
    }
}

/// Spawn the storage supervisor for the configured backend. Settings that can
/// never work leave the service permanently degraded instead.
async fn start_storage(state: SharedState) {
    let backend = env::var(STORAGE_BACKEND_ENV).unwrap_or_else(|_| "memory".into());

    match backend.as_str() {
        "memory" => {
            let store = MemoryRequestStore::new();
            info!("using in-memory request store");
            spawn_supervisor(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RequestStore>) }
            });
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use karaoke_back::dao::request_store::mongodb::{MongoConfig, MongoRequestStore};

            match MongoConfig::from_env().await {
                Ok(config) => spawn_supervisor(state, move || {
                    let config = config.clone();
                    async move {
                        let store = MongoRequestStore::connect(config).await?;
                        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RequestStore>)
                    }
                }),
                Err(err) => misconfigured(&state, err.to_string()),
            }
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use karaoke_back::dao::request_store::couchdb::{CouchConfig, CouchRequestStore};

            match CouchConfig::from_env() {
                Ok(config) => spawn_supervisor(state, move || {
                    let config = config.clone();
                    async move {
                        let store = CouchRequestStore::connect(config).await?;
                        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RequestStore>)
                    }
                }),
                Err(err) => misconfigured(&state, err.to_string()),
            }
        }
        other => misconfigured(
            &state,
            format!("unsupported {STORAGE_BACKEND_ENV} `{other}`"),
        ),
    }
}

fn spawn_supervisor<F, Fut>(state: SharedState, connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RequestStore>, StorageError>> + Send + 'static,
{
    tokio::spawn(storage_supervisor::run(state, connect));
}

fn misconfigured(state: &SharedState, reason: String) {
    error!(%reason, "storage backend misconfigured; serving in degraded mode");
    state.mark_misconfigured(reason);
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
