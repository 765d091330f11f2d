// THEORY:
// The server is the transport around the handoff. It owns nothing of its own:
// the registry and editor bus live in `AppState`, which the embedding host also
// uses to build the bridge its workers park on. Stopping the server cancels
// every outstanding request first, so no worker is left parked forever.

pub mod config;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use normal_relight::HandoffRegistry;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::ServerConfig;
pub use routes::{router, AppState};

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<HandoffRegistry>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cancels outstanding requests, then stops accepting connections and
    /// waits for in-flight ones to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let woken = self.registry.cancel_all();
        if woken > 0 {
            tracing::info!("cancelled {woken} outstanding request(s) on shutdown");
        }
        let _ = self.shutdown_tx.send(true);
        self.task.await.context("server task panicked")
    }
}

pub async fn start_server(state: AppState, cfg: &ServerConfig) -> anyhow::Result<ServerHandle> {
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr))?;
    let local_addr = listener.local_addr().context("listener has no local address")?;

    let registry = Arc::clone(&state.registry);
    let app = router(state, cfg.max_body_bytes);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.changed().await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::error!("relight server stopped: {e}");
        }
    });

    tracing::info!("relight server listening on http://{local_addr}");
    Ok(ServerHandle {
        local_addr,
        registry,
        shutdown_tx,
        task,
    })
}

/// Installs the fmt subscriber, honouring `RUST_LOG` when set.
pub fn init_tracing(default_directive: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
