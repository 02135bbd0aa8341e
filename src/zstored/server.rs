//! zstored daemon: backend attach and HTTP serving

use crate::common::{
    format_bytes, percent_of, request_tracing_middleware, BackendKind, Config, Error, Result,
};
use crate::storage::{zfs, MemoryPool, Pool, ZfsPool};
use crate::zstored::http::{create_router, StorageState};
use axum::{middleware, Router};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::limit::RequestBodyLimitLayer;

pub struct Daemon {
    config: Config,
    pool: Arc<dyn Pool>,
}

impl Daemon {
    /// Attach to the configured backend.
    ///
    /// For ZFS this checks the kernel module, looks up the zpool, logs its
    /// usage and refuses to start unless it is `ONLINE`.
    pub async fn attach(config: Config) -> Result<Self> {
        let pool: Arc<dyn Pool> = match config.backend {
            BackendKind::Memory => {
                tracing::info!(
                    "memory pool: {} [capacity {}]",
                    config.pool,
                    format_bytes(config.memory_capacity)
                );
                Arc::new(MemoryPool::new(config.pool.clone(), config.memory_capacity))
            }
            BackendKind::Zfs => {
                if !zfs::is_enabled()? {
                    return Err(Error::ZfsUnavailable(format!(
                        "{} missing, is the ZFS kernel module loaded?",
                        zfs::DEV_ZFS
                    )));
                }

                let (pool, stats) = ZfsPool::attach(&config.pool).await.map_err(|e| match e {
                    Error::NotExists => Error::InvalidConfig(format!(
                        "required zpool {:?} does not exist",
                        config.pool
                    )),
                    other => other,
                })?;

                tracing::info!(
                    "zpool: {} [{}] [{} / {}, {}%]",
                    stats.name,
                    stats.health,
                    format_bytes(stats.allocated),
                    format_bytes(stats.size),
                    percent_of(stats.allocated, stats.size)
                );
                stats.ensure_online()?;

                Arc::new(pool)
            }
        };

        Ok(Self::with_pool(config, pool))
    }

    /// Serve an already attached pool.
    pub fn with_pool(config: Config, pool: Arc<dyn Pool>) -> Self {
        Self { config, pool }
    }

    pub fn pool(&self) -> &Arc<dyn Pool> {
        &self.pool
    }

    /// Storage API with request tracing and the body size limit applied.
    pub fn router(&self) -> Router {
        let state = StorageState::new(self.pool.clone(), &self.config.api_prefix);
        create_router(state)
            .layer(RequestBodyLimitLayer::new(self.config.max_body_bytes))
            .layer(middleware::from_fn(request_tracing_middleware))
    }

    /// Bind the configured address and serve until ctrl-c or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves. In-flight requests get
    /// `shutdown_timeout_secs` to finish before their connections are dropped.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Starting zstored");
        tracing::info!("  HTTP API: {}", listener.local_addr()?);
        tracing::info!("  Prefix: {}", self.config.api_prefix);
        tracing::info!("  Pool: {} ({})", self.pool.name(), self.config.backend);

        let grace = Duration::from_secs(self.config.shutdown_timeout_secs);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("shutdown signal received, draining requests");
                let _ = stop_tx.send(true);
            })
            .into_future();

        let deadline = async move {
            let stopping = stop_rx.wait_for(|stopped| *stopped).await.is_ok();
            if !stopping {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            res = server => res?,
            _ = deadline => {
                tracing::warn!("requests still running after {:?}, closing connections", grace);
            }
        }

        tracing::info!("graceful shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for ctrl-c: {}", e);
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
                tracing::error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        Config {
            backend: BackendKind::Memory,
            pool: "testpool".into(),
            memory_capacity: 1024,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_attach_memory_backend() {
        let daemon = Daemon::attach(memory_config()).await.unwrap();
        assert_eq!(daemon.pool().name(), "testpool");
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let daemon = Daemon::attach(memory_config()).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            daemon.serve_on(listener, async {}),
        )
        .await
        .expect("server did not stop");
        assert!(result.is_ok());
    }
}
