//! Startup orchestration.
//!
//! # Responsibilities
//! - Build credentials, pool and dispatcher from a validated config
//! - Start the metrics exporter when enabled
//! - Bind the listener and serve until a shutdown signal
//! - Cancel in-flight deliveries, wait for them, then close the pool
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)
//! - The pool closes only after deliveries have drained or the deadline passed

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, RelayConfig};
use crate::crypto::{Credentials, CryptoError};
use crate::dispatch::CallbackDispatcher;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::transport::TransportPool;

/// How long in-flight deliveries get to observe cancellation.
const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("credential setup failed: {0}")]
    Credentials(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address '{0}'")]
    Address(String),

    #[error("metrics setup failed: {0}")]
    Metrics(String),
}

/// Fully wired relay, ready to serve.
pub struct Relay {
    config: RelayConfig,
    dispatcher: Arc<CallbackDispatcher>,
    pool: Arc<TransportPool>,
    shutdown: Arc<Shutdown>,
}

impl Relay {
    /// Wire every subsystem. No sockets are opened yet.
    pub fn build(config: RelayConfig) -> Result<Self, StartupError> {
        let credentials = Arc::new(Credentials::from_config(&config.encryption)?);
        tracing::info!(
            keys = credentials.keyring().len(),
            legacy_enabled = credentials.legacy().is_active(),
            "Credentials loaded"
        );

        let pool = Arc::new(TransportPool::new(config.transport.clone()));
        let dispatcher = Arc::new(CallbackDispatcher::new(
            credentials,
            pool.clone(),
            RetryPolicy::from_config(&config.retries),
        ));

        Ok(Self {
            config,
            dispatcher,
            pool,
            shutdown: Arc::new(Shutdown::new()),
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            dispatcher: self.dispatcher.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<CallbackDispatcher> {
        &self.dispatcher
    }

    pub fn pool(&self) -> &Arc<TransportPool> {
        &self.pool
    }

    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.shutdown
    }

    /// Serve until `signal` resolves, then shut down in order.
    ///
    /// `finish` runs on every exit path, including a server error.
    pub async fn run<F>(self, signal: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let served = self.serve(signal).await;
        if let Err(e) = &served {
            tracing::error!(error = %e, "Relay stopped with an error");
        }
        self.finish().await;
        served
    }

    async fn serve<F>(&self, signal: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.observability.metrics_enabled {
            let addr: SocketAddr = self
                .config
                .observability
                .metrics_address
                .parse()
                .map_err(|_| StartupError::Address(self.config.observability.metrics_address.clone()))?;
            metrics::init_metrics(addr).map_err(StartupError::Metrics)?;
        }

        let listener = TcpListener::bind(&self.config.listener.bind_address).await?;
        let server = HttpServer::new(&self.config.listener, self.app_state());

        let shutdown = self.shutdown.clone();
        server
            .run(listener, async move {
                signal.await;
                shutdown.trigger();
            })
            .await?;
        Ok(())
    }

    /// Cancel running deliveries, wait for them, release the pool.
    pub async fn finish(&self) {
        self.shutdown.trigger();
        let in_flight = self.shutdown.receiver_count();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for deliveries to stop");
        }
        self.shutdown.drain(DRAIN_DEADLINE).await;
        self.pool.close();
        tracing::info!("Shutdown complete");
    }
}
