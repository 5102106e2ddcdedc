//! Shared outbound HTTP connection pool.
//!
//! # Responsibilities
//! - Build one reqwest client lazily, on the first POST
//! - Cap concurrent connections per destination host
//! - Reuse DNS answers for the configured TTL
//! - Release everything on `close()`; a later POST reopens the pool
//!
//! # Design Decisions
//! - The client lives in an `ArcSwapOption` so in-flight requests keep their
//!   handle while `close()` swaps the slot to `None`
//! - Per-host limits are semaphores keyed by `host:port`, removed as soon as
//!   the last request to that host ends
//! - The request timeout covers the wait for a host slot as well as the
//!   exchange itself
//! - Redirects are followed up to `MAX_REDIRECTS` hops; the final response
//!   is the one classified

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::redirect::Policy;
use reqwest::Client;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::TransportConfig;
use crate::crypto::Credential;
use crate::transport::resolver::CachingResolver;
use crate::transport::{CallbackTransport, TransportError, TransportResult};

const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(90);

/// Redirect hops followed before the 3xx itself is returned.
const MAX_REDIRECTS: usize = 10;

type HostLimits = DashMap<String, Arc<Semaphore>>;

fn host_key(url: &Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

/// Forgets a host's semaphore once the last request to it has ended.
struct HostRelease<'a> {
    host: String,
    limits: &'a HostLimits,
}

impl Drop for HostRelease<'_> {
    fn drop(&mut self) {
        // Every request holding or waiting for a slot owns a clone of the Arc.
        self.limits
            .remove_if(&self.host, |_, semaphore| Arc::strong_count(semaphore) == 1);
    }
}

/// Lazily-created HTTP client shared by every dispatch.
pub struct TransportPool {
    config: TransportConfig,
    client: ArcSwapOption<Client>,
    resolver: Arc<CachingResolver>,
    host_limits: HostLimits,
}

impl TransportPool {
    /// Create a closed pool. No sockets or clients exist until the first POST.
    pub fn new(config: TransportConfig) -> Self {
        let resolver = Arc::new(CachingResolver::new(Duration::from_secs(
            config.dns_cache_ttl_secs,
        )));
        Self {
            config,
            client: ArcSwapOption::empty(),
            resolver,
            host_limits: DashMap::new(),
        }
    }

    /// Whether a client is currently held.
    pub fn is_open(&self) -> bool {
        self.client.load().is_some()
    }

    /// Return the shared client, creating it if needed.
    ///
    /// Concurrent first callers may both build a client; only one is
    /// installed and the other is discarded.
    fn client(&self) -> TransportResult<Arc<Client>> {
        if let Some(client) = self.client.load_full() {
            return Ok(client);
        }

        let fresh = Arc::new(self.build_client()?);
        let previous = self
            .client
            .compare_and_swap(&None::<Arc<Client>>, Some(fresh.clone()));
        match &*previous {
            Some(existing) => Ok(existing.clone()),
            None => {
                tracing::info!(
                    max_per_host = self.config.max_connections_per_host,
                    timeout_secs = self.config.request_timeout_secs,
                    "Transport pool opened"
                );
                Ok(fresh)
            }
        }
    }

    fn build_client(&self) -> TransportResult<Client> {
        Client::builder()
            .timeout(self.request_timeout())
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .pool_max_idle_per_host(self.config.idle_connections_per_host)
            .pool_idle_timeout(IDLE_CONNECTION_TIMEOUT)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(self.config.user_agent.clone())
            .dns_resolver(self.resolver.clone())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    fn host_limit(&self) -> usize {
        self.config.max_connections_per_host.max(1)
    }

    async fn acquire_host_slot(&self, url: &Url) -> TransportResult<OwnedSemaphorePermit> {
        let limit = self.host_limit();
        let semaphore = self
            .host_limits
            .entry(host_key(url))
            .or_insert_with(|| Arc::new(Semaphore::new(limit)))
            .clone();

        semaphore
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Client("host connection limit closed".to_string()))
    }

    /// Free permits for `url`'s host. Hosts with no request in flight report
    /// the full cap.
    pub fn available_slots(&self, url: &Url) -> usize {
        self.host_limits
            .get(&host_key(url))
            .map(|s| s.available_permits())
            .unwrap_or_else(|| self.host_limit())
    }

    /// Number of hosts with a request in flight or waiting for a slot.
    pub fn tracked_hosts(&self) -> usize {
        self.host_limits.len()
    }

    /// Number of hosts with a cached DNS answer.
    pub fn cached_hosts(&self) -> usize {
        self.resolver.cached_hosts()
    }

    /// Drop the client and cached DNS answers. Idempotent.
    ///
    /// Requests already in flight finish on the handle they hold.
    pub fn close(&self) {
        if self.client.swap(None).is_some() {
            self.resolver.clear();
            tracing::info!("Transport pool closed");
        }
    }

    async fn send(
        &self,
        url: &Url,
        credential: &Credential,
        body: &serde_json::Value,
    ) -> TransportResult<u16> {
        let client = self.client()?;
        let _slot = self.acquire_host_slot(url).await?;

        let response = client
            .post(url.clone())
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        // Read the body so the connection can go back to the idle pool.
        if let Err(e) = response.bytes().await {
            tracing::debug!(status, error = %e, "Discarding unreadable callback response body");
        }
        Ok(status)
    }
}

#[async_trait]
impl CallbackTransport for TransportPool {
    async fn post(
        &self,
        url: &Url,
        credential: &Credential,
        body: &serde_json::Value,
    ) -> TransportResult<u16> {
        let _release = HostRelease {
            host: host_key(url),
            limits: &self.host_limits,
        };
        tokio::time::timeout(self.request_timeout(), self.send(url, credential, body))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

impl Drop for TransportPool {
    fn drop(&mut self) {
        if self.is_open() {
            tracing::debug!("Transport pool dropped without close()");
        }
    }
}

impl std::fmt::Debug for TransportPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportPool")
            .field("open", &self.is_open())
            .field("hosts", &self.host_limits.len())
            .finish()
    }
}
