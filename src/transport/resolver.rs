//! DNS resolution with a bounded cache lifetime.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

#[derive(Debug, Clone)]
struct CachedAddrs {
    addrs: Vec<SocketAddr>,
    resolved_at: Instant,
}

/// Resolver that reuses answers for `ttl` before looking a host up again.
#[derive(Debug, Clone)]
pub struct CachingResolver {
    ttl: Duration,
    cache: Arc<DashMap<String, CachedAddrs>>,
}

impl CachingResolver {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Resolve `host`, serving from cache while the entry is fresh.
    pub async fn lookup(&self, host: &str) -> std::io::Result<Vec<SocketAddr>> {
        let cached = self
            .cache
            .get(host)
            .filter(|entry| entry.resolved_at.elapsed() < self.ttl)
            .map(|entry| entry.addrs.clone());
        if let Some(addrs) = cached {
            return Ok(addrs);
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0)).await?.collect();
        self.evict_expired();
        if !self.ttl.is_zero() && !addrs.is_empty() {
            self.cache.insert(
                host.to_string(),
                CachedAddrs {
                    addrs: addrs.clone(),
                    resolved_at: Instant::now(),
                },
            );
            tracing::trace!(host = %host, count = addrs.len(), "Cached DNS answer");
        }
        Ok(addrs)
    }

    /// Drop every answer older than the TTL.
    fn evict_expired(&self) {
        let ttl = self.ttl;
        self.cache.retain(|_, entry| entry.resolved_at.elapsed() < ttl);
    }

    /// Number of hosts currently cached.
    pub fn cached_hosts(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached answer.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            let addrs = resolver
                .lookup(name.as_str())
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}
