//! Callback delivery state machine.
//!
//! # Responsibilities
//! - Validate the destination before any network activity
//! - Recover the bearer credential (key ring or legacy path)
//! - POST through the transport, classifying every attempt
//! - Sleep between retryable failures and stop on the attempt bound
//! - Report a single `Outcome` per call
//!
//! # States
//! ```text
//! Decrypting → Sending → {Retrying ↔ Sending} → Delivered | Exhausted | Rejected
//!                 └──────── shutdown ────────→ Cancelled
//! ```
//!
//! # Design Decisions
//! - Only misconfiguration escapes as `Err`; every per-callback failure is
//!   an `Outcome` the caller can log or record
//! - No state survives a call; concurrent sends share only the credential
//!   store and the transport
//! - Shutdown wins over a pending retry; an interrupted POST is never resent

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast::{self, error::RecvError};
use url::Url;

use crate::crypto::Credentials;
use crate::dispatch::types::{
    CallbackRequest, DeliveryError, DeliveryStatus, DispatchError, DispatchResult, Outcome,
};
use crate::observability::metrics;
use crate::resilience::{Classification, RetryPolicy};
use crate::transport::CallbackTransport;

/// Delivers callbacks with retries.
pub struct CallbackDispatcher {
    credentials: Arc<Credentials>,
    transport: Arc<dyn CallbackTransport>,
    policy: RetryPolicy,
}

impl CallbackDispatcher {
    pub fn new(
        credentials: Arc<Credentials>,
        transport: Arc<dyn CallbackTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            credentials,
            transport,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Deliver `request`, retrying transient failures.
    pub async fn send(&self, request: &CallbackRequest) -> DispatchResult<Outcome> {
        self.deliver(request, None).await
    }

    /// Like [`send`](Self::send), but ends with `Cancelled` as soon as
    /// `shutdown` fires.
    pub async fn send_until(
        &self,
        request: &CallbackRequest,
        shutdown: broadcast::Receiver<()>,
    ) -> DispatchResult<Outcome> {
        self.deliver(request, Some(shutdown)).await
    }

    async fn deliver(
        &self,
        request: &CallbackRequest,
        mut shutdown: Option<broadcast::Receiver<()>>,
    ) -> DispatchResult<Outcome> {
        let started = Instant::now();
        let outcome = self.run(request, &mut shutdown).await?;

        metrics::record_outcome(outcome.status, started.elapsed());
        match outcome.status {
            DeliveryStatus::Delivered => tracing::info!(
                url = %request.url,
                attempts = outcome.attempts,
                "Callback delivered"
            ),
            status => tracing::warn!(
                url = %request.url,
                status = status.as_str(),
                attempts = outcome.attempts,
                error = ?outcome.last_error.as_ref().map(|e| e.to_string()),
                "Callback not delivered"
            ),
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        request: &CallbackRequest,
        shutdown: &mut Option<broadcast::Receiver<()>>,
    ) -> DispatchResult<Outcome> {
        let url = match parse_callback_url(&request.url) {
            Ok(url) => url,
            Err(e) => return Ok(Outcome::failed(DeliveryStatus::Rejected, 0, e)),
        };

        let path = if request.legacy { "legacy" } else { "keyring" };
        let credential = match self.credentials.resolve(
            &request.encrypted_token,
            request.legacy,
            request.salt.as_deref(),
        ) {
            Ok(credential) => credential,
            Err(err) => {
                return match DispatchError::from_crypto(err) {
                    Ok(fatal) => {
                        tracing::error!(path, error = %fatal, "Credential store unusable");
                        Err(fatal)
                    }
                    Err(rejected) => {
                        metrics::record_credential_failure(path);
                        Ok(Outcome::failed(
                            DeliveryStatus::Rejected,
                            0,
                            DeliveryError::Credential(rejected.to_string()),
                        ))
                    }
                };
            }
        };

        let mut attempt = 0;
        loop {
            if shutdown_signalled(shutdown) {
                return Ok(cancelled(attempt));
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => return Ok(cancelled(attempt)),
                result = self.transport.post(&url, &credential, &request.payload) => result,
            };

            let classification = self.policy.classify(&result);
            metrics::record_attempt(classification);

            let error = match result {
                Ok(_) if classification == Classification::Success => {
                    return Ok(Outcome::delivered(attempt));
                }
                Ok(status) if classification == Classification::Retryable => {
                    DeliveryError::RetryableStatus(status)
                }
                Ok(status) => DeliveryError::TerminalStatus(status),
                Err(e) => DeliveryError::Transport(e),
            };

            if classification == Classification::Terminal {
                return Ok(Outcome::failed(DeliveryStatus::Rejected, attempt, error));
            }
            if self.policy.should_stop(attempt) {
                return Ok(Outcome::failed(DeliveryStatus::Exhausted, attempt, error));
            }

            let delay = self.policy.next_delay(attempt);
            tracing::info!(
                url = %url,
                attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying callback"
            );

            tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => return Ok(cancelled(attempt)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("credentials", &self.credentials)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn cancelled(attempts: u32) -> Outcome {
    Outcome::failed(DeliveryStatus::Cancelled, attempts, DeliveryError::Cancelled)
}

/// Accept only absolute `https` URLs with a host.
fn parse_callback_url(raw: &str) -> Result<Url, DeliveryError> {
    let url = Url::parse(raw).map_err(|e| DeliveryError::InvalidUrl(e.to_string()))?;
    if url.scheme() != "https" {
        return Err(DeliveryError::InvalidUrl(format!(
            "scheme must be https, got {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(DeliveryError::InvalidUrl("missing host".to_string()));
    }
    Ok(url)
}

/// Non-blocking check for a signal already sent.
fn shutdown_signalled(shutdown: &mut Option<broadcast::Receiver<()>>) -> bool {
    match shutdown {
        Some(rx) => matches!(
            rx.try_recv(),
            Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_))
        ),
        None => false,
    }
}

/// Resolves when shutdown is signalled. A closed channel never resolves.
async fn wait_for_shutdown(shutdown: &mut Option<broadcast::Receiver<()>>) {
    if let Some(rx) = shutdown {
        match rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => return,
            Err(RecvError::Closed) => {}
        }
    }
    std::future::pending::<()>().await
}
