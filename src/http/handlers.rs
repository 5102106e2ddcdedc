use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::dispatch::{CallbackPayload, CallbackRequest, DeliveryStatus};
use crate::http::server::AppState;

/// Body of `POST /callback/send`.
#[derive(Debug, Deserialize)]
pub struct SendCallbackBody {
    pub url: String,
    pub encrypted_token: String,
    pub payload: CallbackPayload,
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub salt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub legacy_enabled: bool,
    pub keys: usize,
}

fn message(status: StatusCode, text: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "message": text }))).into_response()
}

/// Accept a callback and deliver it in the background.
pub async fn send_callback(
    State(state): State<AppState>,
    Json(body): Json<SendCallbackBody>,
) -> impl IntoResponse {
    let Some(shutdown) = state.shutdown.listen() else {
        return message(StatusCode::SERVICE_UNAVAILABLE, "Shutting down");
    };

    let notification_id = body.payload.notification_id;
    let payload = match serde_json::to_value(&body.payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(%notification_id, error = %e, "Failed to encode callback payload");
            return message(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode payload");
        }
    };

    let request = CallbackRequest {
        url: body.url,
        encrypted_token: body.encrypted_token,
        payload,
        legacy: body.legacy,
        salt: body.salt,
    };

    let dispatcher = state.dispatcher.clone();
    let span = tracing::info_span!("callback", %notification_id);
    tokio::spawn(
        async move {
            match dispatcher.send_until(&request, shutdown).await {
                Ok(outcome) if outcome.status == DeliveryStatus::Delivered => {}
                Ok(outcome) => tracing::debug!(
                    status = outcome.status.as_str(),
                    attempts = outcome.attempts,
                    "Background delivery finished without success"
                ),
                Err(e) => tracing::error!(error = %e, "Callback dispatch failed"),
            }
        }
        .instrument(span),
    );

    message(StatusCode::ACCEPTED, "Accepted")
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let credentials = state.dispatcher.credentials();
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        legacy_enabled: credentials.legacy().is_active(),
        keys: credentials.keyring().len(),
    })
}
