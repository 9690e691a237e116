//! HTTP surface of the delivery endpoint.
//!
//! Routes:
//! - `POST /api/registrations` deliver a batch
//! - `GET /api/registrations`, `GET /health` readiness acknowledgement
use super::DeliveryService;
use crate::wire::{DeliveryResponse, DELIVERY_PATH, HEALTH_MESSAGE};
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the endpoint router around a shared delivery service.
pub fn router(service: Arc<DeliveryService>) -> Router {
    Router::new()
        .route(DELIVERY_PATH, get(health).post(deliver))
        .route("/health", get(health))
        .with_state(service)
}

async fn health() -> Json<DeliveryResponse> {
    Json(DeliveryResponse::ok(HEALTH_MESSAGE))
}

async fn deliver(
    State(service): State<Arc<DeliveryService>>,
    body: Bytes,
) -> (StatusCode, Json<DeliveryResponse>) {
    // Sheet appends and notifier calls block; keep them off the async workers.
    let outcome = tokio::task::spawn_blocking(move || service.handle(&body)).await;
    match outcome {
        Ok((status, response)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(response),
        ),
        Err(err) => {
            tracing::error!(error = %err, "delivery task aborted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DeliveryResponse::failed(format!("Error: {err}"))),
            )
        }
    }
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, service: Arc<DeliveryService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("read listener address")?;
    tracing::info!(%addr, sheet = service.sheet_name(), "delivery endpoint listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serve delivery endpoint")?;
    tracing::info!("delivery endpoint stopped");
    Ok(())
}
