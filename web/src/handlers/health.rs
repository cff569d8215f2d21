//! Health check endpoints.
//!
//! `/health` answers as long as the process serves requests. `/ready` also
//! pings the reservation store, so a load balancer stops routing bookings to
//! an instance that cannot reach its table.

use axum::{Json, extract::State, http::StatusCode};
use bay_booking_core::store::ReservationStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of both health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `ok` or `unavailable`.
    pub status: String,
    /// Failure detail for an unready store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthReport {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            detail: None,
        }
    }
}

/// Liveness.
///
/// ```text
/// GET /health  ->  200 {"status":"ok"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthReport>) {
    (StatusCode::OK, Json(HealthReport::ok()))
}

/// Readiness: 200 when the store answers a ping, 503 otherwise.
///
/// The router state only needs to yield an `Arc<dyn ReservationStore>`
/// through `FromRef`.
pub async fn readiness(
    State(store): State<Arc<dyn ReservationStore>>,
) -> (StatusCode, Json<HealthReport>) {
    match store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthReport::ok())),
        Err(error) => {
            tracing::warn!(%error, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthReport {
                    status: "unavailable".to_string(),
                    detail: Some(error.to_string()),
                }),
            )
        },
    }
}
