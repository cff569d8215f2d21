//! Booking window endpoint.

use crate::server::AppState;
use axum::{Json, extract::State};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Response for `GET /api/window`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowResponse {
    /// Whether bookings are accepted right now.
    pub open: bool,
    /// The date a booking made now is for.
    pub booking_date: NaiveDate,
    /// Site-local wall clock time.
    pub local_time: NaiveTime,
    /// Site timezone.
    pub timezone: String,
    /// Bays per date.
    pub total_bays: u16,
}

/// Current booking window.
///
/// ```bash
/// curl http://localhost:8080/api/window
/// ```
///
/// ```json
/// {"open": true, "booking_date": "2025-01-07", "local_time": "23:00:00",
///  "timezone": "Asia/Shanghai", "total_bays": 5}
/// ```
#[allow(clippy::unused_async)]
pub async fn get_window(State(state): State<AppState>) -> Json<WindowResponse> {
    let env = state.registry.environment();
    let status = env.window.evaluate(env.clock.now());

    Json(WindowResponse {
        open: status.open,
        booking_date: status.booking_date,
        local_time: status.local_time,
        timezone: env.window.timezone().name().to_string(),
        total_bays: env.capacity.total_bays(),
    })
}
