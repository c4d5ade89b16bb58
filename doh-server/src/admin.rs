//! The minimal administrative surface: `/api/status`. Other admin endpoints
//! (`/api/config`, `/api/upload/*`) are external collaborators out of scope
//! here and must never be wired into request processing.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct StatusResponse {
    status: &'static str,
    version: &'static str,
    server_time: u128,
}

pub async fn status() -> Json<StatusResponse> {
    let server_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        server_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_report_ok_status() {
        let Json(body) = status().await;
        assert_eq!(body.status, "ok");
        assert!(body.server_time > 0);
    }
}
