use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;

use crate::state::AppState;

/// Liveness and store reachability. Exempt from the authorization pipeline.
///
/// Answers `503` with `"status": "degraded"` when the user store does not
/// respond within the store timeout.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let limit = Duration::from_secs(state.config.store_timeout_secs);
    let store = match tokio::time::timeout(limit, state.users.ping()).await {
        Ok(Ok(())) => "ok",
        Ok(Err(err)) => {
            log::warn!("Health check: store unreachable: {}", err);
            "unavailable"
        }
        Err(_) => {
            log::warn!("Health check: store ping timed out");
            "unavailable"
        }
    };

    let mut response = if store == "ok" {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response.json(json!({
        "status": if store == "ok" { "ok" } else { "degraded" },
        "store": store,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now()
    }))
}
