use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the user store cannot be reached.
    pub status: String,
    pub service: String,
    pub version: String,
    pub store: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service and user store are reachable", body = HealthResponse),
        (status = 503, description = "User store is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(ctx: web::Data<AppContext>) -> HttpResponse {
    let (status, store) = match ctx.store.ping().await {
        Ok(()) => ("healthy", "up".to_string()),
        Err(e) => {
            log::warn!("⚠️ Health check: user store unreachable: {}", e);
            ("degraded", "down".to_string())
        }
    };

    let body = HealthResponse {
        status: status.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
        timestamp: chrono::Utc::now().timestamp(),
    };

    if status == "healthy" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
