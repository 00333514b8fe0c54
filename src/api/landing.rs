use actix_web::{http::header, web, HttpResponse};

use crate::context::AppContext;
use crate::middleware::Authenticated;
use crate::services::provisioning;
use crate::utils::AppError;

#[utoipa::path(
    get,
    path = "/",
    tag = "Onboarding",
    responses(
        (status = 302, description = "Redirect to /signup (record created or incomplete) or /profile (onboarded); /login without a session"),
        (status = 503, description = "Store unavailable, retry later")
    ),
    security(
        ("session_cookie" = [])
    )
)]
pub async fn landing(
    ctx: web::Data<AppContext>,
    Authenticated(claims): Authenticated,
) -> Result<HttpResponse, AppError> {
    log::info!("🏠 GET / - {}", claims.external_id);

    let target = provisioning::resolve_landing(ctx.store.as_ref(), &claims)
        .await
        .inspect_err(|e| log::error!("❌ Landing failed for {}: {}", claims.external_id, e))?;

    log::info!("➡️ {} -> {}", claims.external_id, target.path());

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, target.path()))
        .finish())
}
