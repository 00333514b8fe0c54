use actix_web::{http::header, web, HttpResponse};

use crate::context::AppContext;
use crate::middleware::Authenticated;
use crate::models::UserProfile;
use crate::services::provisioning::{self, ProfileOutcome};
use crate::utils::AppError;

#[utoipa::path(
    get,
    path = "/profile",
    tag = "Onboarding",
    responses(
        (status = 200, description = "Profile of the signed-in user", body = UserProfile),
        (status = 302, description = "Redirect to /signup when the record had to be re-created, /login without a session"),
        (status = 503, description = "Store unavailable, retry later")
    ),
    security(
        ("session_cookie" = [])
    )
)]
pub async fn get_profile(
    ctx: web::Data<AppContext>,
    Authenticated(claims): Authenticated,
) -> Result<HttpResponse, AppError> {
    log::info!("👤 GET /profile - {}", claims.external_id);

    let outcome = provisioning::load_profile(ctx.store.as_ref(), &claims)
        .await
        .inspect_err(|e| log::error!("❌ Profile lookup failed for {}: {}", claims.external_id, e))?;

    match outcome {
        ProfileOutcome::Found(profile) => Ok(HttpResponse::Ok().json(profile)),
        ProfileOutcome::Reprovisioned => Ok(HttpResponse::Found()
            .append_header((header::LOCATION, "/signup"))
            .finish()),
    }
}
