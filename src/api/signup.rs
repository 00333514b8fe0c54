use actix_web::{http::header, web, HttpResponse};
use serde::Deserialize;

use crate::context::AppContext;
use crate::middleware::Authenticated;
use crate::services::provisioning;
use crate::utils::AppError;

const SIGNUP_PAGE: &str = include_str!("../../static/signup.html");

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignupForm {
    // `paypal` is the field name older forms posted
    #[serde(rename = "payoutDetail", alias = "paypal", default)]
    pub payout_detail: String,
}

#[utoipa::path(
    get,
    path = "/signup",
    tag = "Onboarding",
    responses(
        (status = 200, description = "Signup form", body = String, content_type = "text/html"),
        (status = 302, description = "Redirect to /login without a session")
    ),
    security(
        ("session_cookie" = [])
    )
)]
pub async fn signup_form(Authenticated(claims): Authenticated) -> HttpResponse {
    log::info!("📝 GET /signup - {}", claims.external_id);

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(SIGNUP_PAGE)
}

#[utoipa::path(
    post,
    path = "/signup",
    tag = "Onboarding",
    request_body(content = SignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Payout detail saved, redirect to /profile"),
        (status = 400, description = "Payout detail empty or malformed"),
        (status = 503, description = "Store unavailable, retry later")
    ),
    security(
        ("session_cookie" = [])
    )
)]
pub async fn submit_signup(
    ctx: web::Data<AppContext>,
    Authenticated(claims): Authenticated,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /signup - {}", claims.external_id);

    provisioning::complete_signup(ctx.store.as_ref(), &claims, &form.payout_detail)
        .await
        .inspect_err(|e| log::warn!("❌ Signup failed for {}: {}", claims.external_id, e))?;

    log::info!("✅ Payout detail saved for {}", claims.external_id);

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, "/profile"))
        .finish())
}
