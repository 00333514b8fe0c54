use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::context::AppContext;
use crate::services::session::{random_token, LoginTransaction, SESSION_COOKIE, TRANSACTION_COOKIE};
use crate::utils::AppError;

/// Every completed login lands on the onboarding decision.
const LOGIN_RETURN_TO: &str = "/";

pub async fn login(ctx: web::Data<AppContext>) -> Result<HttpResponse, AppError> {
    log::info!("🔐 GET /login");

    let transaction = LoginTransaction {
        state: random_token(),
        nonce: random_token(),
        return_to: LOGIN_RETURN_TO.to_string(),
    };
    let cookie = ctx
        .sessions
        .transaction_cookie(ctx.sessions.encode_transaction(&transaction)?);
    let auth_url = ctx
        .oidc
        .authorization_url(&transaction.state, &transaction.nonce);

    Ok(HttpResponse::Found()
        .cookie(cookie)
        .append_header((header::LOCATION, auth_url))
        .finish())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub async fn callback(
    ctx: web::Data<AppContext>,
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 GET /callback");

    if let Some(error) = &query.error {
        log::warn!(
            "❌ Identity provider returned {}: {}",
            error,
            query.error_description.as_deref().unwrap_or("")
        );
        return Err(AppError::InvalidRequest(format!(
            "login was not completed: {}",
            error
        )));
    }

    let transaction = req
        .cookie(TRANSACTION_COOKIE)
        .and_then(|cookie| ctx.sessions.decode_transaction(cookie.value()))
        .ok_or_else(|| {
            log::warn!("❌ Callback without a valid login transaction");
            AppError::InvalidRequest("login transaction missing or expired".to_string())
        })?;

    if query.state.as_deref() != Some(transaction.state.as_str()) {
        log::warn!("❌ Callback state mismatch");
        return Err(AppError::InvalidRequest("state mismatch".to_string()));
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("authorization code missing".to_string()))?;

    let claims = ctx
        .oidc
        .authenticate(code, &transaction.nonce)
        .await
        .inspect_err(|e| log::error!("❌ Login failed: {}", e))?;

    log::info!("✅ Authenticated {}", claims.external_id);

    let session = ctx
        .sessions
        .session_cookie(ctx.sessions.encode_session(&claims)?);

    Ok(HttpResponse::Found()
        .cookie(session)
        .cookie(ctx.sessions.removal_cookie(TRANSACTION_COOKIE))
        .append_header((header::LOCATION, transaction.return_to))
        .finish())
}

pub async fn logout(ctx: web::Data<AppContext>) -> HttpResponse {
    log::info!("👋 GET /logout");

    HttpResponse::Found()
        .cookie(ctx.sessions.removal_cookie(SESSION_COOKIE))
        .append_header((header::LOCATION, ctx.oidc.logout_url()))
        .finish()
}
