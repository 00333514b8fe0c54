use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

use crate::services::session::SESSION_COOKIE;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payout Onboarding",
        version = "1.0.0",
        description = "Login through the identity provider, leave a PayPal payout detail, read back the profile.\n\n**Authentication:** browser session cookie issued by `/callback` after `/login`."
    ),
    paths(
        crate::api::health::health_check,
        crate::api::landing::landing,
        crate::api::signup::signup_form,
        crate::api::signup::submit_signup,
        crate::api::profile::get_profile,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::api::signup::SignupForm,
            crate::models::UserProfile,
            crate::models::Role,
        )
    ),
    tags(
        (name = "Onboarding", description = "Landing decision, signup and profile."),
        (name = "Health", description = "Liveness and user store reachability."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
            );
        }
    }
}
