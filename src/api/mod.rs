pub mod auth;
pub mod health;
pub mod landing;
pub mod profile;
pub mod signup;
pub mod swagger;

use actix_web::web;

use crate::middleware::RequireSession;
use crate::utils::AppError;

/// Route table shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Malformed form bodies get the same JSON 400 as a rejected payout detail
    cfg.app_data(
        web::FormConfig::default()
            .error_handler(|err, _req| AppError::InvalidRequest(err.to_string()).into()),
    )
    .route("/health", web::get().to(health::health_check))
        // Identity handoff (public)
        .route("/login", web::get().to(auth::login))
        .route("/callback", web::get().to(auth::callback))
        .route("/logout", web::get().to(auth::logout))
        // Onboarding (session required)
        .service(
            web::resource("/")
                .wrap(RequireSession)
                .route(web::get().to(landing::landing)),
        )
        .service(
            web::resource("/signup")
                .wrap(RequireSession)
                .route(web::get().to(signup::signup_form))
                .route(web::post().to(signup::submit_signup)),
        )
        .service(
            web::resource("/profile")
                .wrap(RequireSession)
                .route(web::get().to(profile::get_profile)),
        );
}
