mod api;
mod config;
mod context;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::context::AppContext;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("❌ {}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("🚀 Starting Payout Onboarding...");
    log::info!("🔐 Identity provider: {}", config.issuer_base_url);
    log::info!("🌐 Base URL: {}", config.base_url);

    let bind_address = config.bind_address();
    let ctx = AppContext::open(config).await.map_err(|e| {
        log::error!("❌ Startup failed: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let ctx = web::Data::new(ctx);

    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/swagger-ui/", bind_address);

    let app_ctx = ctx.clone();
    let server = HttpServer::new(move || {
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(app_ctx.clone())
            .wrap(middleware::SecurityHeaders)
            // Path only: the query of /callback carries the authorization code
            .wrap(Logger::new("%a \"%U\" %s %b %T"))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi),
            )
            .configure(api::configure)
    })
    .bind(&bind_address);

    let result = match server {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };

    ctx.close().await;
    result
}
