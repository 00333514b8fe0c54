use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::MongoDB;
use crate::services::oidc::OidcClient;
use crate::services::session::SessionCodec;
use crate::services::user_store::{MongoUserStore, UserStore};
use crate::utils::AppError;

/// Everything a request handler needs, built once at startup and shared through
/// `web::Data`. Closed explicitly when the server stops.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn UserStore>,
    pub oidc: OidcClient,
    pub sessions: SessionCodec,
}

impl AppContext {
    pub fn new(config: AppConfig, store: Arc<dyn UserStore>, oidc: OidcClient) -> Self {
        let sessions = SessionCodec::new(&config);
        Self {
            config,
            store,
            oidc,
            sessions,
        }
    }

    /// Connects to the store and the identity provider.
    pub async fn open(config: AppConfig) -> Result<Self, AppError> {
        let db = MongoDB::new(&config.database_url).await?;
        log::info!("✅ MongoDB connected successfully");

        let oidc = OidcClient::discover(&config).await?;

        Ok(Self::new(config, Arc::new(MongoUserStore::new(db)), oidc))
    }

    pub async fn close(&self) {
        self.store.close().await;
        log::info!("👋 Store connection closed");
    }
}
