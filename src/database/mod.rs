use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

use crate::utils::AppError;

pub const USERS_COLLECTION: &str = "users";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, AppError> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        // Pool sized for a small request/response service
        client_options.max_pool_size = Some(10);
        client_options.min_pool_size = Some(1);
        client_options.max_idle_time = Some(Duration::from_secs(300));

        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;
        let db = client.database(database_name(uri));

        let mongodb = Self { client, db };
        mongodb.ping().await?;
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the unique `external_id` index, the only guard against duplicate provisioning.
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<mongodb::bson::Document>(USERS_COLLECTION);
        let external_id_index = IndexModel::builder()
            .keys(doc! { "external_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("users_external_id_unique".to_string())
                    .build(),
            )
            .build();

        users.create_index(external_id_index).await?;
        log::info!("   ✅ Index ready: users(external_id) unique");

        Ok(())
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub async fn shutdown(&self) {
        self.client.clone().shutdown().await;
    }
}

/// Database name from the URI path, or the service default.
fn database_name(uri: &str) -> &str {
    uri.split_once("://")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, path)| path.split('?').next().unwrap_or(""))
        .filter(|name| !name.is_empty())
        .unwrap_or("payout_onboarding")
}
