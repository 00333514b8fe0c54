use async_trait::async_trait;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::Collection;

use crate::database::{MongoDB, USERS_COLLECTION};
use crate::models::{NewUser, User};
use crate::utils::AppError;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Persistence operations the provisioning flow depends on.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError>;

    /// Inserts a new record. Fails with [`AppError::Conflict`] if one already exists
    /// for the same external id.
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    /// Sets the payout detail, returning the updated record or `None` if no record matched.
    async fn update_payout_detail(
        &self,
        external_id: &str,
        payout_detail: &str,
    ) -> Result<Option<User>, AppError>;

    /// Round-trips to the backing store without touching any record.
    async fn ping(&self) -> Result<(), AppError>;

    async fn close(&self);
}

pub struct MongoUserStore {
    db: MongoDB,
    users: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: MongoDB) -> Self {
        let users = db.collection::<User>(USERS_COLLECTION);
        Self { db, users }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .find_one(doc! { "external_id": external_id })
            .await?)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = User::from_new(new_user);

        match self.users.insert_one(&user).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "user with external id {} already exists",
                user.external_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_payout_detail(
        &self,
        external_id: &str,
        payout_detail: &str,
    ) -> Result<Option<User>, AppError> {
        let update = doc! {
            "$set": {
                "payout_detail": payout_detail,
                "updated_at": BsonDateTime::now(),
            }
        };

        Ok(self
            .users
            .find_one_and_update(doc! { "external_id": external_id }, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.db.ping().await
    }

    async fn close(&self) {
        self.db.shutdown().await;
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn mongo_store_rejects_duplicate_external_id() {
        dotenv::dotenv().ok();
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/payout_onboarding_test".to_string());
        let store = MongoUserStore::new(MongoDB::new(&uri).await.unwrap());

        let external_id = format!("test|{}", uuid::Uuid::new_v4());
        let new_user = NewUser {
            external_id: external_id.clone(),
            email: "dup@example.com".to_string(),
        };

        store.create(new_user.clone()).await.unwrap();
        let second = store.create(new_user).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let updated = store
            .update_payout_detail(&external_id, "merchant@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.payout_detail.as_deref(), Some("merchant@example.com"));
    }
}
