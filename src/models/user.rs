use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// A user record as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Subject identifier issued by the identity provider. Unique, never rewritten.
    pub external_id: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub payout_detail: Option<String>,
    pub created_at: Option<BsonDateTime>,
    pub updated_at: Option<BsonDateTime>,
}

impl User {
    pub fn from_new(new_user: NewUser) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: ObjectId::new(),
            external_id: new_user.external_id,
            email: new_user.email,
            role: Role::default(),
            payout_detail: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn is_onboarded(&self) -> bool {
        self.payout_detail.is_some()
    }
}

/// Fields captured from the identity claims when a record is provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
}

/// The public projection served by `/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub payout_detail: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            email: user.email.clone(),
            role: user.role,
            payout_detail: user.payout_detail.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_users_default_to_user_role_without_payout() {
        let user = User::from_new(NewUser {
            external_id: "auth0|123".to_string(),
            email: "a@b.com".to_string(),
        });

        assert_eq!(user.role, Role::User);
        assert_eq!(user.payout_detail, None);
        assert!(!user.is_onboarded());
    }

    #[test]
    fn profile_serializes_exactly_four_fields() {
        let mut user = User::from_new(NewUser {
            external_id: "auth0|123".to_string(),
            email: "a@b.com".to_string(),
        });
        user.payout_detail = Some("pp@x.com".to_string());

        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["email", "id", "payoutDetail", "role"]);
        assert_eq!(obj["role"], "USER");
        assert_eq!(obj["payoutDetail"], "pp@x.com");
        assert_eq!(obj["id"], user.id.to_hex());
    }

    #[test]
    fn missing_role_and_payout_fall_back_to_defaults() {
        let doc = mongodb::bson::doc! {
            "_id": ObjectId::new(),
            "external_id": "google-oauth2|9",
            "email": "x@y.com",
            "created_at": BsonDateTime::now(),
            "updated_at": BsonDateTime::now(),
        };

        let user: User = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.payout_detail.is_none());
    }
}
