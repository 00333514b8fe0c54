use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, MAX_SESSION_TTL_HOURS};
use crate::utils::AppError;

pub const SESSION_COOKIE: &str = "appSession";
pub const TRANSACTION_COOKIE: &str = "auth_verification";

const SESSION_ISSUER: &str = "payout-onboarding";
const TRANSACTION_TTL_MINUTES: i64 = 10;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// The authenticated identity of a request, decoded once by the session middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub external_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    email: String,
    iat: i64,
    exp: i64,
    iss: String,
}

/// A pending login: what `/callback` must see to accept the provider's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginTransaction {
    pub state: String,
    pub nonce: String,
    pub return_to: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TransactionClaims {
    #[serde(flatten)]
    transaction: LoginTransaction,
    exp: i64,
    iss: String,
}

/// Signs and verifies the session and login-transaction cookies.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    secure: bool,
}

impl SessionCodec {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.session_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.session_secret.as_bytes()),
            // AppConfig::from_lookup bounds the TTL; hand-built configs are clamped here.
            ttl: Duration::try_hours(config.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
                .unwrap_or_else(|| Duration::hours(DEFAULT_SESSION_TTL_HOURS)),
            secure: config.secure_cookies(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[SESSION_ISSUER]);
        validation.leeway = 0;
        validation
    }

    pub fn encode_session(&self, claims: &IdentityClaims) -> Result<String, AppError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Config("session expiry out of range".to_string()))?;
        let session = SessionClaims {
            sub: claims.external_id.clone(),
            email: claims.email.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            iss: SESSION_ISSUER.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &session, &self.encoding_key)
            .map_err(|e| AppError::Config(format!("Failed to sign session: {}", e)))
    }

    /// Returns `None` for any tampered, expired or malformed session.
    pub fn decode_session(&self, token: &str) -> Option<IdentityClaims> {
        match decode::<SessionClaims>(token, &self.decoding_key, &self.validation()) {
            Ok(data) => Some(IdentityClaims {
                external_id: data.claims.sub,
                email: data.claims.email,
            }),
            Err(e) => {
                log::debug!("Rejected session cookie: {}", e);
                None
            }
        }
    }

    pub fn encode_transaction(&self, transaction: &LoginTransaction) -> Result<String, AppError> {
        let expires = Utc::now()
            .checked_add_signed(Duration::minutes(TRANSACTION_TTL_MINUTES))
            .ok_or_else(|| AppError::Config("login transaction expiry out of range".to_string()))?;
        let claims = TransactionClaims {
            transaction: transaction.clone(),
            exp: expires.timestamp(),
            iss: SESSION_ISSUER.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Config(format!("Failed to sign login transaction: {}", e)))
    }

    pub fn decode_transaction(&self, token: &str) -> Option<LoginTransaction> {
        decode::<TransactionClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims.transaction)
            .map_err(|e| log::debug!("Rejected login transaction cookie: {}", e))
            .ok()
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        self.cookie(SESSION_COOKIE, token, CookieDuration::seconds(self.ttl.num_seconds()))
    }

    pub fn transaction_cookie(&self, token: String) -> Cookie<'static> {
        self.cookie(
            TRANSACTION_COOKIE,
            token,
            CookieDuration::minutes(TRANSACTION_TTL_MINUTES),
        )
    }

    pub fn removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.cookie(name, String::new(), CookieDuration::ZERO);
        cookie.make_removal();
        cookie
    }

    fn cookie(&self, name: &'static str, value: String, max_age: CookieDuration) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(max_age)
            .finish()
    }
}

/// Random, unguessable value for `state` and `nonce`.
pub fn random_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn alice() -> IdentityClaims {
        IdentityClaims {
            external_id: "auth0|123".to_string(),
            email: "a@b.com".to_string(),
        }
    }

    #[test]
    fn session_decodes_to_same_identity() {
        let codec = SessionCodec::new(&test_config());
        let token = codec.encode_session(&alice()).unwrap();

        assert_eq!(codec.decode_session(&token), Some(alice()));
    }

    #[test]
    fn session_signed_with_other_secret_is_rejected() {
        let codec = SessionCodec::new(&test_config());
        let mut other_config = test_config();
        other_config.session_secret = "ffffffffffffffffffffffffffffffff".to_string();
        let forged = SessionCodec::new(&other_config).encode_session(&alice()).unwrap();

        assert_eq!(codec.decode_session(&forged), None);
        assert_eq!(codec.decode_session("not-a-jwt"), None);
    }

    #[test]
    fn expired_session_is_rejected() {
        let config = test_config();
        let codec = SessionCodec::new(&config);
        let past = Utc::now() - Duration::hours(2);
        let stale = SessionClaims {
            sub: "auth0|123".to_string(),
            email: "a@b.com".to_string(),
            iat: (past - Duration::hours(1)).timestamp(),
            exp: past.timestamp(),
            iss: SESSION_ISSUER.to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(config.session_secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.decode_session(&token), None);
    }

    #[test]
    fn oversized_ttl_is_clamped_instead_of_overflowing() {
        let mut config = test_config();
        config.session_ttl_hours = i64::MAX;
        let codec = SessionCodec::new(&config);

        let token = codec.encode_session(&alice()).unwrap();
        assert_eq!(codec.decode_session(&token), Some(alice()));
        assert_eq!(
            codec.session_cookie(token).max_age(),
            Some(CookieDuration::hours(MAX_SESSION_TTL_HOURS))
        );
    }

    #[test]
    fn transaction_cannot_stand_in_for_session() {
        let codec = SessionCodec::new(&test_config());
        let transaction = LoginTransaction {
            state: random_token(),
            nonce: random_token(),
            return_to: "/".to_string(),
        };
        let token = codec.encode_transaction(&transaction).unwrap();

        assert_eq!(codec.decode_transaction(&token), Some(transaction));
        assert_eq!(codec.decode_session(&token), None);
    }

    #[test]
    fn cookies_are_http_only_and_lax() {
        let codec = SessionCodec::new(&test_config());
        let cookie = codec.session_cookie("value".to_string());

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.path(), Some("/"));

        let removal = codec.removal_cookie(SESSION_COOKIE);
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(CookieDuration::ZERO));
    }

    #[test]
    fn random_tokens_differ() {
        assert_ne!(random_token(), random_token());
        assert_eq!(random_token().len(), 64);
    }
}
