use crate::utils::AppError;
use std::env;

const MIN_SESSION_SECRET_LEN: usize = 32;
/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 8760;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub database_url: String,
    pub issuer_base_url: String,
    /// Set when the issuer is an Auth0 tenant, enables the `/v2/logout` fallback.
    pub auth0_domain: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| AppError::Config(format!("{} must be set", key)))
        };

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT is not a valid port: {}", raw)))?,
            None => 3000,
        };
        let base_url = get("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let auth0_domain = get("AUTH0_DOMAIN").map(|d| {
            d.trim_start_matches("https://")
                .trim_end_matches('/')
                .to_string()
        });
        let issuer_base_url = match (get("ISSUER_BASE_URL"), &auth0_domain) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(domain)) => format!("https://{}", domain),
            (None, None) => {
                return Err(AppError::Config(
                    "AUTH0_DOMAIN or ISSUER_BASE_URL must be set".to_string(),
                ))
            }
        };

        let session_secret = get("SESSION_SECRET")
            .or_else(|| get("JWT_SECRET"))
            .ok_or_else(|| AppError::Config("SESSION_SECRET must be set".to_string()))?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(AppError::Config(format!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }

        let session_ttl_hours = match get("SESSION_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|h| (1..=MAX_SESSION_TTL_HOURS).contains(h))
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "SESSION_TTL_HOURS must be an integer between 1 and {}: {}",
                        MAX_SESSION_TTL_HOURS, raw
                    ))
                })?,
            None => 24,
        };

        Ok(Self {
            host,
            port,
            base_url,
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "mongodb://localhost:27017/payout_onboarding".to_string()),
            issuer_base_url,
            auth0_domain,
            client_id: require("AUTH0_CLIENT_ID")?,
            client_secret: require("AUTH0_CLIENT_SECRET")?,
            session_secret,
            session_ttl_hours,
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.base_url)
    }

    /// Cookies carry the `Secure` flag only when served over https.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        database_url: "mongodb://localhost:27017/payout_onboarding_test".to_string(),
        issuer_base_url: "https://tenant.example.auth0.com".to_string(),
        auth0_domain: Some("tenant.example.auth0.com".to_string()),
        client_id: "client-123".to_string(),
        client_secret: "client-secret-that-is-long-enough-for-hs256".to_string(),
        session_secret: "0123456789abcdef0123456789abcdef".to_string(),
        session_ttl_hours: 24,
    }
}
