//! OpenID Connect relying party for the authorization code flow.
//!
//! 1. `authorization_url` sends the browser to the provider with `state` and `nonce`.
//! 2. `/callback` hands the returned `code` to `authenticate`, which exchanges it
//!    for tokens and verifies the ID token (signature, issuer, audience, expiry, nonce).
//! 3. The resulting [`IdentityClaims`] become the session.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::services::session::IdentityClaims;
use crate::utils::AppError;

const SCOPES: &str = "openid profile email";
const CLOCK_SKEW_SECS: u64 = 60;

/// Subset of the provider's discovery document this service uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: Option<String>,
    pub jwks_uri: String,
    pub end_session_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub email: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
}

pub struct OidcClient {
    metadata: ProviderMetadata,
    jwks: RwLock<JwkSet>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    base_url: String,
    auth0_domain: Option<String>,
    http: reqwest::Client,
}

impl OidcClient {
    /// Fetches the discovery document and signing keys from the issuer.
    pub async fn discover(config: &AppConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.issuer_base_url
        );
        log::info!("🔍 Discovering identity provider at {}", discovery_url);

        let metadata: ProviderMetadata = http
            .get(&discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwks = fetch_jwks(&http, &metadata.jwks_uri).await?;
        log::info!(
            "✅ Identity provider {} ready ({} signing keys)",
            metadata.issuer,
            jwks.keys.len()
        );

        Ok(Self::with_metadata(config, metadata, jwks, http))
    }

    pub fn with_metadata(
        config: &AppConfig,
        metadata: ProviderMetadata,
        jwks: JwkSet,
        http: reqwest::Client,
    ) -> Self {
        Self {
            metadata,
            jwks: RwLock::new(jwks),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri(),
            base_url: config.base_url.clone(),
            auth0_domain: config.auth0_domain.clone(),
            http,
        }
    }

    pub fn authorization_url(&self, state: &str, nonce: &str) -> String {
        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", SCOPES),
            ("state", state),
            ("nonce", nonce),
        ];

        format!(
            "{}?{}",
            self.metadata.authorization_endpoint,
            encode_query(&params)
        )
    }

    /// Where `/logout` sends the browser after the local session is cleared.
    pub fn logout_url(&self) -> String {
        if let Some(end_session) = &self.metadata.end_session_endpoint {
            let params = [
                ("client_id", self.client_id.as_str()),
                ("post_logout_redirect_uri", self.base_url.as_str()),
            ];
            return format!("{}?{}", end_session, encode_query(&params));
        }

        if let Some(domain) = &self.auth0_domain {
            let params = [
                ("client_id", self.client_id.as_str()),
                ("returnTo", self.base_url.as_str()),
            ];
            return format!("https://{}/v2/logout?{}", domain, encode_query(&params));
        }

        self.base_url.clone()
    }

    /// Completes the code flow and returns the verified identity.
    pub async fn authenticate(&self, code: &str, nonce: &str) -> Result<IdentityClaims, AppError> {
        let tokens = self.exchange_code(code).await?;
        let claims = self.verify_id_token(&tokens.id_token, nonce).await?;

        let email = match claims.email {
            Some(email) => email,
            None => self
                .fetch_userinfo_email(&tokens.access_token, &claims.sub)
                .await?
                .ok_or_else(|| {
                    AppError::Identity(format!("no email claim for subject {}", claims.sub))
                })?,
        };

        Ok(IdentityClaims {
            external_id: claims.sub,
            email,
        })
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = match response.json::<OAuthErrorResponse>().await {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => status.to_string(),
            };
            return Err(AppError::Identity(format!("code exchange failed: {}", detail)));
        }

        Ok(response.json::<TokenResponse>().await?)
    }

    /// Verifies an ID token. Symmetric tokens are checked against the client secret,
    /// asymmetric ones against the provider's published keys.
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<IdTokenClaims, AppError> {
        let header = decode_header(id_token)
            .map_err(|e| AppError::Identity(format!("malformed ID token: {}", e)))?;

        let key = match header.alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(self.client_secret.as_bytes())
            }
            _ => self.signing_key(header.kid.as_deref()).await?,
        };

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&[self.metadata.issuer.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| AppError::Identity(format!("ID token rejected: {}", e)))?
            .claims;

        if claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(AppError::Identity("ID token nonce mismatch".to_string()));
        }

        Ok(claims)
    }

    /// Looks up the key for `kid`, refreshing the key set once on a miss.
    async fn signing_key(&self, kid: Option<&str>) -> Result<DecodingKey, AppError> {
        if let Some(key) = select_key(&*self.jwks.read().await, kid)? {
            return Ok(key);
        }

        log::info!("🔑 Unknown signing key {:?}, refreshing JWKS", kid);
        let fresh = fetch_jwks(&self.http, &self.metadata.jwks_uri).await?;
        let key = select_key(&fresh, kid)?;
        *self.jwks.write().await = fresh;

        key.ok_or_else(|| AppError::Identity(format!("no signing key matches kid {:?}", kid)))
    }

    async fn fetch_userinfo_email(
        &self,
        access_token: &str,
        subject: &str,
    ) -> Result<Option<String>, AppError> {
        let Some(endpoint) = &self.metadata.userinfo_endpoint else {
            return Ok(None);
        };

        let info: UserInfo = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if info.sub != subject {
            return Err(AppError::Identity(
                "userinfo subject does not match ID token".to_string(),
            ));
        }

        Ok(info.email)
    }
}

async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, AppError> {
    Ok(http
        .get(jwks_uri)
        .send()
        .await?
        .error_for_status()?
        .json::<JwkSet>()
        .await?)
}

fn select_key(jwks: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, AppError> {
    let jwk = match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    };

    jwk.map(|jwk| {
        DecodingKey::from_jwk(jwk)
            .map_err(|e| AppError::Identity(format!("unusable signing key: {}", e)))
    })
    .transpose()
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
pub(crate) fn test_metadata() -> ProviderMetadata {
    ProviderMetadata {
        issuer: "https://tenant.example.auth0.com/".to_string(),
        authorization_endpoint: "https://tenant.example.auth0.com/authorize".to_string(),
        token_endpoint: "https://tenant.example.auth0.com/oauth/token".to_string(),
        userinfo_endpoint: Some("https://tenant.example.auth0.com/userinfo".to_string()),
        jwks_uri: "https://tenant.example.auth0.com/.well-known/jwks.json".to_string(),
        end_session_endpoint: None,
    }
}

#[cfg(test)]
pub(crate) fn test_client() -> OidcClient {
    OidcClient::with_metadata(
        &crate::config::test_config(),
        test_metadata(),
        JwkSet { keys: Vec::new() },
        reqwest::Client::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn id_token(secret: &str, claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(nonce: &str) -> serde_json::Value {
        let now = Utc::now().timestamp();
        serde_json::json!({
            "iss": "https://tenant.example.auth0.com/",
            "aud": "client-123",
            "sub": "auth0|123",
            "email": "a@b.com",
            "nonce": nonce,
            "iat": now,
            "exp": now + 3600,
        })
    }

    fn secret() -> String {
        crate::config::test_config().client_secret
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let url = test_client().authorization_url("state-1", "nonce-2");

        assert!(url.starts_with("https://tenant.example.auth0.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("state=state-1"));
        assert!(url.contains("nonce=nonce-2"));
    }

    #[test]
    fn logout_uses_auth0_endpoint_without_end_session() {
        let url = test_client().logout_url();

        assert_eq!(
            url,
            "https://tenant.example.auth0.com/v2/logout?client_id=client-123&returnTo=http%3A%2F%2Flocalhost%3A3000"
        );
    }

    #[test]
    fn logout_prefers_end_session_endpoint() {
        let mut metadata = test_metadata();
        metadata.end_session_endpoint = Some("https://idp.example.com/logout".to_string());
        let client = OidcClient::with_metadata(
            &crate::config::test_config(),
            metadata,
            JwkSet { keys: Vec::new() },
            reqwest::Client::new(),
        );

        let url = client.logout_url();
        assert!(url.starts_with("https://idp.example.com/logout?"));
        assert!(url.contains("post_logout_redirect_uri=http%3A%2F%2Flocalhost%3A3000"));
    }

    #[tokio::test]
    async fn accepts_valid_symmetric_id_token() {
        let token = id_token(&secret(), claims("n-1"));

        let verified = test_client().verify_id_token(&token, "n-1").await.unwrap();

        assert_eq!(verified.sub, "auth0|123");
        assert_eq!(verified.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn rejects_nonce_mismatch() {
        let token = id_token(&secret(), claims("n-1"));

        let err = test_client().verify_id_token(&token, "other").await.unwrap_err();
        assert!(err.to_string().contains("nonce"));
    }

    #[tokio::test]
    async fn rejects_wrong_audience_and_issuer() {
        let mut wrong_aud = claims("n-1");
        wrong_aud["aud"] = serde_json::json!("someone-else");
        let mut wrong_iss = claims("n-1");
        wrong_iss["iss"] = serde_json::json!("https://evil.example.com/");

        let client = test_client();
        assert!(client.verify_id_token(&id_token(&secret(), wrong_aud), "n-1").await.is_err());
        assert!(client.verify_id_token(&id_token(&secret(), wrong_iss), "n-1").await.is_err());
    }

    #[tokio::test]
    async fn rejects_forged_signature() {
        let token = id_token("not-the-client-secret-at-all-nope", claims("n-1"));

        assert!(test_client().verify_id_token(&token, "n-1").await.is_err());
    }

    #[test]
    fn select_key_without_kid_needs_single_key() {
        let empty = JwkSet { keys: Vec::new() };
        assert!(select_key(&empty, None).unwrap().is_none());
        assert!(select_key(&empty, Some("abc")).unwrap().is_none());
    }

    #[test]
    fn discovery_document_deserializes() {
        let doc = r#"{
            "issuer": "https://tenant.example.auth0.com/",
            "authorization_endpoint": "https://tenant.example.auth0.com/authorize",
            "token_endpoint": "https://tenant.example.auth0.com/oauth/token",
            "userinfo_endpoint": "https://tenant.example.auth0.com/userinfo",
            "jwks_uri": "https://tenant.example.auth0.com/.well-known/jwks.json",
            "response_types_supported": ["code"]
        }"#;

        let metadata: ProviderMetadata = serde_json::from_str(doc).unwrap();
        assert_eq!(metadata.issuer, "https://tenant.example.auth0.com/");
        assert!(metadata.end_session_endpoint.is_none());
    }
}
