//! OAuth access tokens for the Sheets API.
//!
//! Service accounts sign a short-lived RS256 assertion with their private key
//! and trade it at `token_uri` for a bearer token. Tokens are cached until a
//! minute before they expire.

use std::{
    path::Path,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use {
    async_trait::async_trait,
    jsonwebtoken::{Algorithm, EncodingKey, Header},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tokio::sync::Mutex,
    tracing::debug,
};

use crate::error::{Context, Error, Result, check_status};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Supplies a bearer token for each API call.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<Secret<String>>;
}

/// A fixed token, for tests and pre-authorized deployments.
pub struct StaticToken(Secret<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<Secret<String>> {
        Ok(self.0.clone())
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

/// The fields of a service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: Secret<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Credentials {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).with_context(|| format!("invalid credentials in {}", path.display()))
    }
}

struct CachedAccessToken {
    token: Secret<String>,
    expires_at: Instant,
}

impl CachedAccessToken {
    fn is_valid(&self) -> bool {
        self.expires_at > Instant::now() + REFRESH_SKEW
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    http: reqwest::Client,
    scope: String,
    cache: Mutex<Option<CachedAccessToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            key,
            http,
            scope: SPREADSHEETS_SCOPE.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn from_file(path: &Path, http: reqwest::Client) -> Result<Self> {
        Ok(Self::new(ServiceAccountKey::from_file(path)?, http))
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock is before the unix epoch")?
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME.as_secs(),
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<Secret<String>> {
        // Held across the exchange so concurrent callers share one refresh.
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref()
            && token.is_valid()
        {
            return Ok(token.token.clone());
        }

        let assertion = self.assertion()?;
        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];
        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&form)
            .send()
            .await?;
        let body: TokenResponse = check_status(resp).await?.json().await?;

        let ttl = body.expires_in.unwrap_or(3600).max(120);
        debug!(
            client_email = %self.key.client_email,
            ttl_secs = ttl,
            "obtained sheets access token"
        );
        let cached = CachedAccessToken {
            token: Secret::new(body.access_token),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        };
        let token = cached.token.clone();
        *cache = Some(cached);
        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        jsonwebtoken::{DecodingKey, Validation},
        mockito::Matcher,
    };

    const TEST_KEY: &str = include_str!("testdata/test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("testdata/test_key.pub.pem");

    fn key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "bot@project.iam.gserviceaccount.com".into(),
            private_key: Secret::new(TEST_KEY.into()),
            token_uri,
        }
    }

    #[test]
    fn parses_key_file() {
        let json = serde_json::json!({
            "type": "service_account",
            "client_email": "bot@project.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
            "project_id": "project",
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet_credentials.json");
        std::fs::write(&path, json.to_string()).unwrap();

        let key = ServiceAccountKey::from_file(&path).unwrap();
        assert_eq!(key.client_email, "bot@project.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{key:?}").contains("PRIVATE KEY"));
    }

    #[test]
    fn missing_key_file_names_the_path() {
        let err = ServiceAccountKey::from_file(Path::new("/nonexistent/creds.json")).unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
        assert!(err.to_string().contains("/nonexistent/creds.json"));
    }

    #[test]
    fn assertion_is_signed_with_expected_claims() {
        let auth = ServiceAccountAuth::new(
            key("https://oauth2.example.test/token".into()),
            reqwest::Client::new(),
        );
        let jwt = auth.assertion().unwrap();

        #[derive(Deserialize)]
        struct Decoded {
            iss: String,
            scope: String,
            aud: String,
            iat: u64,
            exp: u64,
        }
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["https://oauth2.example.test/token"]);
        let decoded = jsonwebtoken::decode::<Decoded>(
            &jwt,
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims;
        assert_eq!(decoded.iss, "bot@project.iam.gserviceaccount.com");
        assert_eq!(decoded.scope, SPREADSHEETS_SCOPE);
        assert_eq!(decoded.aud, "https://oauth2.example.test/token");
        assert_eq!(decoded.exp - decoded.iat, 3600);
    }

    #[tokio::test]
    async fn exchanges_and_caches_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                JWT_BEARER_GRANT.into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3599,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let auth = ServiceAccountAuth::new(
            key(format!("{}/token", server.url())),
            reqwest::Client::new(),
        );
        let first = auth.access_token().await.unwrap();
        let second = auth.access_token().await.unwrap();
        assert_eq!(first.expose_secret(), "ya29.test");
        assert_eq!(second.expose_secret(), "ya29.test");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_exchange_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let auth = ServiceAccountAuth::new(
            key(format!("{}/token", server.url())),
            reqwest::Client::new(),
        );
        let err = auth.access_token().await.unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
