//! Service-account OAuth2 (JWT bearer grant) for the Sheets API.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use slb_core::{errors::Error, Result};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens closer than this to expiry are re-minted.
const REFRESH_MARGIN_SECS: i64 = 60;

/// The parts of a Google service-account key file the bot needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Decode from the credentials object held in `Settings`.
    pub fn from_json(blob: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(blob.clone()))
            .map_err(|e| Error::Config(format!("service account key is incomplete: {e}")))
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Clone, Debug)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// Mints and caches access tokens for one service account.
pub struct TokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Config(format!("invalid service account private key: {e}")))?;
        Ok(Self {
            key,
            encoding_key,
            http,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A bearer token valid for at least another minute.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(tok) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(tok.value.clone());
        }

        let fresh = self.fetch(now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES.join(" "),
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::External(format!("failed to sign token assertion: {e}")))
    }

    async fn fetch(&self, now: DateTime<Utc>) -> Result<CachedToken> {
        let assertion = self.assertion(now)?;

        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Store(format!("token request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Store(format!(
                "token exchange failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let tok: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::Store(format!("token response json error: {e}")))?;

        tracing::debug!(account = %self.key.client_email, expires_in = tok.expires_in, "minted access token");

        Ok(CachedToken {
            value: tok.access_token,
            expires_at: expiry(now, tok.expires_in)?,
        })
    }
}

/// `now + expires_in` seconds; an out-of-range lifetime from the token
/// endpoint is an error rather than an overflow.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| Error::Store(format!("token expires_in out of range: {expires_in}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_defaults_token_uri() {
        let blob: Map<String, Value> = serde_json::from_str(
            r#"{"client_email":"a@b.iam.gserviceaccount.com","private_key":"pem"}"#,
        )
        .unwrap();
        let key = ServiceAccountKey::from_json(&blob).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{key:?}").contains("pem"));
    }

    #[test]
    fn key_without_private_key_is_config_error() {
        let blob: Map<String, Value> =
            serde_json::from_str(r#"{"client_email":"a@b.iam.gserviceaccount.com"}"#).unwrap();
        let err = ServiceAccountKey::from_json(&blob).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("private_key"), "{err}");
    }

    #[test]
    fn garbage_pem_is_rejected_up_front() {
        let key = ServiceAccountKey {
            client_email: "a@b".to_string(),
            private_key: "not a key".to_string(),
            private_key_id: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        };
        assert!(matches!(
            TokenProvider::new(key, reqwest::Client::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn expiry_rejects_out_of_range_lifetimes() {
        let now = Utc::now();
        assert_eq!(expiry(now, 3599).unwrap(), now + Duration::seconds(3599));
        assert!(matches!(expiry(now, i64::MAX), Err(Error::Store(_))));
        assert!(matches!(expiry(now, i64::MIN), Err(Error::Store(_))));
    }

    #[test]
    fn token_freshness_respects_margin() {
        let now = Utc::now();
        let tok = |secs| CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::seconds(secs),
        };
        assert!(tok(3600).is_fresh(now));
        assert!(!tok(30).is_fresh(now));
        assert!(!tok(-5).is_fresh(now));
    }
}
