//! OAuth2 client-credentials tokens, cached until shortly before expiry.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::base::types::Res;

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the token endpoint does not report one.
const DEFAULT_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// A client-credentials token source for one client and scope.
pub struct ClientCredentials {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    pub fn new(client: reqwest::Client, token_url: impl Into<String>, client_id: &str, client_secret: &str, scope: &str) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// The Microsoft identity platform token endpoint of `tenant`.
    pub fn microsoft_token_url(tenant: &str) -> String {
        format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token")
    }

    /// Returns a valid bearer token, fetching a new one when needed.
    #[instrument(name = "ClientCredentials::token", skip(self), fields(scope = %self.scope))]
    pub async fn token(&self) -> Res<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Token request failed with status {}.", response.status()));
        }

        let body: TokenResponse = response.json().await?;
        let lifetime = body.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        let token = CachedToken {
            value: body.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime as i64),
        };

        debug!("Fetched a new token valid until {}.", token.expires_at);

        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }
}
