//! Identity provider boundary.
//!
//! The remote store never holds credentials of its own: every call that
//! needs row-level authorization asks a [`TokenProvider`] for a fresh
//! identity. Token refresh is this module's concern alone.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::model::Identity;

/// Refresh this long before the access token actually expires.
const REFRESH_SLACK_SECONDS: i64 = 30;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current identity, or None when running anonymously.
    async fn identity(&self) -> Result<Option<Identity>>;
}

/// Anonymous operation: browsing works, progress writes are skipped.
pub struct AnonymousTokenProvider;

#[async_trait]
impl TokenProvider for AnonymousTokenProvider {
    async fn identity(&self) -> Result<Option<Identity>> {
        Ok(None)
    }
}

/// Fixed identity, mainly for tests and one-off tooling.
pub struct StaticTokenProvider {
    identity: Identity,
}

impl StaticTokenProvider {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn identity(&self) -> Result<Option<Identity>> {
        Ok(Some(self.identity.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: Uuid,
}

struct CachedIdentity {
    identity: Identity,
    expires_at: DateTime<Utc>,
}

impl CachedIdentity {
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_SLACK_SECONDS) >= self.expires_at
    }
}

/// Exchanges a long-lived session token for a short-lived backend access
/// token at the configured endpoint, caching the result until shortly
/// before expiry.
pub struct SessionTokenProvider {
    http: Client,
    token_url: String,
    project_key: String,
    session_token: String,
    cached: Mutex<Option<CachedIdentity>>,
}

impl SessionTokenProvider {
    pub fn new(token_url: String, project_key: String, session_token: String) -> Self {
        let http = Client::builder()
            .user_agent("nutriplay/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            token_url,
            project_key,
            session_token,
            cached: Mutex::new(None),
        }
    }

    async fn exchange(&self) -> Result<CachedIdentity> {
        let res = self
            .http
            .post(&self.token_url)
            .header("apikey", &self.project_key)
            .json(&serde_json::json!({ "refresh_token": self.session_token }))
            .send()
            .await
            .context("failed to reach identity provider")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("token exchange failed {}: {}", status, body));
        }

        let payload: TokenResponse = res
            .json()
            .await
            .context("invalid token exchange response")?;
        Ok(CachedIdentity {
            identity: Identity {
                user_id: payload.user.id,
                access_token: payload.access_token,
            },
            expires_at: Utc::now() + Duration::seconds(payload.expires_in.max(0)),
        })
    }
}

#[async_trait]
impl TokenProvider for SessionTokenProvider {
    async fn identity(&self) -> Result<Option<Identity>> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(entry) = cached.as_ref() {
            if !entry.is_stale(now) {
                return Ok(Some(entry.identity.clone()));
            }
        }
        let fresh = self.exchange().await?;
        let identity = fresh.identity.clone();
        *cached = Some(fresh);
        Ok(Some(identity))
    }
}

/// Build the provider the config asks for: a session token selects the
/// refreshing exchange flow, otherwise the player runs anonymously.
pub fn provider_from_config(cfg: &Config) -> Arc<dyn TokenProvider> {
    if cfg.auth.session_token.trim().is_empty() {
        Arc::new(AnonymousTokenProvider)
    } else {
        Arc::new(SessionTokenProvider::new(
            cfg.auth.token_url.clone(),
            cfg.remote.project_key.clone(),
            cfg.auth.session_token.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_parses() {
        let raw = r#"{
            "access_token": "jwt-here",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": { "id": "5f2c7c6a-0b3a-4b4e-9b2a-1c6f1cdd7f11" }
        }"#;
        let parsed: TokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.access_token, "jwt-here");
        assert_eq!(parsed.expires_in, 3600);
    }

    #[test]
    fn cache_staleness_window() {
        let identity = Identity {
            user_id: Uuid::new_v4(),
            access_token: "t".into(),
        };
        let now = Utc::now();
        let fresh = CachedIdentity {
            identity: identity.clone(),
            expires_at: now + Duration::seconds(3600),
        };
        assert!(!fresh.is_stale(now));

        let expiring = CachedIdentity {
            identity,
            expires_at: now + Duration::seconds(REFRESH_SLACK_SECONDS - 5),
        };
        assert!(expiring.is_stale(now));
    }

    #[tokio::test]
    async fn anonymous_provider_yields_none() {
        let provider = AnonymousTokenProvider;
        assert!(provider.identity().await.unwrap().is_none());
    }
}
