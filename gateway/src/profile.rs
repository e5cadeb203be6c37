use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile api token fetch failed: {0}")]
    Token(String),

    #[error("profile api transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected profile api status: {0}")]
    Status(u16),
}

/// What a successful character lookup yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterProfile {
    pub faction: String,
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileResult {
    Found(CharacterProfile),
    NotFound,
}

/// Resolves a character's faction and class from its realm and name.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn lookup(&self, realm: &str, name: &str) -> Result<ProfileResult, ProfileError>;
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CharacterResponse {
    faction: NamedField,
    character_class: NamedField,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// HTTP implementation of [`ProfileLookup`] against the armory profile API.
///
/// Uses OAuth client-credentials; the access token is cached until shortly
/// before its announced expiry so the common case is a single GET.
pub struct ArmoryClient {
    http: Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token_cache: Mutex<Option<CachedToken>>,
}

impl ArmoryClient {
    pub fn new(
        api_base: String,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, ProfileError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_base,
            token_url,
            client_id,
            client_secret,
            token_cache: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, ProfileError> {
        let mut cache = self.token_cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let resp = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ProfileError::Token(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let body: TokenResponse = resp.json().await?;

        info!(expires_in = body.expires_in, "retrieved new profile api token");

        // Renew a minute early so in-flight lookups never race the expiry.
        let expires_at = Instant::now() + Duration::from_secs(body.expires_in.saturating_sub(60));
        let token = body.access_token.clone();
        *cache = Some(CachedToken {
            token: body.access_token,
            expires_at,
        });

        Ok(token)
    }
}

#[async_trait]
impl ProfileLookup for ArmoryClient {
    #[instrument(skip(self), level = "debug")]
    async fn lookup(&self, realm: &str, name: &str) -> Result<ProfileResult, ProfileError> {
        let token = self.access_token().await?;

        let realm_slug = realm.to_lowercase().replace(' ', "-");
        let url = format!(
            "{}/profile/wow/character/{}/{}?namespace=profile-eu&locale=en_GB",
            self.api_base,
            realm_slug,
            name.to_lowercase()
        );

        let resp = self.http.get(&url).bearer_auth(token).send().await?;

        match resp.status().as_u16() {
            200 => {
                let body: CharacterResponse = resp.json().await?;
                debug!(
                    faction = %body.faction.name,
                    class = %body.character_class.name,
                    "character profile resolved"
                );
                Ok(ProfileResult::Found(CharacterProfile {
                    faction: body.faction.name,
                    class_name: body.character_class.name,
                }))
            }
            404 => Ok(ProfileResult::NotFound),
            other => Err(ProfileError::Status(other)),
        }
    }
}
