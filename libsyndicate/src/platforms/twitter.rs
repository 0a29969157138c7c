//! Twitter/X publisher
//!
//! Posts through the v2 tweet-creation endpoint with the credential's
//! OAuth bearer token.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::format::FormattedPost;
use crate::platforms::{PublishReceipt, Publisher};
use crate::types::{Credentials, Platform};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Optional per-credential settings, decoded from the config blob.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwitterConfig {
    /// Override for the API origin, mainly for testing.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl TwitterConfig {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        match &credentials.config {
            None => Ok(Self::default()),
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                PlatformError::Publish(format!("invalid twitter credential config: {e}")).into()
            }),
        }
    }
}

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

pub struct TwitterPublisher {
    client: reqwest::Client,
}

impl TwitterPublisher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for TwitterPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn publish(
        &self,
        payload: &FormattedPost,
        credentials: &Credentials,
    ) -> Result<PublishReceipt> {
        let FormattedPost::Twitter { text } = payload else {
            return Err(
                PlatformError::Publish("twitter publisher received a foreign payload".to_string())
                    .into(),
            );
        };

        let config = TwitterConfig::from_credentials(credentials)?;
        let api_base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        let response = self
            .client
            .post(format!("{api_base}/2/tweets"))
            .bearer_auth(&credentials.access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("twitter request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                PlatformError::Publish(format!("twitter API returned {status}: {body}")).into(),
            );
        }

        let tweet: TweetResponse = response.json().await.map_err(|e| {
            PlatformError::Publish(format!("twitter API returned an unexpected body: {e}"))
        })?;

        let post_url = format!("https://twitter.com/i/web/status/{}", tweet.data.id);
        Ok(PublishReceipt {
            platform_post_id: tweet.data.id,
            post_url: Some(post_url),
        })
    }
}
