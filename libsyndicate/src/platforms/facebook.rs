//! Facebook publisher
//!
//! Posts to a page feed through the Graph API. The credential config
//! carries the page id the token is scoped to.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::format::FormattedPost;
use crate::platforms::{PublishReceipt, Publisher};
use crate::types::{Credentials, Platform};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookConfig {
    /// The page the posts land on.
    pub page_id: String,
    /// Override for the API origin, mainly for testing.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl FacebookConfig {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let raw = credentials.config.as_deref().ok_or_else(|| {
            PlatformError::Publish("facebook credential is missing its page configuration".to_string())
        })?;

        serde_json::from_str(raw).map_err(|e| {
            PlatformError::Publish(format!("invalid facebook credential config: {e}")).into()
        })
    }
}

#[derive(Deserialize)]
struct FeedResponse {
    id: String,
}

pub struct FacebookPublisher {
    client: reqwest::Client,
}

impl FacebookPublisher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for FacebookPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(
        &self,
        payload: &FormattedPost,
        credentials: &Credentials,
    ) -> Result<PublishReceipt> {
        let FormattedPost::Facebook { message, link } = payload else {
            return Err(
                PlatformError::Publish("facebook publisher received a foreign payload".to_string())
                    .into(),
            );
        };

        let config = FacebookConfig::from_credentials(credentials)?;
        let api_base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        let response = self
            .client
            .post(format!("{api_base}/{}/feed", config.page_id))
            .form(&[
                ("message", message.as_str()),
                ("link", link.as_str()),
                ("access_token", credentials.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("facebook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                PlatformError::Publish(format!("facebook API returned {status}: {body}")).into(),
            );
        }

        let feed: FeedResponse = response.json().await.map_err(|e| {
            PlatformError::Publish(format!("facebook API returned an unexpected body: {e}"))
        })?;

        let post_url = format!("https://www.facebook.com/{}", feed.id);
        Ok(PublishReceipt {
            platform_post_id: feed.id,
            post_url: Some(post_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(config: Option<&str>) -> Credentials {
        Credentials {
            access_token: "token".to_string(),
            refresh_token: None,
            config: config.map(str::to_string),
        }
    }

    #[test]
    fn test_config_requires_page_id() {
        let err = FacebookConfig::from_credentials(&credentials(None)).unwrap_err();
        assert!(err.to_string().contains("page configuration"));

        let err = FacebookConfig::from_credentials(&credentials(Some("{}"))).unwrap_err();
        assert!(err.to_string().contains("invalid facebook credential config"));
    }

    #[test]
    fn test_config_decodes_page_id() {
        let config =
            FacebookConfig::from_credentials(&credentials(Some(r#"{"page_id": "987"}"#))).unwrap();
        assert_eq!(config.page_id, "987");
        assert!(config.api_base.is_none());
    }

    #[tokio::test]
    async fn test_publish_rejects_foreign_payload() {
        let publisher = FacebookPublisher::new();
        let payload = FormattedPost::Twitter {
            text: "hi".to_string(),
        };

        let err = publisher
            .publish(&payload, &credentials(Some(r#"{"page_id": "987"}"#)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foreign payload"));
    }
}
