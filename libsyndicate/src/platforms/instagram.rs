//! Instagram publisher
//!
//! Instagram's Graph API publishes in two steps: create a media container
//! with the caption (and image, when one was authored), then publish the
//! container. The credential config carries the business account id the
//! token is scoped to.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::format::FormattedPost;
use crate::platforms::{PublishReceipt, Publisher};
use crate::types::{Credentials, Platform};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramConfig {
    /// The Instagram business account posts are created under.
    pub business_account_id: String,
    /// Override for the API origin, mainly for testing.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl InstagramConfig {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let raw = credentials.config.as_deref().ok_or_else(|| {
            PlatformError::Publish(
                "instagram credential is missing its business account configuration".to_string(),
            )
        })?;

        serde_json::from_str(raw).map_err(|e| {
            PlatformError::Publish(format!("invalid instagram credential config: {e}")).into()
        })
    }
}

#[derive(Deserialize)]
struct GraphId {
    id: String,
}

pub struct InstagramPublisher {
    client: reqwest::Client,
}

impl InstagramPublisher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn graph_post(&self, url: String, form: &[(&str, &str)]) -> Result<GraphId> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("instagram request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                PlatformError::Publish(format!("instagram API returned {status}: {body}")).into(),
            );
        }

        response.json().await.map_err(|e| {
            PlatformError::Publish(format!("instagram API returned an unexpected body: {e}")).into()
        })
    }
}

impl Default for InstagramPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for InstagramPublisher {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn publish(
        &self,
        payload: &FormattedPost,
        credentials: &Credentials,
    ) -> Result<PublishReceipt> {
        let FormattedPost::Instagram { caption, image_url } = payload else {
            return Err(PlatformError::Publish(
                "instagram publisher received a foreign payload".to_string(),
            )
            .into());
        };

        let config = InstagramConfig::from_credentials(credentials)?;
        let api_base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let account = &config.business_account_id;

        let mut form: Vec<(&str, &str)> = vec![
            ("caption", caption.as_str()),
            ("access_token", credentials.access_token.as_str()),
        ];
        if let Some(image) = image_url {
            form.push(("image_url", image.as_str()));
        }

        let container = self
            .graph_post(format!("{api_base}/{account}/media"), &form)
            .await?;

        let published = self
            .graph_post(
                format!("{api_base}/{account}/media_publish"),
                &[
                    ("creation_id", container.id.as_str()),
                    ("access_token", credentials.access_token.as_str()),
                ],
            )
            .await?;

        Ok(PublishReceipt {
            platform_post_id: published.id,
            post_url: None,
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
    fn test_config_requires_business_account() {
        let err = InstagramConfig::from_credentials(&credentials(None)).unwrap_err();
        assert!(err.to_string().contains("business account configuration"));
    }

    #[test]
    fn test_config_decodes_account_id() {
        let config = InstagramConfig::from_credentials(&credentials(Some(
            r#"{"business_account_id": "178414"}"#,
        )))
        .unwrap();
        assert_eq!(config.business_account_id, "178414");
    }

    #[tokio::test]
    async fn test_publish_rejects_foreign_payload() {
        let publisher = InstagramPublisher::new();
        let payload = FormattedPost::Twitter {
            text: "hi".to_string(),
        };

        let err = publisher
            .publish(
                &payload,
                &credentials(Some(r#"{"business_account_id": "178414"}"#)),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foreign payload"));
    }
}
