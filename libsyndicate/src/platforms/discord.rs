//! Discord publisher
//!
//! Delivers through a channel webhook. The credential config carries the
//! webhook URL and whether to post rich embeds or plain text; the
//! formatter is switched accordingly at format time.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::format::{format_discord, DiscordPayload, FormattedPost};
use crate::platforms::{PublishReceipt, Publisher};
use crate::types::{ContentItem, Credentials, Platform};

fn default_use_embeds() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Channel webhook the messages are delivered to.
    pub webhook_url: String,
    /// Rich embed (default) or plain-text output.
    #[serde(default = "default_use_embeds")]
    pub use_embeds: bool,
}

impl DiscordConfig {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let raw = credentials.config.as_deref().ok_or_else(|| {
            PlatformError::Publish(
                "discord credential is missing its webhook configuration".to_string(),
            )
        })?;

        serde_json::from_str(raw).map_err(|e| {
            PlatformError::Publish(format!("invalid discord credential config: {e}")).into()
        })
    }
}

#[derive(Deserialize)]
struct WebhookMessage {
    id: String,
}

pub struct DiscordPublisher {
    client: reqwest::Client,
}

impl DiscordPublisher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DiscordPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for DiscordPublisher {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    fn format(
        &self,
        content: &ContentItem,
        custom_message: Option<&str>,
        credentials: &Credentials,
    ) -> Result<FormattedPost> {
        // Embed mode unless the credential config opts out. Config decode
        // problems are left for publish() to report.
        let use_embeds = DiscordConfig::from_credentials(credentials)
            .map(|config| config.use_embeds)
            .unwrap_or(true);

        Ok(format_discord(content, custom_message, use_embeds))
    }

    async fn publish(
        &self,
        payload: &FormattedPost,
        credentials: &Credentials,
    ) -> Result<PublishReceipt> {
        let FormattedPost::Discord(payload) = payload else {
            return Err(
                PlatformError::Publish("discord publisher received a foreign payload".to_string())
                    .into(),
            );
        };

        let config = DiscordConfig::from_credentials(credentials)?;

        let body = match payload {
            DiscordPayload::Text(text) => serde_json::json!({ "content": text }),
            DiscordPayload::Embed(embed) => {
                let mut fields = serde_json::json!({
                    "title": embed.title,
                    "description": embed.description,
                    "url": embed.url,
                    "color": embed.color,
                    "footer": { "text": embed.footer },
                    "timestamp": embed.timestamp,
                });
                if let Some(image) = &embed.image_url {
                    fields["image"] = serde_json::json!({ "url": image });
                }
                serde_json::json!({ "embeds": [fields] })
            }
        };

        // wait=true makes the webhook return the created message.
        let response = self
            .client
            .post(format!("{}?wait=true", config.webhook_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Network(format!("discord request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                PlatformError::Publish(format!("discord webhook returned {status}: {body}")).into(),
            );
        }

        let message: WebhookMessage = response.json().await.map_err(|e| {
            PlatformError::Publish(format!("discord webhook returned an unexpected body: {e}"))
        })?;

        Ok(PublishReceipt {
            platform_post_id: message.id,
            post_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn credentials(config: Option<&str>) -> Credentials {
        Credentials {
            access_token: "unused-for-webhooks".to_string(),
            refresh_token: None,
            config: config.map(str::to_string),
        }
    }

    fn content() -> ContentItem {
        ContentItem {
            id: 1,
            title: "Title".to_string(),
            excerpt: "Excerpt".to_string(),
            url: "https://blog.example.com/title".to_string(),
            tags: vec![],
            images: HashMap::new(),
            author: "Alex".to_string(),
        }
    }

    #[test]
    fn test_config_requires_webhook() {
        let err = DiscordConfig::from_credentials(&credentials(None)).unwrap_err();
        assert!(err.to_string().contains("webhook configuration"));
    }

    #[test]
    fn test_config_embeds_default_on() {
        let config = DiscordConfig::from_credentials(&credentials(Some(
            r#"{"webhook_url": "https://discord.com/api/webhooks/1/abc"}"#,
        )))
        .unwrap();
        assert!(config.use_embeds);
    }

    #[test]
    fn test_format_respects_plain_text_config() {
        let publisher = DiscordPublisher::new();
        let creds = credentials(Some(
            r#"{"webhook_url": "https://discord.com/api/webhooks/1/abc", "use_embeds": false}"#,
        ));

        let payload = publisher.format(&content(), None, &creds).unwrap();
        assert!(matches!(
            payload,
            FormattedPost::Discord(DiscordPayload::Text(_))
        ));
    }

    #[test]
    fn test_format_defaults_to_embeds() {
        let publisher = DiscordPublisher::new();
        let creds = credentials(Some(
            r#"{"webhook_url": "https://discord.com/api/webhooks/1/abc"}"#,
        ));

        let payload = publisher.format(&content(), None, &creds).unwrap();
        assert!(matches!(
            payload,
            FormattedPost::Discord(DiscordPayload::Embed(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_rejects_foreign_payload() {
        let publisher = DiscordPublisher::new();
        let payload = FormattedPost::Twitter {
            text: "hi".to_string(),
        };

        let err = publisher
            .publish(
                &payload,
                &credentials(Some(r#"{"webhook_url": "https://discord.example/hook"}"#)),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("foreign payload"));
    }
}
