//! Core types for Syndicate

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// The closed set of platforms a content item can be crossposted to.
///
/// Platform names parse case-insensitively; an unknown name is a hard
/// [`PlatformError::Unsupported`] error rather than a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Facebook,
    Discord,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Instagram,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Discord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Discord => "discord",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "discord" => Ok(Platform::Discord),
            other => Err(PlatformError::Unsupported(other.to_string())),
        }
    }
}

/// A piece of authored content to distribute.
///
/// Owned by the external content store and immutable for the duration of a
/// publish run. The `images` map carries optional per-platform override
/// image URLs, keyed by lowercase platform name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: HashMap<String, String>,
    pub author: String,
}

impl ContentItem {
    /// Override image URL for a platform, if one was authored.
    pub fn image_for(&self, platform: Platform) -> Option<&str> {
        self.images.get(platform.as_str()).map(String::as_str)
    }
}

/// Per-platform crosspost opt-in for a content item.
///
/// At most one target exists per (content_id, platform) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosspostTarget {
    pub id: Option<i64>,
    pub content_id: i64,
    pub platform: Platform,
    pub enabled: bool,
    pub custom_message: Option<String>,
}

impl CrosspostTarget {
    pub fn new(content_id: i64, platform: Platform) -> Self {
        Self {
            id: None,
            content_id,
            platform,
            enabled: true,
            custom_message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.custom_message = Some(message.into());
        self
    }
}

/// A platform's API credential as stored: tokens are vault-encrypted blobs,
/// the config field is a platform-specific JSON document decoded into a
/// typed struct at the adapter boundary.
#[derive(Debug, Clone)]
pub struct PlatformCredential {
    pub platform: Platform,
    pub is_active: bool,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub config: Option<String>,
    pub token_expires_at: Option<i64>,
    pub last_used_at: Option<i64>,
}

/// Decrypted credential material handed to a publisher for one delivery.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub config: Option<String>,
}

/// Delivery lifecycle state. `Pending` is transient (an attempt is in
/// flight); `Success` and `Failed` are terminal for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub(crate) fn from_db(s: &str) -> Self {
        match s {
            "success" => DeliveryStatus::Success,
            "failed" => DeliveryStatus::Failed,
            _ => DeliveryStatus::Pending,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the delivery ledger: the outcome history of crossposting a
/// content item to a platform. Unique on (content_id, platform), upserted
/// on every attempt, never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Option<i64>,
    pub content_id: i64,
    pub platform: Platform,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub platform_post_id: Option<String>,
    pub post_url: Option<String>,
    pub posted_at: Option<i64>,
    pub retry_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_from_str_case_insensitive() {
        assert_eq!("instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!("Instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!("TWITTER".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!("FaceBook".parse::<Platform>().unwrap(), Platform::Facebook);
        assert_eq!("discord".parse::<Platform>().unwrap(), Platform::Discord);
    }

    #[test]
    fn test_platform_from_str_x_alias() {
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
    }

    #[test]
    fn test_platform_from_str_unknown_is_error() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported(name) if name == "myspace"));
    }

    #[test]
    fn test_platform_display_is_lowercase() {
        assert_eq!(Platform::Instagram.to_string(), "instagram");
        assert_eq!(Platform::Twitter.to_string(), "twitter");
        assert_eq!(Platform::Facebook.to_string(), "facebook");
        assert_eq!(Platform::Discord.to_string(), "discord");
    }

    #[test]
    fn test_platform_serde_lowercase() {
        let json = serde_json::to_string(&Platform::Discord).unwrap();
        assert_eq!(json, r#""discord""#);
        let parsed: Platform = serde_json::from_str(r#""twitter""#).unwrap();
        assert_eq!(parsed, Platform::Twitter);
    }

    #[test]
    fn test_content_item_image_for() {
        let mut images = HashMap::new();
        images.insert(
            "instagram".to_string(),
            "https://cdn.example.com/square.jpg".to_string(),
        );

        let item = ContentItem {
            id: 1,
            title: "Title".to_string(),
            excerpt: String::new(),
            url: "https://blog.example.com/title".to_string(),
            tags: vec![],
            images,
            author: "Alex".to_string(),
        };

        assert_eq!(
            item.image_for(Platform::Instagram),
            Some("https://cdn.example.com/square.jpg")
        );
        assert_eq!(item.image_for(Platform::Discord), None);
    }

    #[test]
    fn test_content_item_deserialization_defaults() {
        let item: ContentItem = serde_json::from_str(
            r#"{"id": 7, "title": "Hello", "url": "https://example.com/hello", "author": "Sam"}"#,
        )
        .unwrap();

        assert_eq!(item.id, 7);
        assert_eq!(item.excerpt, "");
        assert!(item.tags.is_empty());
        assert!(item.images.is_empty());
    }

    #[test]
    fn test_delivery_status_roundtrip() {
        for status in [
            DeliveryStatus::Pending,
            DeliveryStatus::Success,
            DeliveryStatus::Failed,
        ] {
            assert_eq!(DeliveryStatus::from_db(status.as_str()), status);
        }
    }

    #[test]
    fn test_delivery_status_unknown_defaults_to_pending() {
        assert_eq!(DeliveryStatus::from_db("garbage"), DeliveryStatus::Pending);
    }

    #[test]
    fn test_crosspost_target_builder() {
        let target = CrosspostTarget::new(3, Platform::Twitter).with_message("custom text");
        assert_eq!(target.content_id, 3);
        assert!(target.enabled);
        assert_eq!(target.custom_message.as_deref(), Some("custom text"));
    }
}
