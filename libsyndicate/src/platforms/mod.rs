//! Platform publisher abstraction and implementations
//!
//! Each platform gets one [`Publisher`] implementation: a thin HTTP client
//! that takes a formatted payload plus decrypted credentials and returns a
//! structured receipt. Adapters report failures through `Result`; the
//! orchestrator converts every fault into that platform's failed outcome,
//! so nothing an adapter does can abort a batch.

use async_trait::async_trait;

use crate::error::Result;
use crate::format::{format_for_platform, FormattedPost};
use crate::types::{ContentItem, Credentials, Platform};

pub mod discord;
pub mod facebook;
pub mod instagram;
pub mod twitter;

// The mock publisher is available for all builds (not just tests) to
// support integration tests.
pub mod mock;

/// What a successful publish hands back.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Platform-assigned id of the created post.
    pub platform_post_id: String,
    /// Public URL of the created post, when the platform exposes one.
    pub post_url: Option<String>,
}

/// One platform's publishing capability.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The platform this publisher serves.
    fn platform(&self) -> Platform;

    /// Build the platform payload for a content item.
    ///
    /// The default delegates to the pure formatter; a publisher overrides
    /// this only when its credential config changes the output shape
    /// (Discord's embed vs. plain-text mode).
    fn format(
        &self,
        content: &ContentItem,
        custom_message: Option<&str>,
        _credentials: &Credentials,
    ) -> Result<FormattedPost> {
        Ok(format_for_platform(self.platform(), content, custom_message))
    }

    /// Perform the remote publish.
    ///
    /// # Errors
    ///
    /// `PlatformError::Network` for transport failures,
    /// `PlatformError::Publish` for remote rejections and malformed
    /// responses.
    async fn publish(
        &self,
        payload: &FormattedPost,
        credentials: &Credentials,
    ) -> Result<PublishReceipt>;
}

/// The standard publisher set, one per supported platform.
pub fn default_publishers() -> Vec<Box<dyn Publisher>> {
    vec![
        Box::new(instagram::InstagramPublisher::new()),
        Box::new(twitter::TwitterPublisher::new()),
        Box::new(facebook::FacebookPublisher::new()),
        Box::new(discord::DiscordPublisher::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_publishers_cover_every_platform() {
        let publishers = default_publishers();
        let mut covered: Vec<Platform> = publishers.iter().map(|p| p.platform()).collect();
        covered.sort();

        let mut expected = Platform::ALL.to_vec();
        expected.sort();

        assert_eq!(covered, expected);
    }
}
