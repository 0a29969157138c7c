//! Mock publisher for testing
//!
//! A configurable publisher that can simulate success, scripted failures,
//! and slow platforms, while counting calls and capturing the payloads it
//! was handed. Used by the orchestrator integration tests to exercise the
//! fan-out logic without credentials or network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::format::FormattedPost;
use crate::platforms::{PublishReceipt, Publisher};
use crate::types::{Credentials, Platform};

/// Shared observation state, cloneable so tests keep a handle after the
/// publisher itself moves into the orchestrator.
#[derive(Clone, Default)]
pub struct MockObserver {
    publish_calls: Arc<AtomicUsize>,
    payloads: Arc<Mutex<Vec<FormattedPost>>>,
}

impl MockObserver {
    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<FormattedPost> {
        self.payloads.lock().unwrap().clone()
    }
}

pub struct MockPublisher {
    platform: Platform,
    succeeds: bool,
    error: Option<String>,
    delay: Duration,
    observer: MockObserver,
}

impl MockPublisher {
    /// A publisher that always succeeds.
    pub fn success(platform: Platform) -> Self {
        Self {
            platform,
            succeeds: true,
            error: None,
            delay: Duration::ZERO,
            observer: MockObserver::default(),
        }
    }

    /// A publisher that always fails with the given error message.
    pub fn failure(platform: Platform, error: &str) -> Self {
        Self {
            platform,
            succeeds: false,
            error: Some(error.to_string()),
            delay: Duration::ZERO,
            observer: MockObserver::default(),
        }
    }

    /// A publisher that sleeps before answering, for timeout tests.
    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self {
            platform,
            succeeds: true,
            error: None,
            delay,
            observer: MockObserver::default(),
        }
    }

    /// Observation handle; clone it before handing the publisher away.
    pub fn observer(&self) -> MockObserver {
        self.observer.clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(
        &self,
        payload: &FormattedPost,
        _credentials: &Credentials,
    ) -> Result<PublishReceipt> {
        let call = self.observer.publish_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.observer.payloads.lock().unwrap().push(payload.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if self.succeeds {
            let post_id = format!("{}-mock-{call}", self.platform);
            let post_url = format!("https://mock.example/{}/{call}", self.platform);
            Ok(PublishReceipt {
                platform_post_id: post_id,
                post_url: Some(post_url),
            })
        } else {
            let message = self
                .error
                .clone()
                .unwrap_or_else(|| "mock publish failed".to_string());
            Err(PlatformError::Publish(message).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn credentials() -> Credentials {
        Credentials {
            access_token: "token".to_string(),
            refresh_token: None,
            config: None,
        }
    }

    fn payload() -> FormattedPost {
        FormattedPost::Twitter {
            text: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_success_counts_calls() {
        let publisher = MockPublisher::success(Platform::Twitter);
        let observer = publisher.observer();

        let receipt = publisher.publish(&payload(), &credentials()).await.unwrap();
        assert_eq!(receipt.platform_post_id, "twitter-mock-1");
        assert!(receipt.post_url.unwrap().contains("mock.example"));
        assert_eq!(observer.publish_calls(), 1);
        assert_eq!(observer.payloads().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_returns_scripted_error() {
        let publisher = MockPublisher::failure(Platform::Discord, "remote said no");
        let observer = publisher.observer();

        let err = publisher
            .publish(&payload(), &credentials())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("remote said no"));
        assert_eq!(observer.publish_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_delay() {
        let publisher = MockPublisher::with_delay(Platform::Facebook, Duration::from_millis(30));

        let start = std::time::Instant::now();
        publisher.publish(&payload(), &credentials()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_mock_uses_default_formatter() {
        let publisher = MockPublisher::success(Platform::Twitter);
        let content = crate::types::ContentItem {
            id: 1,
            title: "Title".to_string(),
            excerpt: String::new(),
            url: "https://example.com/title".to_string(),
            tags: vec![],
            images: HashMap::new(),
            author: "Alex".to_string(),
        };

        let formatted = publisher.format(&content, None, &credentials()).unwrap();
        assert!(matches!(formatted, FormattedPost::Twitter { .. }));
    }
}
