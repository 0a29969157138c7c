//! Crosspost orchestration
//!
//! Fans one content item out to its target platforms, one tokio task per
//! platform, and aggregates the per-platform outcomes. A platform that
//! already has a successful delivery is skipped without a network call; a
//! failing platform never aborts the rest of the batch. Every attempt is
//! recorded in the delivery ledger before the publish and resolved to a
//! terminal status afterwards, so a cancelled caller cannot strand a
//! pending row: the spawned task keeps running, bounded by the publish
//! timeout.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::PublishConfig;
use crate::content::ContentStore;
use crate::db::Database;
use crate::error::{PlatformError, Result, SyndicateError};
use crate::platforms::{default_publishers, PublishReceipt, Publisher};
use crate::types::{ContentItem, Credentials, DeliveryRecord, DeliveryStatus, Platform};
use crate::vault::Vault;

/// One crosspost trigger: a content item plus optional platform selection
/// and per-platform message overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosspostRequest {
    pub content_id: i64,
    /// Explicit platform set. `None` means every enabled crosspost target
    /// for the content item; an empty list is a valid no-op request.
    #[serde(default)]
    pub platforms: Option<Vec<Platform>>,
    #[serde(default)]
    pub custom_messages: HashMap<Platform, String>,
}

impl CrosspostRequest {
    pub fn new(content_id: i64) -> Self {
        Self {
            content_id,
            platforms: None,
            custom_messages: HashMap::new(),
        }
    }
}

/// Outcome of one platform's delivery within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub success: bool,
    /// True when an earlier successful delivery made this run skip the
    /// platform entirely.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformOutcome {
    fn published(receipt: PublishReceipt) -> Self {
        Self {
            success: true,
            skipped: false,
            platform_post_id: Some(receipt.platform_post_id),
            post_url: receipt.post_url,
            error: None,
        }
    }

    fn skipped(record: &DeliveryRecord) -> Self {
        Self {
            success: true,
            skipped: true,
            platform_post_id: record.platform_post_id.clone(),
            post_url: record.post_url.clone(),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: false,
            platform_post_id: None,
            post_url: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosspostSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosspostResponse {
    pub overall_success: bool,
    pub summary: CrosspostSummary,
    /// Per-platform outcomes, keyed by lowercase platform name.
    pub results: BTreeMap<String, PlatformOutcome>,
}

impl CrosspostResponse {
    fn from_results(results: BTreeMap<String, PlatformOutcome>) -> Self {
        let total = results.len();
        let success = results.values().filter(|r| r.success).count();
        Self {
            overall_success: success == total,
            summary: CrosspostSummary {
                total,
                success,
                failed: total - success,
            },
            results,
        }
    }
}

/// Tunables for a run; usually derived from the `[publish]` config table.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Upper bound on a single publisher call.
    pub publish_timeout: Duration,
    /// Cap on recorded attempts per (content, platform). `None` keeps
    /// failed deliveries eligible for immediate retry forever.
    pub max_attempts: Option<u32>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl From<&PublishConfig> for OrchestratorOptions {
    fn from(config: &PublishConfig) -> Self {
        Self {
            publish_timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts,
        }
    }
}

pub struct Orchestrator {
    db: Database,
    vault: Arc<Vault>,
    content: Arc<dyn ContentStore>,
    publishers: HashMap<Platform, Arc<dyn Publisher>>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Orchestrator with the standard publisher set.
    pub fn new(
        db: Database,
        vault: Vault,
        content: Arc<dyn ContentStore>,
        options: OrchestratorOptions,
    ) -> Self {
        Self::with_publishers(db, vault, content, default_publishers(), options)
    }

    /// Orchestrator with an explicit publisher set, for tests and partial
    /// deployments.
    pub fn with_publishers(
        db: Database,
        vault: Vault,
        content: Arc<dyn ContentStore>,
        publishers: Vec<Box<dyn Publisher>>,
        options: OrchestratorOptions,
    ) -> Self {
        let publishers = publishers
            .into_iter()
            .map(|p| (p.platform(), Arc::from(p)))
            .collect();

        Self {
            db,
            vault: Arc::new(vault),
            content,
            publishers,
            options,
        }
    }

    /// Publish one content item to its target platforms.
    ///
    /// Request-level failures (unknown content id, broken content store)
    /// surface as errors before any platform is touched. Per-platform
    /// failures never do: they land in that platform's result entry and
    /// its delivery record.
    pub async fn crosspost(&self, request: CrosspostRequest) -> Result<CrosspostResponse> {
        let content = self
            .content
            .get_content_item(request.content_id)
            .await?
            .ok_or(SyndicateError::ContentNotFound(request.content_id))?;

        let targets = self.resolve_targets(&request).await?;
        if targets.is_empty() {
            info!(content_id = request.content_id, "no target platforms, nothing to do");
            return Ok(CrosspostResponse::from_results(BTreeMap::new()));
        }

        info!(
            content_id = request.content_id,
            platforms = targets.len(),
            "starting crosspost run"
        );

        let content = Arc::new(content);
        let mut handles = Vec::with_capacity(targets.len());

        for (platform, stored_message) in targets {
            let message = request
                .custom_messages
                .get(&platform)
                .cloned()
                .or(stored_message);

            let delivery = Delivery {
                db: self.db.clone(),
                vault: Arc::clone(&self.vault),
                publisher: self.publishers.get(&platform).cloned(),
                content: Arc::clone(&content),
                platform,
                message,
                options: self.options.clone(),
            };

            // Detached per-platform task: it resolves its ledger row even
            // if the caller stops waiting.
            handles.push((platform, tokio::spawn(delivery.run())));
        }

        let joined = join_all(
            handles
                .into_iter()
                .map(|(platform, handle)| async move { (platform, handle.await) }),
        )
        .await;

        let mut results = BTreeMap::new();
        for (platform, joined_outcome) in joined {
            let outcome = match joined_outcome {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => PlatformOutcome::failed(
                    PlatformError::Cancelled("delivery task cancelled".to_string()).to_string(),
                ),
                Err(e) => PlatformOutcome::failed(format!("delivery task panicked: {e}")),
            };
            results.insert(platform.to_string(), outcome);
        }

        let response = CrosspostResponse::from_results(results);
        info!(
            content_id = request.content_id,
            success = response.summary.success,
            failed = response.summary.failed,
            "crosspost run finished"
        );

        Ok(response)
    }

    /// Explicit caller-supplied list (deduplicated, order kept), else all
    /// enabled targets. Stored custom messages are consulted either way.
    async fn resolve_targets(
        &self,
        request: &CrosspostRequest,
    ) -> Result<Vec<(Platform, Option<String>)>> {
        match &request.platforms {
            Some(explicit) => {
                let mut targets: Vec<(Platform, Option<String>)> = Vec::new();
                for &platform in explicit {
                    if targets.iter().any(|(p, _)| *p == platform) {
                        continue;
                    }
                    let stored = self
                        .db
                        .get_target(request.content_id, platform)
                        .await?
                        .and_then(|t| t.custom_message);
                    targets.push((platform, stored));
                }
                Ok(targets)
            }
            None => Ok(self
                .db
                .enabled_targets(request.content_id)
                .await?
                .into_iter()
                .map(|t| (t.platform, t.custom_message))
                .collect()),
        }
    }
}

/// Everything one platform's delivery task needs.
struct Delivery {
    db: Database,
    vault: Arc<Vault>,
    publisher: Option<Arc<dyn Publisher>>,
    content: Arc<ContentItem>,
    platform: Platform,
    message: Option<String>,
    options: OrchestratorOptions,
}

impl Delivery {
    async fn run(self) -> PlatformOutcome {
        let platform = self.platform;
        let content_id = self.content.id;

        // Idempotency and retry-cap gate: both read the existing record
        // and neither touches the ledger.
        let existing = match self.db.get_delivery(content_id, platform).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(%platform, content_id, "ledger lookup failed: {e}");
                return PlatformOutcome::failed(format!("ledger lookup failed: {e}"));
            }
        };

        if let Some(record) = &existing {
            if record.status == DeliveryStatus::Success {
                info!(%platform, content_id, "already delivered, skipping");
                return PlatformOutcome::skipped(record);
            }

            if let Some(max) = self.options.max_attempts {
                if record.retry_count >= i64::from(max) {
                    warn!(
                        %platform,
                        content_id,
                        retries = record.retry_count,
                        "retry limit reached, refusing to publish"
                    );
                    return PlatformOutcome::failed(format!(
                        "retry limit reached after {} attempts",
                        record.retry_count
                    ));
                }
            }
        }

        let outcome = self.attempt().await;

        if let Err(e) = self.db.touch_credential(platform).await {
            warn!(%platform, "failed to update credential last_used_at: {e}");
        }

        outcome
    }

    /// One recorded attempt: credential, format, publish, resolve.
    async fn attempt(&self) -> PlatformOutcome {
        let platform = self.platform;
        let content_id = self.content.id;

        let credential = match self.db.get_credential(platform).await {
            Ok(Some(credential)) if credential.is_active => credential,
            Ok(Some(_)) => {
                let error = PlatformError::CredentialUnavailable(format!(
                    "credential for {platform} is disabled"
                ));
                return self.record_failure(error.to_string()).await;
            }
            Ok(None) => {
                let error = PlatformError::CredentialUnavailable(format!(
                    "no credential stored for {platform}"
                ));
                return self.record_failure(error.to_string()).await;
            }
            Err(e) => {
                warn!(%platform, content_id, "credential lookup failed: {e}");
                return self.record_failure(format!("credential lookup failed: {e}")).await;
            }
        };

        let access_token = match self.vault.decrypt(&credential.access_token) {
            Ok(token) => token,
            Err(e) => {
                warn!(%platform, content_id, "access token decryption failed");
                return self.record_failure(format!("access token decryption failed: {e}")).await;
            }
        };

        let refresh_token = match &credential.refresh_token {
            Some(blob) => match self.vault.decrypt(blob) {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!(%platform, content_id, "refresh token decryption failed");
                    return self
                        .record_failure(format!("refresh token decryption failed: {e}"))
                        .await;
                }
            },
            None => None,
        };

        let credentials = Credentials {
            access_token,
            refresh_token,
            config: credential.config.clone(),
        };

        let Some(publisher) = &self.publisher else {
            let error = PlatformError::Unsupported(format!("no publisher registered for {platform}"));
            return self.record_failure(error.to_string()).await;
        };

        let payload = match publisher.format(&self.content, self.message.as_deref(), &credentials) {
            Ok(payload) => payload,
            Err(e) => return self.record_failure(format!("formatting failed: {e}")).await,
        };

        if let Err(e) = self.db.record_attempt(content_id, platform).await {
            warn!(%platform, content_id, "failed to record delivery attempt: {e}");
            return PlatformOutcome::failed(format!("failed to record delivery attempt: {e}"));
        }

        info!(%platform, content_id, "publishing");
        match timeout(
            self.options.publish_timeout,
            publisher.publish(&payload, &credentials),
        )
        .await
        {
            Ok(Ok(receipt)) => {
                info!(%platform, content_id, post_id = %receipt.platform_post_id, "published");
                self.resolve(
                    DeliveryStatus::Success,
                    None,
                    Some(receipt.platform_post_id.clone()),
                    receipt.post_url.clone(),
                )
                .await;
                PlatformOutcome::published(receipt)
            }
            Ok(Err(e)) => {
                warn!(%platform, content_id, "publish failed: {e}");
                let message = e.to_string();
                self.resolve(DeliveryStatus::Failed, Some(message.clone()), None, None)
                    .await;
                PlatformOutcome::failed(message)
            }
            Err(_) => {
                let error =
                    PlatformError::Timeout(self.options.publish_timeout.as_secs()).to_string();
                warn!(%platform, content_id, "{error}");
                self.resolve(DeliveryStatus::Failed, Some(error.clone()), None, None)
                    .await;
                PlatformOutcome::failed(error)
            }
        }
    }

    /// Record a failed attempt that never reached the publisher.
    async fn record_failure(&self, error: String) -> PlatformOutcome {
        if let Err(e) = self.db.record_attempt(self.content.id, self.platform).await {
            warn!(platform = %self.platform, "failed to record delivery attempt: {e}");
        } else {
            self.resolve(DeliveryStatus::Failed, Some(error.clone()), None, None)
                .await;
        }
        PlatformOutcome::failed(error)
    }

    async fn resolve(
        &self,
        status: DeliveryStatus,
        error: Option<String>,
        platform_post_id: Option<String>,
        post_url: Option<String>,
    ) {
        if let Err(e) = self
            .db
            .resolve_delivery(
                self.content.id,
                self.platform,
                status,
                error.as_deref(),
                platform_post_id.as_deref(),
                post_url.as_deref(),
            )
            .await
        {
            warn!(platform = %self.platform, "failed to resolve delivery record: {e}");
        }
    }
}
