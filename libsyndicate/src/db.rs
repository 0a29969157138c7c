//! Database operations for Syndicate
//!
//! Holds the three persisted tables this subsystem owns: platform
//! credentials, crosspost targets, and the delivery ledger. Ledger writes
//! go through sqlite `INSERT .. ON CONFLICT DO UPDATE` on the
//! (content_id, platform) unique key, so racing orchestration runs cannot
//! lose updates.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::error::Result;
use crate::types::{
    CrosspostTarget, DeliveryRecord, DeliveryStatus, Platform, PlatformCredential,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the database at `db_path` and run
    /// pending migrations.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::DbError::IoError)?;
        }

        // Forward slashes work for sqlite URLs on every platform; mode=rwc
        // creates the file when missing.
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::error::DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. The pool is pinned to one connection
    /// because every new sqlite `:memory:` connection is a fresh, empty
    /// database.
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::error::DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Platform credentials
    // ------------------------------------------------------------------

    /// Insert or replace the credential for a platform. Token fields are
    /// expected to be vault-encrypted blobs already.
    pub async fn upsert_credential(&self, credential: &PlatformCredential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_credentials
                (platform, is_active, access_token, refresh_token, config, token_expires_at, last_used_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform) DO UPDATE SET
                is_active = excluded.is_active,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                config = excluded.config,
                token_expires_at = excluded.token_expires_at
            "#,
        )
        .bind(credential.platform.as_str())
        .bind(credential.is_active as i32)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(&credential.config)
        .bind(credential.token_expires_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_credential(&self, platform: Platform) -> Result<Option<PlatformCredential>> {
        let row = sqlx::query(
            r#"
            SELECT platform, is_active, access_token, refresh_token, config,
                   token_expires_at, last_used_at
            FROM platform_credentials WHERE platform = ?
            "#,
        )
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(|r| credential_from_row(&r)).transpose()
    }

    pub async fn list_credentials(&self) -> Result<Vec<PlatformCredential>> {
        let rows = sqlx::query(
            r#"
            SELECT platform, is_active, access_token, refresh_token, config,
                   token_expires_at, last_used_at
            FROM platform_credentials ORDER BY platform
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.iter().map(credential_from_row).collect()
    }

    /// Flip a credential's active flag. Returns false if no credential is
    /// stored for the platform.
    pub async fn set_credential_active(&self, platform: Platform, active: bool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE platform_credentials SET is_active = ? WHERE platform = ?
            "#,
        )
        .bind(active as i32)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_credential(&self, platform: Platform) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM platform_credentials WHERE platform = ?"#)
            .bind(platform.as_str())
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp last_used_at. Called after every delivery attempt, whatever
    /// the outcome.
    pub async fn touch_credential(&self, platform: Platform) -> Result<()> {
        sqlx::query(r#"UPDATE platform_credentials SET last_used_at = ? WHERE platform = ?"#)
            .bind(chrono::Utc::now().timestamp())
            .bind(platform.as_str())
            .execute(&self.pool)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Crosspost targets
    // ------------------------------------------------------------------

    pub async fn upsert_target(&self, target: &CrosspostTarget) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crosspost_targets (content_id, platform, enabled, custom_message)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(content_id, platform) DO UPDATE SET
                enabled = excluded.enabled,
                custom_message = excluded.custom_message
            "#,
        )
        .bind(target.content_id)
        .bind(target.platform.as_str())
        .bind(target.enabled as i32)
        .bind(&target.custom_message)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_target(
        &self,
        content_id: i64,
        platform: Platform,
    ) -> Result<Option<CrosspostTarget>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_id, platform, enabled, custom_message
            FROM crosspost_targets WHERE content_id = ? AND platform = ?
            "#,
        )
        .bind(content_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(|r| target_from_row(&r)).transpose()
    }

    /// Enabled targets for a content item, the default platform set when
    /// the caller does not name platforms explicitly.
    pub async fn enabled_targets(&self, content_id: i64) -> Result<Vec<CrosspostTarget>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content_id, platform, enabled, custom_message
            FROM crosspost_targets WHERE content_id = ? AND enabled = 1
            ORDER BY platform
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.iter().map(target_from_row).collect()
    }

    // ------------------------------------------------------------------
    // Delivery ledger
    // ------------------------------------------------------------------

    pub async fn get_delivery(
        &self,
        content_id: i64,
        platform: Platform,
    ) -> Result<Option<DeliveryRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, content_id, platform, status, error_message,
                   platform_post_id, post_url, posted_at, retry_count
            FROM delivery_records WHERE content_id = ? AND platform = ?
            "#,
        )
        .bind(content_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(|r| delivery_from_row(&r)).transpose()
    }

    pub async fn list_deliveries(&self, content_id: i64) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content_id, platform, status, error_message,
                   platform_post_id, post_url, posted_at, retry_count
            FROM delivery_records WHERE content_id = ? ORDER BY platform
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// Record that a delivery attempt is starting: atomically insert or
    /// move the row to `pending` and increment retry_count. This is the
    /// single per-attempt increment; [`Database::resolve_delivery`] does
    /// not count.
    pub async fn record_attempt(&self, content_id: i64, platform: Platform) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_records (content_id, platform, status, retry_count)
            VALUES (?, ?, 'pending', 1)
            ON CONFLICT(content_id, platform) DO UPDATE SET
                status = 'pending',
                error_message = NULL,
                retry_count = delivery_records.retry_count + 1
            "#,
        )
        .bind(content_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Resolve the in-flight attempt to a terminal status. Prior
    /// platform_post_id/post_url survive when the new attempt carries
    /// none; posted_at is set only on the transition to success and keeps
    /// its first value afterwards.
    pub async fn resolve_delivery(
        &self,
        content_id: i64,
        platform: Platform,
        status: DeliveryStatus,
        error_message: Option<&str>,
        platform_post_id: Option<&str>,
        post_url: Option<&str>,
    ) -> Result<()> {
        let posted_at = if status == DeliveryStatus::Success {
            Some(chrono::Utc::now().timestamp())
        } else {
            None
        };

        sqlx::query(
            r#"
            UPDATE delivery_records SET
                status = ?,
                error_message = ?,
                platform_post_id = COALESCE(?, platform_post_id),
                post_url = COALESCE(?, post_url),
                posted_at = COALESCE(posted_at, ?)
            WHERE content_id = ? AND platform = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(platform_post_id)
        .bind(post_url)
        .bind(posted_at)
        .bind(content_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }
}

fn credential_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PlatformCredential> {
    Ok(PlatformCredential {
        platform: parse_platform(&row.get::<String, _>("platform"))?,
        is_active: row.get::<i32, _>("is_active") != 0,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        config: row.get("config"),
        token_expires_at: row.get("token_expires_at"),
        last_used_at: row.get("last_used_at"),
    })
}

fn target_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CrosspostTarget> {
    Ok(CrosspostTarget {
        id: row.get("id"),
        content_id: row.get("content_id"),
        platform: parse_platform(&row.get::<String, _>("platform"))?,
        enabled: row.get::<i32, _>("enabled") != 0,
        custom_message: row.get("custom_message"),
    })
}

fn delivery_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DeliveryRecord> {
    Ok(DeliveryRecord {
        id: row.get("id"),
        content_id: row.get("content_id"),
        platform: parse_platform(&row.get::<String, _>("platform"))?,
        status: DeliveryStatus::from_db(&row.get::<String, _>("status")),
        error_message: row.get("error_message"),
        platform_post_id: row.get("platform_post_id"),
        post_url: row.get("post_url"),
        posted_at: row.get("posted_at"),
        retry_count: row.get("retry_count"),
    })
}

fn parse_platform(name: &str) -> Result<Platform> {
    Ok(Platform::from_str(name)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(platform: Platform) -> PlatformCredential {
        PlatformCredential {
            platform,
            is_active: true,
            access_token: "encrypted-blob".to_string(),
            refresh_token: None,
            config: None,
            token_expires_at: None,
            last_used_at: None,
        }
    }

    #[tokio::test]
    async fn test_credential_roundtrip() {
        let db = Database::in_memory().await.unwrap();

        let mut cred = credential(Platform::Twitter);
        cred.refresh_token = Some("encrypted-refresh".to_string());
        cred.config = Some(r#"{"api_base": "https://example.com"}"#.to_string());
        db.upsert_credential(&cred).await.unwrap();

        let loaded = db.get_credential(Platform::Twitter).await.unwrap().unwrap();
        assert_eq!(loaded.platform, Platform::Twitter);
        assert!(loaded.is_active);
        assert_eq!(loaded.access_token, "encrypted-blob");
        assert_eq!(loaded.refresh_token.as_deref(), Some("encrypted-refresh"));
        assert!(loaded.config.unwrap().contains("api_base"));

        assert!(db.get_credential(Platform::Discord).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credential_rotation_keeps_single_row() {
        let db = Database::in_memory().await.unwrap();

        db.upsert_credential(&credential(Platform::Discord)).await.unwrap();
        let mut rotated = credential(Platform::Discord);
        rotated.access_token = "new-blob".to_string();
        db.upsert_credential(&rotated).await.unwrap();

        let all = db.list_credentials().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].access_token, "new-blob");
    }

    #[tokio::test]
    async fn test_set_credential_active() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_credential(&credential(Platform::Facebook)).await.unwrap();

        assert!(db.set_credential_active(Platform::Facebook, false).await.unwrap());
        let loaded = db.get_credential(Platform::Facebook).await.unwrap().unwrap();
        assert!(!loaded.is_active);

        // Nothing stored for instagram.
        assert!(!db.set_credential_active(Platform::Instagram, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_credential_sets_last_used() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_credential(&credential(Platform::Twitter)).await.unwrap();

        db.touch_credential(Platform::Twitter).await.unwrap();

        let loaded = db.get_credential(Platform::Twitter).await.unwrap().unwrap();
        assert!(loaded.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_enabled_targets_skips_disabled() {
        let db = Database::in_memory().await.unwrap();

        db.upsert_target(&CrosspostTarget::new(1, Platform::Twitter))
            .await
            .unwrap();
        let mut disabled = CrosspostTarget::new(1, Platform::Discord);
        disabled.enabled = false;
        db.upsert_target(&disabled).await.unwrap();
        db.upsert_target(&CrosspostTarget::new(2, Platform::Facebook))
            .await
            .unwrap();

        let targets = db.enabled_targets(1).await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].platform, Platform::Twitter);
    }

    #[tokio::test]
    async fn test_target_custom_message_persists() {
        let db = Database::in_memory().await.unwrap();

        db.upsert_target(&CrosspostTarget::new(1, Platform::Twitter).with_message("stored text"))
            .await
            .unwrap();

        let target = db.get_target(1, Platform::Twitter).await.unwrap().unwrap();
        assert_eq!(target.custom_message.as_deref(), Some("stored text"));
    }

    #[tokio::test]
    async fn test_record_attempt_creates_pending_and_increments() {
        let db = Database::in_memory().await.unwrap();

        db.record_attempt(1, Platform::Twitter).await.unwrap();
        let record = db.get_delivery(1, Platform::Twitter).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::Pending);
        assert_eq!(record.retry_count, 1);
        assert!(record.posted_at.is_none());

        db.record_attempt(1, Platform::Twitter).await.unwrap();
        let record = db.get_delivery(1, Platform::Twitter).await.unwrap().unwrap();
        assert_eq!(record.retry_count, 2);
    }

    #[tokio::test]
    async fn test_resolve_success_sets_posted_at_once() {
        let db = Database::in_memory().await.unwrap();

        db.record_attempt(1, Platform::Discord).await.unwrap();
        db.resolve_delivery(
            1,
            Platform::Discord,
            DeliveryStatus::Success,
            None,
            Some("msg-123"),
            Some("https://discord.com/channels/msg-123"),
        )
        .await
        .unwrap();

        let record = db.get_delivery(1, Platform::Discord).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::Success);
        assert_eq!(record.platform_post_id.as_deref(), Some("msg-123"));
        assert!(record.posted_at.is_some());
        assert_eq!(record.retry_count, 1);
    }

    #[tokio::test]
    async fn test_resolve_failure_preserves_prior_ids() {
        let db = Database::in_memory().await.unwrap();

        db.record_attempt(1, Platform::Twitter).await.unwrap();
        db.resolve_delivery(
            1,
            Platform::Twitter,
            DeliveryStatus::Success,
            None,
            Some("tweet-1"),
            Some("https://twitter.com/i/web/status/tweet-1"),
        )
        .await
        .unwrap();

        // A later failed attempt (e.g. a race) must not clobber the stored
        // ids: absent new values coalesce to the old ones.
        db.record_attempt(1, Platform::Twitter).await.unwrap();
        db.resolve_delivery(
            1,
            Platform::Twitter,
            DeliveryStatus::Failed,
            Some("network unreachable"),
            None,
            None,
        )
        .await
        .unwrap();

        let record = db.get_delivery(1, Platform::Twitter).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::Failed);
        assert_eq!(record.platform_post_id.as_deref(), Some("tweet-1"));
        assert_eq!(
            record.post_url.as_deref(),
            Some("https://twitter.com/i/web/status/tweet-1")
        );
        assert_eq!(record.error_message.as_deref(), Some("network unreachable"));
        assert_eq!(record.retry_count, 2);
    }

    #[tokio::test]
    async fn test_failed_attempt_records_error() {
        let db = Database::in_memory().await.unwrap();

        db.record_attempt(9, Platform::Facebook).await.unwrap();
        db.resolve_delivery(
            9,
            Platform::Facebook,
            DeliveryStatus::Failed,
            Some("API returned 401"),
            None,
            None,
        )
        .await
        .unwrap();

        let record = db.get_delivery(9, Platform::Facebook).await.unwrap().unwrap();
        assert_eq!(record.status, DeliveryStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("API returned 401"));
        assert!(record.posted_at.is_none());
        assert!(record.platform_post_id.is_none());
    }

    #[tokio::test]
    async fn test_list_deliveries_for_content() {
        let db = Database::in_memory().await.unwrap();

        db.record_attempt(5, Platform::Twitter).await.unwrap();
        db.record_attempt(5, Platform::Discord).await.unwrap();
        db.record_attempt(6, Platform::Twitter).await.unwrap();

        let records = db.list_deliveries(5).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.content_id == 5));
    }
}
