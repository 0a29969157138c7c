//! Syndicate - crosspost publishing for authored content
//!
//! This library fans a single content item out to third-party social
//! platforms (Instagram, Twitter/X, Facebook, Discord), tracking each
//! platform's delivery outcome in a persisted ledger so that every
//! platform receives at most one successful post per content item.

pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod orchestrator;
pub mod platforms;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use config::Config;
pub use content::{ContentStore, FileContentStore, StaticContentStore};
pub use db::Database;
pub use error::{Result, SyndicateError};
pub use orchestrator::{
    CrosspostRequest, CrosspostResponse, Orchestrator, OrchestratorOptions, PlatformOutcome,
};
pub use types::{
    ContentItem, CrosspostTarget, DeliveryRecord, DeliveryStatus, Platform, PlatformCredential,
};
pub use vault::Vault;
