//! Content store collaborator.
//!
//! The content store (posts, galleries, editing workflow) lives outside
//! this subsystem; the orchestrator only needs to look items up by id.
//! Two implementations ship here: an in-memory store for tests and a
//! JSON-file store for the CLI.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::types::ContentItem;

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content_item(&self, id: i64) -> Result<Option<ContentItem>>;
}

/// Fixed set of content items held in memory.
pub struct StaticContentStore {
    items: HashMap<i64, ContentItem>,
}

impl StaticContentStore {
    pub fn new(items: impl IntoIterator<Item = ContentItem>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.id, item)).collect(),
        }
    }
}

#[async_trait]
impl ContentStore for StaticContentStore {
    async fn get_content_item(&self, id: i64) -> Result<Option<ContentItem>> {
        Ok(self.items.get(&id).cloned())
    }
}

/// Content items read from a JSON document: either a single object or an
/// array of objects. The file is re-read on every lookup so edits between
/// runs are picked up.
pub struct FileContentStore {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentDocument {
    One(Box<ContentItem>),
    Many(Vec<ContentItem>),
}

impl FileContentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Vec<ContentItem>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            crate::SyndicateError::InvalidInput(format!(
                "failed to read content file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let document: ContentDocument = serde_json::from_str(&raw).map_err(|e| {
            crate::SyndicateError::InvalidInput(format!(
                "failed to parse content file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(match document {
            ContentDocument::One(item) => vec![*item],
            ContentDocument::Many(items) => items,
        })
    }

    /// All item ids in the document, in file order. Lets the CLI infer the
    /// target when the document holds exactly one item.
    pub fn item_ids(&self) -> Result<Vec<i64>> {
        Ok(self.read_all()?.iter().map(|item| item.id).collect())
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn get_content_item(&self, id: i64) -> Result<Option<ContentItem>> {
        Ok(self.read_all()?.into_iter().find(|item| item.id == id))
    }
}
