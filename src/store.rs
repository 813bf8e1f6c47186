use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::data_models::{Collection, SearchRecord};

pub const DEFAULT_PAGE_LIMIT: u64 = 20;
pub const MAX_PAGE_LIMIT: u64 = 100;
/// Keeps `skip()` within the signed 64-bit range MongoDB accepts.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_LIMIT;

/// Returned by [`CollectionStore`] writes that would give a user two
/// collections with the same name.
#[derive(Debug, Error)]
#[error("A collection named '{0}' already exists")]
pub struct DuplicateCollectionName(pub String);

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryFilter {
    pub bookmarked_only: bool,
}

/// Persistence of search records. Ownership checks live in the handlers.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn insert(&self, record: &SearchRecord) -> Result<ObjectId>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<SearchRecord>>;

    /// Records for `ids` in the order given; unknown ids are skipped.
    async fn find_many(&self, ids: &[ObjectId]) -> Result<Vec<SearchRecord>>;

    /// Newest first, plus the total count matching the filter.
    async fn list_for_user(
        &self,
        user_id: &str,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<SearchRecord>, u64)>;

    /// Oldest first.
    async fn list_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<SearchRecord>>;

    async fn set_bookmark(&self, id: ObjectId, bookmarked: bool) -> Result<bool>;

    async fn delete(&self, id: ObjectId) -> Result<bool>;

    /// Removes every record of the user and returns the removed ids.
    async fn delete_for_user(&self, user_id: &str) -> Result<Vec<ObjectId>>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Fails with [`DuplicateCollectionName`] when the name is taken.
    async fn insert(&self, collection: &Collection) -> Result<ObjectId>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Collection>>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Collection>>;

    /// Whether the user already has a collection called `name`, ignoring `except`.
    async fn name_taken(&self, user_id: &str, name: &str, except: Option<ObjectId>)
    -> Result<bool>;

    /// Fails with [`DuplicateCollectionName`] when renamed onto a taken name.
    async fn replace(&self, collection: &Collection) -> Result<bool>;

    async fn delete(&self, id: ObjectId) -> Result<bool>;

    /// Set semantics: adding an id twice keeps a single reference.
    async fn add_search(&self, id: ObjectId, search_id: ObjectId) -> Result<bool>;

    async fn remove_search(&self, id: ObjectId, search_id: ObjectId) -> Result<bool>;

    /// Pulls `search_ids` out of every collection owned by `user_id`.
    async fn remove_search_refs(&self, user_id: &str, search_ids: &[ObjectId]) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let p = PageRequest::new(0, 0);
        assert_eq!(p, PageRequest { page: 1, limit: 1 });
        let p = PageRequest::new(3, 500);
        assert_eq!(p.limit, MAX_PAGE_LIMIT);
        assert_eq!(p.skip(), 200);
        assert_eq!(PageRequest::default().skip(), 0);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let p = PageRequest::new(u64::MAX, MAX_PAGE_LIMIT);
        assert_eq!(p.page, MAX_PAGE);
        assert!(p.skip() <= i64::MAX as u64);
    }
}
