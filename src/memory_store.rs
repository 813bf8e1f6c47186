//! In-process store for running without MongoDB.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use mongodb::bson::{DateTime, oid::ObjectId};

use crate::data_models::{Collection, SearchRecord};
use crate::store::{
    CollectionStore, DuplicateCollectionName, HistoryFilter, PageRequest, SearchStore,
};

#[derive(Default)]
pub struct MemoryStore {
    searches: DashMap<ObjectId, SearchRecord>,
    collections: DashMap<ObjectId, Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn insert(&self, record: &SearchRecord) -> Result<ObjectId> {
        self.searches.insert(record.id, record.clone());
        Ok(record.id)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<SearchRecord>> {
        Ok(self.searches.get(&id).map(|r| r.clone()))
    }

    async fn find_many(&self, ids: &[ObjectId]) -> Result<Vec<SearchRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.searches.get(id).map(|r| r.clone()))
            .collect())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<SearchRecord>, u64)> {
        let mut matching: Vec<SearchRecord> = self
            .searches
            .iter()
            .filter(|r| r.user_id == user_id && (!filter.bookmarked_only || r.is_bookmarked))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.limit as usize)
            .collect();
        Ok((records, total))
    }

    async fn list_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<SearchRecord>> {
        let mut records: Vec<SearchRecord> = self
            .searches
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.conversation_id.as_deref() == Some(conversation_id)
            })
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(records)
    }

    async fn set_bookmark(&self, id: ObjectId, bookmarked: bool) -> Result<bool> {
        Ok(match self.searches.get_mut(&id) {
            Some(mut record) => {
                record.is_bookmarked = bookmarked;
                record.updated_at = DateTime::now();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: ObjectId) -> Result<bool> {
        Ok(self.searches.remove(&id).is_some())
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<Vec<ObjectId>> {
        let ids: Vec<ObjectId> = self
            .searches
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.id)
            .collect();
        for id in &ids {
            self.searches.remove(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn insert(&self, collection: &Collection) -> Result<ObjectId> {
        // mirrors the unique (user_id, name) index
        if CollectionStore::name_taken(self, &collection.user_id, &collection.name, None).await? {
            return Err(DuplicateCollectionName(collection.name.clone()).into());
        }
        self.collections.insert(collection.id, collection.clone());
        Ok(collection.id)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Collection>> {
        Ok(self.collections.get(&id).map(|c| c.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Collection>> {
        let mut found: Vec<Collection> = self
            .collections
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.clone())
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(found)
    }

    async fn name_taken(
        &self,
        user_id: &str,
        name: &str,
        except: Option<ObjectId>,
    ) -> Result<bool> {
        Ok(self
            .collections
            .iter()
            .any(|c| c.user_id == user_id && c.name == name && Some(c.id) != except))
    }

    async fn replace(&self, collection: &Collection) -> Result<bool> {
        let taken = CollectionStore::name_taken(
            self,
            &collection.user_id,
            &collection.name,
            Some(collection.id),
        )
        .await?;
        if taken {
            return Err(DuplicateCollectionName(collection.name.clone()).into());
        }
        Ok(match self.collections.get_mut(&collection.id) {
            Some(mut existing) => {
                *existing = collection.clone();
                true
            }
            None => false,
        })
    }

    async fn delete(&self, id: ObjectId) -> Result<bool> {
        Ok(self.collections.remove(&id).is_some())
    }

    async fn add_search(&self, id: ObjectId, search_id: ObjectId) -> Result<bool> {
        Ok(match self.collections.get_mut(&id) {
            Some(mut collection) => {
                if !collection.search_ids.contains(&search_id) {
                    collection.search_ids.push(search_id);
                }
                collection.updated_at = DateTime::now();
                true
            }
            None => false,
        })
    }

    async fn remove_search(&self, id: ObjectId, search_id: ObjectId) -> Result<bool> {
        Ok(match self.collections.get_mut(&id) {
            Some(mut collection) => {
                collection.search_ids.retain(|s| *s != search_id);
                collection.updated_at = DateTime::now();
                true
            }
            None => false,
        })
    }

    async fn remove_search_refs(&self, user_id: &str, search_ids: &[ObjectId]) -> Result<u64> {
        let mut modified = 0;
        for mut collection in self.collections.iter_mut() {
            if collection.user_id != user_id {
                continue;
            }
            let before = collection.search_ids.len();
            collection.search_ids.retain(|s| !search_ids.contains(s));
            if collection.search_ids.len() != before {
                collection.updated_at = DateTime::now();
                modified += 1;
            }
        }
        Ok(modified)
    }
}
