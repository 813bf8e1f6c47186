use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{
    Client, Collection as MongoCollection, Database as MongoDatabase, IndexModel,
    bson::{DateTime, Document, doc, oid::ObjectId},
};
use once_cell::sync::OnceCell;
use serde::{Serialize, de::DeserializeOwned};

use crate::config::CONFIG;
use crate::data_models::{Collection, SearchRecord};
use crate::store::{
    CollectionStore, DuplicateCollectionName, HistoryFilter, PageRequest, SearchStore,
};

/// Global database instance
static DB: OnceCell<Database> = OnceCell::new();

/// Collection names as constants for consistency
pub mod collections {
    pub const SEARCHES: &str = "searches";
    pub const COLLECTIONS: &str = "collections";
}

/// Main database wrapper providing connection management and collection access
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    /// Create a new Database instance with custom URI and database name.
    /// Useful for testing with a different database.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client_options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;

        let client =
            Client::with_options(client_options).context("Failed to create MongoDB client")?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        log::info!("Connected to MongoDB database: {}", db_name);

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Create a Database instance using environment configuration
    pub async fn from_config() -> Result<Self> {
        Self::new(&CONFIG.mongo_uri, &CONFIG.mongo_db_name).await
    }

    /// Initialize the global database instance.
    /// Call this once at application startup.
    pub async fn init_global() -> Result<&'static Database> {
        let db = Self::from_config().await?;
        db.ensure_indexes().await?;
        DB.set(db)
            .map_err(|_| anyhow::anyhow!("Database already initialized"))?;
        DB.get()
            .ok_or_else(|| anyhow::anyhow!("Database initialization failed"))
    }

    /// Get a typed collection by name
    pub fn collection<T>(&self, name: &str) -> MongoCollection<T>
    where
        T: Send + Sync,
    {
        self.db.collection(name)
    }

    /// Get the underlying MongoDB client (for advanced operations)
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn searches(&self) -> MongoCollection<SearchRecord> {
        self.collection(collections::SEARCHES)
    }

    pub fn collections(&self) -> MongoCollection<Collection> {
        self.collection(collections::COLLECTIONS)
    }

    /// History listing, conversation replay and per-user unique collection names.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.searches()
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": -1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "conversation_id": 1, "created_at": 1 })
                    .build(),
            ])
            .await
            .context("Failed to create searches indexes")?;

        self.collections()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "name": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .context("Failed to create collections index")?;

        log::info!("MongoDB indexes ensured");
        Ok(())
    }
}

// =============================================================================
// Generic CRUD operations
// =============================================================================

pub struct Repository<T>
where
    T: Send + Sync,
{
    collection: MongoCollection<T>,
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(collection: MongoCollection<T>) -> Self {
        Self { collection }
    }

    /// Insert a single document
    pub async fn insert(&self, doc: &T) -> Result<ObjectId> {
        let result = self
            .collection
            .insert_one(doc)
            .await
            .context("Failed to insert document")?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted ObjectId"))
    }

    /// Find a document by ObjectId
    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<T>> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .context("Failed to find document by id")
    }

    /// Find all documents matching a filter, in `sort` order, within an optional window
    pub async fn find(
        &self,
        filter: Document,
        sort: Document,
        window: Option<PageRequest>,
    ) -> Result<Vec<T>> {
        let mut find = self.collection.find(filter).sort(sort);
        if let Some(page) = window {
            find = find.skip(page.skip()).limit(page.limit as i64);
        }

        let cursor = find.await.context("Failed to execute find query")?;

        cursor
            .try_collect()
            .await
            .context("Failed to collect results")
    }

    /// `$set` fields on a document by ObjectId. True if the document exists.
    pub async fn set_by_id(&self, id: ObjectId, fields: Document) -> Result<bool> {
        self.update_by_id(id, doc! { "$set": fields }).await
    }

    /// Apply a raw update document by ObjectId. True if the document exists.
    pub async fn update_by_id(&self, id: ObjectId, update: Document) -> Result<bool> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, update)
            .await
            .context("Failed to update document")?;

        Ok(result.matched_count > 0)
    }

    /// Apply a raw update document to every match
    pub async fn update_many(&self, filter: Document, update: Document) -> Result<u64> {
        let result = self
            .collection
            .update_many(filter, update)
            .await
            .context("Failed to update documents")?;

        Ok(result.modified_count)
    }

    /// Replace a whole document by ObjectId
    pub async fn replace(&self, id: ObjectId, replacement: &T) -> Result<bool> {
        let result = self
            .collection
            .replace_one(doc! { "_id": id }, replacement)
            .await
            .context("Failed to replace document")?;

        Ok(result.matched_count > 0)
    }

    /// Delete a document by ObjectId
    pub async fn delete_by_id(&self, id: ObjectId) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id })
            .await
            .context("Failed to delete document")?;

        Ok(result.deleted_count > 0)
    }

    /// Delete multiple documents matching a filter
    pub async fn delete_many(&self, filter: Document) -> Result<u64> {
        let result = self
            .collection
            .delete_many(filter)
            .await
            .context("Failed to delete documents")?;

        Ok(result.deleted_count)
    }

    /// Count documents matching a filter
    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.collection
            .count_documents(filter)
            .await
            .context("Failed to count documents")
    }

    /// Check if a document exists
    pub async fn exists(&self, filter: Document) -> Result<bool> {
        Ok(self.count(filter).await? > 0)
    }

    /// `_id`s of all documents matching a filter
    pub async fn ids(&self, filter: Document) -> Result<Vec<ObjectId>> {
        let cursor = self
            .collection
            .clone_with_type::<Document>()
            .find(filter)
            .projection(doc! { "_id": 1 })
            .await
            .context("Failed to execute id query")?;

        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .context("Failed to collect ids")?;

        Ok(docs
            .iter()
            .filter_map(|d| d.get_object_id("_id").ok())
            .collect())
    }
}

// =============================================================================
// Search records
// =============================================================================

pub struct SearchRepo {
    repo: Repository<SearchRecord>,
}

impl SearchRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db.searches()),
        }
    }
}

#[async_trait]
impl SearchStore for SearchRepo {
    async fn insert(&self, record: &SearchRecord) -> Result<ObjectId> {
        self.repo.insert(record).await
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<SearchRecord>> {
        self.repo.find_by_id(id).await
    }

    async fn find_many(&self, ids: &[ObjectId]) -> Result<Vec<SearchRecord>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let found = self
            .repo
            .find(doc! { "_id": { "$in": ids.to_vec() } }, doc! {}, None)
            .await?;

        let mut by_id: HashMap<ObjectId, SearchRecord> =
            found.into_iter().map(|r| (r.id, r)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<SearchRecord>, u64)> {
        let mut query = doc! { "user_id": user_id };
        if filter.bookmarked_only {
            query.insert("is_bookmarked", true);
        }
        let total = self.repo.count(query.clone()).await?;
        let records = self
            .repo
            .find(query, doc! { "created_at": -1, "_id": -1 }, Some(page))
            .await?;
        Ok((records, total))
    }

    async fn list_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<SearchRecord>> {
        self.repo
            .find(
                doc! { "user_id": user_id, "conversation_id": conversation_id },
                doc! { "created_at": 1, "_id": 1 },
                None,
            )
            .await
    }

    async fn set_bookmark(&self, id: ObjectId, bookmarked: bool) -> Result<bool> {
        self.repo
            .set_by_id(
                id,
                doc! { "is_bookmarked": bookmarked, "updated_at": DateTime::now() },
            )
            .await
    }

    async fn delete(&self, id: ObjectId) -> Result<bool> {
        self.repo.delete_by_id(id).await
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<Vec<ObjectId>> {
        let ids = self.repo.ids(doc! { "user_id": user_id }).await?;
        if !ids.is_empty() {
            self.repo
                .delete_many(doc! { "_id": { "$in": ids.clone() } })
                .await?;
        }
        Ok(ids)
    }
}

// =============================================================================
// Collections
// =============================================================================

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

/// The unique `(user_id, name)` index rejected the write.
fn duplicate_name_or(err: anyhow::Error, name: &str) -> anyhow::Error {
    match err.downcast_ref::<mongodb::error::Error>() {
        Some(e) if is_duplicate_key(e) => DuplicateCollectionName(name.to_string()).into(),
        _ => err,
    }
}

pub struct CollectionRepo {
    repo: Repository<Collection>,
}

impl CollectionRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db.collections()),
        }
    }
}

#[async_trait]
impl CollectionStore for CollectionRepo {
    async fn insert(&self, collection: &Collection) -> Result<ObjectId> {
        self.repo
            .insert(collection)
            .await
            .map_err(|e| duplicate_name_or(e, &collection.name))
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<Collection>> {
        self.repo.find_by_id(id).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Collection>> {
        self.repo
            .find(
                doc! { "user_id": user_id },
                doc! { "created_at": -1, "_id": -1 },
                None,
            )
            .await
    }

    async fn name_taken(
        &self,
        user_id: &str,
        name: &str,
        except: Option<ObjectId>,
    ) -> Result<bool> {
        let mut filter = doc! { "user_id": user_id, "name": name };
        if let Some(id) = except {
            filter.insert("_id", doc! { "$ne": id });
        }
        self.repo.exists(filter).await
    }

    async fn replace(&self, collection: &Collection) -> Result<bool> {
        self.repo
            .replace(collection.id, collection)
            .await
            .map_err(|e| duplicate_name_or(e, &collection.name))
    }

    async fn delete(&self, id: ObjectId) -> Result<bool> {
        self.repo.delete_by_id(id).await
    }

    async fn add_search(&self, id: ObjectId, search_id: ObjectId) -> Result<bool> {
        self.repo
            .update_by_id(
                id,
                doc! {
                    "$addToSet": { "search_ids": search_id },
                    "$set": { "updated_at": DateTime::now() },
                },
            )
            .await
    }

    async fn remove_search(&self, id: ObjectId, search_id: ObjectId) -> Result<bool> {
        self.repo
            .update_by_id(
                id,
                doc! {
                    "$pull": { "search_ids": search_id },
                    "$set": { "updated_at": DateTime::now() },
                },
            )
            .await
    }

    async fn remove_search_refs(&self, user_id: &str, search_ids: &[ObjectId]) -> Result<u64> {
        if search_ids.is_empty() {
            return Ok(0);
        }
        self.repo
            .update_many(
                doc! { "user_id": user_id },
                doc! {
                    "$pull": { "search_ids": { "$in": search_ids.to_vec() } },
                    "$set": { "updated_at": DateTime::now() },
                },
            )
            .await
    }
}

// =============================================================================
// Test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static TEST_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Create a unique test database name
    pub fn unique_test_db_name() -> String {
        let count = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        format!("quaero_test_{}_{}", timestamp, count)
    }

    /// Create a test database instance.
    /// Uses MONGO_URI from environment but creates a unique test database.
    pub async fn create_test_db() -> Result<(Database, String)> {
        dotenvy::dotenv().ok();
        let uri =
            std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name = unique_test_db_name();
        let db = Database::new(&uri, &db_name).await?;
        db.ensure_indexes().await?;
        Ok((db, db_name))
    }

    /// Clean up a test database by dropping it
    pub async fn cleanup_test_db(db: &Database, db_name: &str) -> Result<()> {
        db.client()
            .database(db_name)
            .drop()
            .await
            .context("Failed to drop test database")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{Focus, ResultType, SearchResult};
    use test_utils::*;

    fn record(user: &str, query: &str) -> SearchRecord {
        SearchRecord::new(
            user.to_string(),
            query.to_string(),
            "answer".to_string(),
            vec![SearchResult::new(
                "Example",
                "https://example.com",
                "snippet",
                ResultType::Result,
            )],
            Focus::General,
            Some("conv-1".to_string()),
            10,
            2,
        )
    }

    #[tokio::test]
    #[ignore = "requires MongoDB at MONGO_URI"]
    async fn test_search_repo_crud() -> Result<()> {
        let (db, db_name) = create_test_db().await?;
        let repo = SearchRepo::new(&db);

        let first = record("alice", "first");
        let second = record("alice", "second");
        let other = record("bob", "other");
        let id = repo.insert(&first).await?;
        repo.insert(&second).await?;
        repo.insert(&other).await?;

        let found = repo.find_by_id(id).await?;
        assert_eq!(found.unwrap().query, "first");

        let (page, total) = repo
            .list_for_user("alice", HistoryFilter::default(), PageRequest::default())
            .await?;
        assert_eq!(total, 2);
        assert_eq!(page.len(), 2);

        assert!(repo.set_bookmark(id, true).await?);
        let (bookmarked, total) = repo
            .list_for_user(
                "alice",
                HistoryFilter {
                    bookmarked_only: true,
                },
                PageRequest::default(),
            )
            .await?;
        assert_eq!(total, 1);
        assert_eq!(bookmarked[0].id, id);

        let conversation = repo.list_conversation("alice", "conv-1").await?;
        assert_eq!(conversation.len(), 2);

        let many = repo.find_many(&[second.id, first.id]).await?;
        assert_eq!(many[0].id, second.id);
        assert_eq!(many[1].id, first.id);

        let deleted = repo.delete_for_user("alice").await?;
        assert_eq!(deleted.len(), 2);
        assert!(repo.find_by_id(other.id).await?.is_some());

        cleanup_test_db(&db, &db_name).await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires MongoDB at MONGO_URI"]
    async fn test_collection_repo_refs() -> Result<()> {
        let (db, db_name) = create_test_db().await?;
        let repo = CollectionRepo::new(&db);

        let collection = Collection::new("alice".to_string(), "Reading".to_string());
        let id = repo.insert(&collection).await?;

        assert!(repo.name_taken("alice", "Reading", None).await?);
        assert!(!repo.name_taken("alice", "Reading", Some(id)).await?);
        assert!(!repo.name_taken("bob", "Reading", None).await?);

        let duplicate = Collection::new("alice".to_string(), "Reading".to_string());
        let err = repo.insert(&duplicate).await.unwrap_err();
        assert!(err.downcast_ref::<DuplicateCollectionName>().is_some());

        let search_id = ObjectId::new();
        assert!(repo.add_search(id, search_id).await?);
        assert!(repo.add_search(id, search_id).await?);
        let found = repo.find_by_id(id).await?.unwrap();
        assert_eq!(found.search_ids, vec![search_id]);

        repo.remove_search_refs("alice", &[search_id]).await?;
        let found = repo.find_by_id(id).await?.unwrap();
        assert!(found.search_ids.is_empty());

        assert!(repo.delete(id).await?);
        assert!(repo.find_by_id(id).await?.is_none());

        cleanup_test_db(&db, &db_name).await?;
        Ok(())
    }
}
