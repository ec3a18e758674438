//! In-process document store
//!
//! [`MemoryStore`] is both a [`StoreConnector`] and a [`StoreClient`]: clones share the same
//! databases, so a store handed to a [`crate::Rice`] builder can be inspected afterwards.
//! Collections keep documents in insertion order behind a tokio `RwLock`.
//!
//! ```rust
//! use bson::doc;
//! use mongo_rice::store::{MemoryStore, StoreClient, StoreCollection};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let songs = store.collection("music", "songs");
//! let id = songs.insert_one(doc! { "title": "So What" }).await.unwrap();
//! assert!(id.as_object_id().is_some());
//! # }
//! ```

mod pipeline;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{FindOptions, StoreClient, StoreCollection, StoreConnector, StoreError, StoreResult};
use crate::config::MongoConfig;

/// Shared in-memory databases keyed by `(database, collection)`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<DashMap<(String, String), Arc<MemoryCollection>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle for `name` in `database`, created on first use
    pub fn memory_collection(&self, database: &str, name: &str) -> Arc<MemoryCollection> {
        self.collections
            .entry((database.to_string(), name.to_string()))
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone()
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    async fn connect(&self, config: &MongoConfig) -> StoreResult<Arc<dyn StoreClient>> {
        debug!(database = %config.database, "Using in-memory store");
        Ok(Arc::new(self.clone()))
    }
}

impl StoreClient for MemoryStore {
    fn collection(&self, database: &str, name: &str) -> Arc<dyn StoreCollection> {
        self.memory_collection(database, name)
    }
}

/// One collection of the memory store
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Copy of every stored document in insertion order
    pub async fn snapshot(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Whether the collection holds no documents
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

/// Put `_id` first, generating one when absent or null
fn with_id(mut document: Document) -> (Bson, Document) {
    let id = match document.remove("_id") {
        Some(Bson::Null) | None => Bson::ObjectId(ObjectId::new()),
        Some(id) => id,
    };
    let mut stored = Document::new();
    stored.insert("_id", id.clone());
    stored.extend(document);
    (id, stored)
}

fn contains_id(documents: &[Document], id: &Bson) -> bool {
    documents.iter().any(|existing| existing.get("_id") == Some(id))
}

fn duplicate_key(collection: &str, id: &Bson) -> StoreError {
    StoreError::new(format!(
        "E11000 duplicate key error collection: {collection} index: _id_ dup key: {{ _id: {id} }}"
    ))
}

fn position_of(documents: &[Document], filter: &Document) -> StoreResult<Option<usize>> {
    for (index, document) in documents.iter().enumerate() {
        if query::matches(document, filter)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

#[async_trait]
impl StoreCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut found = Vec::new();
        for document in documents.iter() {
            if query::matches(document, &filter)? {
                found.push(document.clone());
            }
        }
        drop(documents);

        if let Some(sort) = &options.sort {
            query::sort_documents(&mut found, sort)?;
        }
        let skip = options
            .skip
            .map_or(0, |skip| usize::try_from(skip).unwrap_or(usize::MAX));
        let mut found: Vec<Document> = found.into_iter().skip(skip).collect();
        match options.limit {
            Some(limit) if limit != 0 => {
                found.truncate(usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX));
            }
            _ => {}
        }
        Ok(found)
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(position_of(&documents, &filter)?.map(|index| documents[index].clone()))
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        pipeline::run(documents.clone(), &pipeline)
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        let (id, stored) = with_id(document);
        let mut documents = self.documents.write().await;
        if contains_id(&documents, &id) {
            return Err(duplicate_key(&self.name, &id));
        }
        documents.push(stored);
        Ok(id)
    }

    async fn insert_many(&self, batch: Vec<Document>) -> StoreResult<Vec<Bson>> {
        let prepared: Vec<(Bson, Document)> = batch.into_iter().map(with_id).collect();
        let mut documents = self.documents.write().await;
        for (index, (id, _)) in prepared.iter().enumerate() {
            let repeated = prepared[..index].iter().any(|(earlier, _)| earlier == id);
            if repeated || contains_id(&documents, id) {
                return Err(duplicate_key(&self.name, id));
            }
        }
        let mut ids = Vec::with_capacity(prepared.len());
        for (id, stored) in prepared {
            ids.push(id);
            documents.push(stored);
        }
        Ok(ids)
    }

    async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
    ) -> StoreResult<Option<Document>> {
        let mut documents = self.documents.write().await;
        let Some(index) = position_of(&documents, &filter)? else {
            return Ok(None);
        };
        let current_id = documents[index].get("_id").cloned().unwrap_or(Bson::Null);
        let mut replacement = replacement;
        match replacement.remove("_id") {
            Some(id) if id != current_id => {
                return Err(StoreError::new(format!(
                    "Performing an update on the path '_id' would modify the immutable field '_id' of {}",
                    self.name
                )))
            }
            _ => {}
        }
        let mut stored = Document::new();
        stored.insert("_id", current_id);
        stored.extend(replacement);
        documents[index] = stored.clone();
        Ok(Some(stored))
    }

    async fn find_one_and_delete(&self, filter: Document) -> StoreResult<Option<Document>> {
        let mut documents = self.documents.write().await;
        Ok(position_of(&documents, &filter)?.map(|index| documents.remove(index)))
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let mut keep = Vec::with_capacity(documents.len());
        for document in documents.iter() {
            keep.push(!query::matches(document, &filter)?);
        }
        let before = documents.len();
        let mut flags = keep.into_iter();
        documents.retain(|_| flags.next().unwrap_or(true));
        Ok((before - documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn collection() -> Arc<MemoryCollection> {
        MemoryStore::new().memory_collection("test", "tracks")
    }

    #[tokio::test]
    async fn test_insert_generates_id_first() {
        let tracks = collection();
        let id = tracks.insert_one(doc! { "title": "Naima" }).await.unwrap();
        let stored = tracks.snapshot().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored[0].get("_id"), Some(&id));
    }

    #[tokio::test]
    async fn test_insert_replaces_null_id() {
        let tracks = collection();
        let id = tracks
            .insert_one(doc! { "_id": Bson::Null, "title": "Naima" })
            .await
            .unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
    }

    #[tokio::test]
    async fn test_insert_keeps_given_id_and_rejects_duplicates() {
        let tracks = collection();
        let id = ObjectId::new();
        let returned = tracks.insert_one(doc! { "_id": id, "title": "A" }).await.unwrap();
        assert_eq!(returned, Bson::ObjectId(id));
        let err = tracks
            .insert_one(doc! { "_id": id, "title": "B" })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("E11000"));
        assert_eq!(tracks.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_many_is_all_or_nothing() {
        let tracks = collection();
        let id = ObjectId::new();
        let result = tracks
            .insert_many(vec![
                doc! { "title": "A" },
                doc! { "_id": id, "title": "B" },
                doc! { "_id": id, "title": "C" },
            ])
            .await;
        assert!(result.is_err());
        assert!(tracks.is_empty().await);

        let ids = tracks
            .insert_many(vec![doc! { "title": "A" }, doc! { "title": "B" }])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        let stored = tracks.snapshot().await;
        assert_eq!(stored[0].get("_id"), Some(&ids[0]));
        assert_eq!(stored[1].get("_id"), Some(&ids[1]));
    }

    #[tokio::test]
    async fn test_find_sort_skip_limit() {
        let tracks = collection();
        for n in 1..=5 {
            tracks.insert_one(doc! { "n": n }).await.unwrap();
        }
        let options = FindOptions {
            sort: Some(doc! { "n": -1 }),
            skip: Some(1),
            limit: Some(2),
        };
        let found = tracks.find(doc! {}, options).await.unwrap();
        let order: Vec<i32> = found.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![4, 3]);
    }

    #[tokio::test]
    async fn test_find_one_uses_natural_order() {
        let tracks = collection();
        tracks.insert_one(doc! { "n": 2, "k": "x" }).await.unwrap();
        tracks.insert_one(doc! { "n": 1, "k": "x" }).await.unwrap();
        let found = tracks.find_one(doc! { "k": "x" }).await.unwrap().unwrap();
        assert_eq!(found.get_i32("n").unwrap(), 2);
        assert!(tracks.find_one(doc! { "k": "y" }).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_returns_after_image_and_keeps_id() {
        let tracks = collection();
        let id = tracks.insert_one(doc! { "title": "Draft" }).await.unwrap();
        let replaced = tracks
            .find_one_and_replace(doc! { "_id": id.clone() }, doc! { "title": "Final" })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced, doc! { "_id": id.clone(), "title": "Final" });

        let err = tracks
            .find_one_and_replace(
                doc! { "_id": id },
                doc! { "_id": ObjectId::new(), "title": "Moved" },
            )
            .await
            .unwrap_err();
        assert!(err.message().contains("immutable field '_id'"));

        let missing = tracks
            .find_one_and_replace(doc! { "_id": ObjectId::new() }, doc! { "title": "None" })
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_operations() {
        let tracks = collection();
        for n in 1..=4 {
            tracks.insert_one(doc! { "n": n, "odd": n % 2 == 1 }).await.unwrap();
        }
        let removed = tracks.find_one_and_delete(doc! { "odd": true }).await.unwrap().unwrap();
        assert_eq!(removed.get_i32("n").unwrap(), 1);
        assert_eq!(tracks.delete_many(doc! { "odd": false }).await.unwrap(), 2);
        assert_eq!(tracks.len().await, 1);
        assert_eq!(tracks.delete_many(doc! {}).await.unwrap(), 1);
        assert!(tracks.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_collections() {
        let store = MemoryStore::new();
        let clone = store.clone();
        store
            .collection("db", "tracks")
            .insert_one(doc! { "n": 1 })
            .await
            .unwrap();
        assert_eq!(clone.memory_collection("db", "tracks").len().await, 1);
        assert!(clone.memory_collection("other", "tracks").is_empty().await);
    }

    #[tokio::test]
    async fn test_connector_hands_out_shared_client() {
        let store = MemoryStore::new();
        let client = store
            .connect(&MongoConfig::new("mongodb://localhost:27017", "db"))
            .await
            .unwrap();
        client.collection("db", "tracks").insert_one(doc! {}).await.unwrap();
        assert_eq!(store.memory_collection("db", "tracks").len().await, 1);
    }
}
