//! Store adapter over the official MongoDB driver

use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use tracing::{debug, info};

use super::{FindOptions, StoreClient, StoreCollection, StoreConnector, StoreError, StoreResult};
use crate::config::MongoConfig;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::from_source(err)
    }
}

/// Connects through [`Client::with_uri_str`]
///
/// The driver connects lazily, so an unreachable server surfaces on the first operation rather
/// than here. A malformed connection string fails immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self, config: &MongoConfig) -> StoreResult<Arc<dyn StoreClient>> {
        let client = Client::with_uri_str(&config.connection_string).await?;
        info!(database = %config.database, "MongoDB client created");
        Ok(Arc::new(MongoStoreClient::new(client)))
    }
}

/// A connected [`Client`]
#[derive(Debug, Clone)]
pub struct MongoStoreClient {
    client: Client,
}

impl MongoStoreClient {
    /// Wrap an existing driver client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying driver client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl StoreClient for MongoStoreClient {
    fn collection(&self, database: &str, name: &str) -> Arc<dyn StoreCollection> {
        Arc::new(MongoStoreCollection::new(
            self.client.database(database).collection::<Document>(name),
        ))
    }
}

/// A driver collection handle over raw documents
#[derive(Debug, Clone)]
pub struct MongoStoreCollection {
    inner: Collection<Document>,
}

impl MongoStoreCollection {
    /// Wrap a driver collection
    pub fn new(inner: Collection<Document>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StoreCollection for MongoStoreCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>> {
        let mut action = self.inner.find(filter);
        if let Some(sort) = options.sort {
            action = action.sort(sort);
        }
        if let Some(skip) = options.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = options.limit {
            action = action.limit(limit);
        }
        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        Ok(self.inner.find_one(filter).await?)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<Vec<Document>> {
        debug!(collection = %self.inner.name(), stages = pipeline.len(), "Running aggregation");
        let cursor = self.inner.aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        Ok(self.inner.insert_one(document).await?.inserted_id)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Bson>> {
        let result = self.inner.insert_many(documents).await?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .inner
            .find_one_and_replace(filter, replacement)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn find_one_and_delete(&self, filter: Document) -> StoreResult<Option<Document>> {
        Ok(self.inner.find_one_and_delete(filter).await?)
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.inner.delete_many(filter).await?.deleted_count)
    }
}
