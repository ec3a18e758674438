//! Document store abstraction
//!
//! Repositories never talk to a driver directly. They are handed an
//! `Arc<dyn StoreCollection>` opened through a [`StoreConnector`] and a [`StoreClient`], which
//! keeps the engine independent of the concrete client and lets tests run against
//! [`MemoryStore`].
//!
//! # Implementations
//!
//! - [`MongoConnector`] (feature `mongodb`, enabled by default): the official MongoDB driver
//! - [`MemoryStore`]: an in-process store understanding the query and aggregation subset
//!   repositories emit

mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::config::MongoConfig;

pub use memory::{MemoryCollection, MemoryStore};
#[cfg(feature = "mongodb")]
pub use mongo::{MongoConnector, MongoStoreClient, MongoStoreCollection};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque failure reported by a store
///
/// The driver error, when there is one, is kept as the `source()`.
#[derive(Debug, Clone)]
pub struct StoreError {
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl StoreError {
    /// Create an error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a driver error, reusing its message
    pub fn from_source(source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// Options for [`StoreCollection::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort document
    pub sort: Option<Document>,
    /// Number of matching documents to skip
    pub skip: Option<u64>,
    /// Maximum number of documents to return
    pub limit: Option<i64>,
}

/// Opens a [`StoreClient`] from configuration
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connect using the connection string in `config`
    async fn connect(&self, config: &MongoConfig) -> StoreResult<Arc<dyn StoreClient>>;
}

/// A connected client that hands out collection handles
pub trait StoreClient: Send + Sync {
    /// Open the handle for `name` in `database`
    fn collection(&self, database: &str, name: &str) -> Arc<dyn StoreCollection>;
}

/// The primitives repositories compose, over raw BSON documents
#[async_trait]
pub trait StoreCollection: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// All documents matching `filter`, sorted then sliced by `options`
    async fn find(&self, filter: Document, options: FindOptions) -> StoreResult<Vec<Document>>;

    /// First document matching `filter` in natural order
    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>>;

    /// Run an aggregation pipeline
    async fn aggregate(&self, pipeline: Vec<Document>) -> StoreResult<Vec<Document>>;

    /// Insert one document, returning its `_id`
    async fn insert_one(&self, document: Document) -> StoreResult<Bson>;

    /// Insert a batch, returning the `_id`s in input order
    async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Bson>>;

    /// Replace the first match, returning the document as stored afterwards
    async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
    ) -> StoreResult<Option<Document>>;

    /// Delete the first match, returning it
    async fn find_one_and_delete(&self, filter: Document) -> StoreResult<Option<Document>>;

    /// Delete every match, returning how many were removed
    async fn delete_many(&self, filter: Document) -> StoreResult<u64>;
}

impl fmt::Debug for dyn StoreCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCollection")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset by peer")]
    struct DriverFailure;

    #[test]
    fn test_store_error_message() {
        let error = StoreError::new("collection is read only");
        assert_eq!(error.to_string(), "collection is read only");
        assert_eq!(error.message(), "collection is read only");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_store_error_keeps_source() {
        let error = StoreError::from_source(DriverFailure);
        assert_eq!(error.to_string(), "connection reset by peer");
        let source = error.source().expect("source is kept");
        assert!(source.downcast_ref::<DriverFailure>().is_some());
    }

    #[test]
    fn test_find_options_default() {
        let options = FindOptions::default();
        assert!(options.sort.is_none());
        assert!(options.skip.is_none());
        assert!(options.limit.is_none());
    }
}
