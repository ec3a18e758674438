//! Repository engine over a [`StoreCollection`]

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use tokio_util::sync::CancellationToken;

use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::mapper::{convert_filter, DocumentMapper, IdentityMapper};
use super::pagination::{build_page_pipeline, parse_page_facet, PaginatedResult, Pagination};
use super::traits::{DocumentRepository, RepositoryResult};
use crate::config::MongoConfig;
use crate::document::{collection_name, CollectionDocument};
use crate::expression::{
    DefaultSortResolver, ExpressionError, Filter, Predicate, Sort, SortResolver,
};
use crate::store::{
    FindOptions, StoreClient, StoreCollection, StoreConnector, StoreError, StoreResult,
};

/// Repository for documents of type `D`, handing out entities of type `E`
///
/// Holds only read-only state after construction, so one instance can be shared across tasks
/// behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use bson::oid::ObjectId;
/// use mongo_rice::config::MongoConfig;
/// use mongo_rice::repository::{DocumentRepository, IdentityMapper, RiceRepository};
/// use mongo_rice::store::MemoryStore;
/// use mongo_rice::CollectionDocument;
/// use serde::{Deserialize, Serialize};
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct Song {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     id: Option<ObjectId>,
///     title: String,
/// }
///
/// impl CollectionDocument for Song {
///     const COLLECTION: &'static str = "songs";
///     fn id(&self) -> Option<ObjectId> { self.id }
///     fn set_id(&mut self, id: ObjectId) { self.id = Some(id); }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MongoConfig::new("mongodb://localhost:27017", "music");
/// let repo: RiceRepository<Song> =
///     RiceRepository::connect_with(&config, &MemoryStore::new(), IdentityMapper).await?;
///
/// let cancel = CancellationToken::new();
/// let song = repo
///     .insert_one(Song { id: None, title: "All Blues".into() }, &cancel)
///     .await?;
/// let id = song.id.expect("inserted songs have an id").to_hex();
/// assert!(repo.find_by_id(&id, &cancel).await?.is_some());
/// # Ok(())
/// # }
/// ```
pub struct RiceRepository<D, E = D, M = IdentityMapper> {
    collection: Arc<dyn StoreCollection>,
    name: &'static str,
    mapper: M,
    sort_resolver: Arc<dyn SortResolver<D>>,
    _entity: PhantomData<fn() -> E>,
}

#[cfg(feature = "mongodb")]
impl<D: CollectionDocument> RiceRepository<D> {
    /// Connect to MongoDB and open the collection bound to `D`
    ///
    /// # Errors
    ///
    /// `Configuration` for an invalid configuration or collection binding (no connection is
    /// attempted), `Store` when the driver rejects the connection string.
    pub async fn connect(config: &MongoConfig) -> RepositoryResult<Self> {
        Self::connect_with(config, &crate::store::MongoConnector, IdentityMapper).await
    }
}

impl<D, E, M> RiceRepository<D, E, M>
where
    D: CollectionDocument,
    E: Send + 'static,
    M: DocumentMapper<D, E>,
{
    /// Validate `config`, resolve the collection binding, connect through `connector` and open
    /// the collection
    ///
    /// # Errors
    ///
    /// `Configuration` when validation or binding fails, in which case `connector` is never
    /// called. `Store` when connecting fails.
    pub async fn connect_with(
        config: &MongoConfig,
        connector: &dyn StoreConnector,
        mapper: M,
    ) -> RepositoryResult<Self> {
        config.validate()?;
        let name = collection_name::<D>()?;
        let client = connector.connect(config).await.map_err(|e| {
            RepositoryError::store(RepositoryOperation::Connect, e).with_collection(name)
        })?;
        Ok(Self::open(client.as_ref(), &config.database, name, mapper))
    }

    /// Open the collection bound to `D` on an already connected client
    ///
    /// # Errors
    ///
    /// `Configuration` when validation or binding fails.
    pub fn from_client(
        client: &dyn StoreClient,
        config: &MongoConfig,
        mapper: M,
    ) -> RepositoryResult<Self> {
        config.validate()?;
        let name = collection_name::<D>()?;
        Ok(Self::open(client, &config.database, name, mapper))
    }

    fn open(client: &dyn StoreClient, database: &str, name: &'static str, mapper: M) -> Self {
        tracing::info!(database = %database, collection = %name, "Repository opened");
        Self {
            collection: client.collection(database, name),
            name,
            mapper,
            sort_resolver: Arc::new(DefaultSortResolver),
            _entity: PhantomData,
        }
    }

    /// Replace the strategy deciding the order of sorted reads
    #[must_use]
    pub fn with_sort_resolver(mut self, resolver: impl SortResolver<D> + 'static) -> Self {
        self.sort_resolver = Arc::new(resolver);
        self
    }

    /// The collection this repository is bound to
    pub fn collection_name(&self) -> &'static str {
        self.name
    }

    /// The mapper converting documents to entities
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Filter for the stored documents matching a predicate written against entities
    ///
    /// # Errors
    ///
    /// [`ExpressionError::InvalidExpressionShape`] when the mapper has no binding for a
    /// property the predicate uses.
    pub fn entity_filter(&self, predicate: &Predicate<E>) -> Result<Filter<D>, ExpressionError> {
        convert_filter(&self.mapper, predicate)
    }

    /// Race a store call against the caller's cancellation token
    async fn run<T>(
        &self,
        operation: RepositoryOperation,
        cancel: &CancellationToken,
        call: impl Future<Output = StoreResult<T>>,
    ) -> RepositoryResult<T> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(collection = %self.name, %operation, "Operation cancelled");
                Err(RepositoryError::cancelled(operation).with_collection(self.name))
            }
            result = call => result.map_err(|e| self.store_error(operation, e)),
        }
    }

    fn store_error(&self, operation: RepositoryOperation, error: StoreError) -> RepositoryError {
        tracing::warn!(collection = %self.name, %operation, error = %error, "Store operation failed");
        RepositoryError::store(operation, error).with_collection(self.name)
    }

    fn parse_id(&self, operation: RepositoryOperation, id: &str) -> RepositoryResult<ObjectId> {
        ObjectId::parse_str(id)
            .map_err(|_| RepositoryError::malformed_id(operation, id).with_collection(self.name))
    }

    fn filter_document(
        &self,
        operation: RepositoryOperation,
        filter: &Filter<D>,
    ) -> RepositoryResult<Document> {
        filter.to_document().map_err(|e| {
            RepositoryError::expression(operation, e).with_collection(self.name)
        })
    }

    fn sort_document(
        &self,
        operation: RepositoryOperation,
        sort: Option<&Sort<D>>,
    ) -> RepositoryResult<Document> {
        self.sort_resolver.resolve(sort).map_err(|e| {
            RepositoryError::expression(operation, e).with_collection(self.name)
        })
    }

    fn decode(&self, operation: RepositoryOperation, document: Document) -> RepositoryResult<E> {
        bson::from_document::<D>(document)
            .map(|document| self.mapper.to_entity(document))
            .map_err(|e| RepositoryError::serialization(operation, e).with_collection(self.name))
    }

    fn decode_all(
        &self,
        operation: RepositoryOperation,
        documents: Vec<Document>,
    ) -> RepositoryResult<Vec<E>> {
        documents
            .into_iter()
            .map(|document| self.decode(operation, document))
            .collect()
    }

    /// Encode for writing; a null `_id` is dropped so the store generates one
    fn encode(&self, operation: RepositoryOperation, document: &D) -> RepositoryResult<Document> {
        let mut encoded = bson::to_document(document)
            .map_err(|e| RepositoryError::serialization(operation, e).with_collection(self.name))?;
        if matches!(encoded.get("_id"), Some(Bson::Null)) {
            encoded.remove("_id");
        }
        Ok(encoded)
    }

    fn assign_id(
        &self,
        operation: RepositoryOperation,
        document: &mut D,
        id: Bson,
    ) -> RepositoryResult<()> {
        match id {
            Bson::ObjectId(id) => {
                document.set_id(id);
                Ok(())
            }
            other => Err(RepositoryError::new(
                operation,
                RepositoryErrorKind::Serialization,
                format!("store assigned a non-ObjectId id {other}"),
            )
            .with_collection(self.name)),
        }
    }

    async fn find_sorted(
        &self,
        operation: RepositoryOperation,
        filter: Filter<D>,
        sort: Option<Sort<D>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        let filter = self.filter_document(operation, &filter)?;
        let sort = self.sort_document(operation, sort.as_ref())?;
        tracing::debug!(collection = %self.name, %operation, filter = %filter, sort = %sort, "Finding documents");
        let options = FindOptions {
            sort: Some(sort),
            ..FindOptions::default()
        };
        let documents = self
            .run(operation, cancel, self.collection.find(filter, options))
            .await?;
        self.decode_all(operation, documents)
    }
}

impl<D, E, M> DocumentRepository<D, E> for RiceRepository<D, E, M>
where
    D: CollectionDocument,
    E: Send + 'static,
    M: DocumentMapper<D, E>,
{
    async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        let operation = RepositoryOperation::FindById;
        let oid = self.parse_id(operation, id)?;
        tracing::debug!(collection = %self.name, id = %oid, "Finding document by id");
        let found = self
            .run(operation, cancel, self.collection.find_one(doc! { "_id": oid }))
            .await?;
        found.map(|document| self.decode(operation, document)).transpose()
    }

    async fn find_one(
        &self,
        filter: Filter<D>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        let operation = RepositoryOperation::FindOne;
        let filter = self.filter_document(operation, &filter)?;
        tracing::debug!(collection = %self.name, filter = %filter, "Finding first matching document");
        let found = self
            .run(operation, cancel, self.collection.find_one(filter))
            .await?;
        found.map(|document| self.decode(operation, document)).transpose()
    }

    async fn find(
        &self,
        filter: Filter<D>,
        sort: Option<Sort<D>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        self.find_sorted(RepositoryOperation::Find, filter, sort, cancel)
            .await
    }

    async fn find_all(
        &self,
        sort: Option<Sort<D>>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        self.find_sorted(RepositoryOperation::FindAll, Filter::All, sort, cancel)
            .await
    }

    async fn find_page(
        &self,
        filter: Filter<D>,
        sort: Option<Sort<D>>,
        page_number: u64,
        page_size: u64,
        cancel: &CancellationToken,
    ) -> RepositoryResult<PaginatedResult<E>> {
        let operation = RepositoryOperation::FindPage;
        if page_number < 1 {
            return Err(RepositoryError::validation_failed(
                operation,
                format!("page number must be at least 1, got {page_number}"),
            )
            .with_collection(self.name));
        }
        if page_size < 1 {
            return Err(RepositoryError::validation_failed(
                operation,
                format!("page size must be at least 1, got {page_size}"),
            )
            .with_collection(self.name));
        }

        let filter = self.filter_document(operation, &filter)?;
        let sort = self.sort_document(operation, sort.as_ref())?;
        let pipeline = build_page_pipeline(filter, sort, &Pagination::page(page_number, page_size));
        tracing::debug!(collection = %self.name, page_number, page_size, "Finding page");

        let output = self
            .run(operation, cancel, self.collection.aggregate(pipeline))
            .await?;
        let (total_count, documents) = parse_page_facet(output)
            .map_err(|message| self.store_error(operation, StoreError::new(message)))?;
        let items = self.decode_all(operation, documents)?;
        Ok(PaginatedResult::new(items, total_count, page_number, page_size))
    }

    async fn insert_one(&self, entity: E, cancel: &CancellationToken) -> RepositoryResult<E> {
        let operation = RepositoryOperation::InsertOne;
        let mut document = self.mapper.to_document(entity);
        let encoded = self.encode(operation, &document)?;
        let id = self
            .run(operation, cancel, self.collection.insert_one(encoded))
            .await?;
        tracing::debug!(collection = %self.name, id = %id, "Document inserted");
        self.assign_id(operation, &mut document, id)?;
        Ok(self.mapper.to_entity(document))
    }

    async fn insert_many(
        &self,
        entities: Vec<E>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Vec<E>> {
        let operation = RepositoryOperation::InsertMany;
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let mut documents: Vec<D> = entities
            .into_iter()
            .map(|entity| self.mapper.to_document(entity))
            .collect();
        let encoded = documents
            .iter()
            .map(|document| self.encode(operation, document))
            .collect::<RepositoryResult<Vec<_>>>()?;

        let ids = self
            .run(operation, cancel, self.collection.insert_many(encoded))
            .await?;
        if ids.len() != documents.len() {
            return Err(self.store_error(
                operation,
                StoreError::new(format!(
                    "store acknowledged {} of {} inserted documents",
                    ids.len(),
                    documents.len()
                )),
            ));
        }
        tracing::debug!(collection = %self.name, count = ids.len(), "Documents inserted");

        for (document, id) in documents.iter_mut().zip(ids) {
            self.assign_id(operation, document, id)?;
        }
        Ok(documents
            .into_iter()
            .map(|document| self.mapper.to_entity(document))
            .collect())
    }

    async fn replace_one(
        &self,
        entity: E,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        let operation = RepositoryOperation::ReplaceOne;
        let document = self.mapper.to_document(entity);
        let Some(id) = document.id() else {
            tracing::debug!(collection = %self.name, "Replace skipped for a document without id");
            return Ok(None);
        };
        let mut replacement = self.encode(operation, &document)?;
        replacement.remove("_id");

        let replaced = self
            .run(
                operation,
                cancel,
                self.collection
                    .find_one_and_replace(doc! { "_id": id }, replacement),
            )
            .await?;
        tracing::debug!(collection = %self.name, id = %id, found = replaced.is_some(), "Replace finished");
        replaced
            .map(|document| self.decode(operation, document))
            .transpose()
    }

    async fn delete_by_id(&self, id: &str, cancel: &CancellationToken) -> RepositoryResult<()> {
        let operation = RepositoryOperation::DeleteById;
        let oid = self.parse_id(operation, id)?;
        let deleted = self
            .run(operation, cancel, self.collection.delete_many(doc! { "_id": oid }))
            .await?;
        tracing::debug!(collection = %self.name, id = %oid, deleted, "Delete by id finished");
        Ok(())
    }

    async fn delete_one(
        &self,
        filter: Filter<D>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<Option<E>> {
        let operation = RepositoryOperation::DeleteOne;
        let filter = self.filter_document(operation, &filter)?;
        let removed = self
            .run(operation, cancel, self.collection.find_one_and_delete(filter))
            .await?;
        tracing::debug!(collection = %self.name, found = removed.is_some(), "Delete one finished");
        removed
            .map(|document| self.decode(operation, document))
            .transpose()
    }

    async fn delete_many(
        &self,
        filter: Filter<D>,
        cancel: &CancellationToken,
    ) -> RepositoryResult<()> {
        let operation = RepositoryOperation::DeleteMany;
        if filter.is_all() {
            tracing::warn!(collection = %self.name, "Deleting every document in the collection");
        }
        let filter = self.filter_document(operation, &filter)?;
        let deleted = self
            .run(operation, cancel, self.collection.delete_many(filter))
            .await?;
        tracing::debug!(collection = %self.name, deleted, "Delete many finished");
        Ok(())
    }
}

impl<D, E, M: fmt::Debug> fmt::Debug for RiceRepository<D, E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiceRepository")
            .field("collection", &self.name)
            .field("mapper", &self.mapper)
            .finish_non_exhaustive()
    }
}
