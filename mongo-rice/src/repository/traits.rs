//! Repository trait definition
//!
//! [`DocumentRepository`] uses RPITIT (Return Position Impl Trait In Traits), so implementors
//! write plain `async fn`s without `async_trait`.
//!
//! Every operation takes a [`CancellationToken`]. When it fires before the store replies, the
//! operation resolves to a `Cancelled` error and the in-flight round trip is abandoned.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::error::RepositoryError;
use super::pagination::PaginatedResult;
use crate::expression::{Filter, Sort};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// CRUD, filtering, sorting and pagination over one collection
///
/// # Type Parameters
///
/// - `D`: The stored document type filters and sorts are written against
/// - `E`: The entity type handed to and returned from callers
///
/// Not finding anything is never an error: lookups return `Option` and deletes of missing
/// documents succeed.
///
/// # Example
///
/// ```rust,ignore
/// use mongo_rice::repository::DocumentRepository;
/// use tokio_util::sync::CancellationToken;
///
/// let cancel = CancellationToken::new();
/// let song = repo.find_by_id("65a1b2c3d4e5f60718293a4b", &cancel).await?;
/// let jazz = repo
///     .find(Predicate::eq(Song::GENRE, "jazz").into(), None, &cancel)
///     .await?;
/// ```
pub trait DocumentRepository<D, E>: Send + Sync {
    /// Find a document by its id
    ///
    /// # Errors
    ///
    /// `MalformedId` when `id` is not a 24 character hex ObjectId.
    fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Find the first document matching `filter` in natural order
    fn find_one(
        &self,
        filter: Filter<D>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Find every document matching `filter`
    ///
    /// Without a sort, results are newest first (descending id) unless the repository was given
    /// a different [`crate::expression::SortResolver`].
    fn find(
        &self,
        filter: Filter<D>,
        sort: Option<Sort<D>>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Find every document in the collection
    fn find_all(
        &self,
        sort: Option<Sort<D>>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Find one page of the documents matching `filter`
    ///
    /// Pages are 1-indexed. A page past the end is empty but still reports the totals.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` when `page_number` or `page_size` is zero. No store call is made.
    fn find_page(
        &self,
        filter: Filter<D>,
        sort: Option<Sort<D>>,
        page_number: u64,
        page_size: u64,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<PaginatedResult<E>>> + Send;

    /// Insert one entity, returning it with its id
    fn insert_one(
        &self,
        entity: E,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Insert a batch of entities, returning them with their ids
    ///
    /// On error no entities are returned. Whether earlier documents of the batch stay written
    /// depends on the store.
    fn insert_many(
        &self,
        entities: Vec<E>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Replace the stored document with the entity's id
    ///
    /// Returns the document as stored afterwards, or `None` when nothing has that id (including
    /// an entity that was never stored).
    fn replace_one(
        &self,
        entity: E,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Delete a document by id; deleting a missing document succeeds
    ///
    /// # Errors
    ///
    /// `MalformedId` when `id` is not a 24 character hex ObjectId.
    fn delete_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Delete the first document matching `filter`, returning it
    fn delete_one(
        &self,
        filter: Filter<D>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<Option<E>>> + Send;

    /// Delete every document matching `filter`
    ///
    /// `Filter::All` empties the collection.
    fn delete_many(
        &self,
        filter: Filter<D>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;
}
