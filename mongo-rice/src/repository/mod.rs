//! Generic repository over a document collection
//!
//! This module provides the repository engine for CRUD, filtering, sorting and pagination of
//! stored documents, with optional mapping to a separate entity type.
//!
//! # Features
//!
//! - **Generic CRUD**: [`DocumentRepository`] trait implemented by [`RiceRepository`]
//! - **Pagination**: [`PaginatedResult`] pages fetched with a single two-facet aggregation
//! - **Mapping**: [`DocumentMapper`] between stored documents and caller-facing entities, with
//!   [`BoundMapper`] field bindings so entity predicates can filter stored documents
//! - **Cancellation**: every operation races the store against a `CancellationToken`
//! - **Structured errors**: [`RepositoryError`] with the operation and collection involved
//!
//! # Example
//!
//! ```rust,ignore
//! use mongo_rice::expression::{Predicate, SortOptions};
//! use mongo_rice::repository::{DocumentRepository, RiceRepository};
//!
//! let repo: RiceRepository<Song> = RiceRepository::connect(&config.mongo).await?;
//! let page = repo
//!     .find_page(
//!         Predicate::eq(Song::GENRE, "jazz").into(),
//!         Some(SortOptions::ascending(Song::TITLE).into()),
//!         2,
//!         25,
//!         &cancel,
//!     )
//!     .await?;
//! println!("page {} of {}", page.page_number, page.total_pages);
//! ```

mod engine;
mod error;
mod mapper;
mod pagination;
mod traits;


// Re-export all public types
pub use engine::RiceRepository;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use mapper::{
    convert_filter, convert_predicate, BoundMapper, DocumentMapper, FnMapper, IdentityMapper,
    IntoMapper,
};
pub use pagination::{
    build_page_pipeline, calculate_total_pages, PaginatedResult, Pagination, COUNT_FACET,
    DATA_FACET,
};
pub use traits::{DocumentRepository, RepositoryResult};
