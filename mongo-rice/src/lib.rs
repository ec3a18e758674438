//! # mongo-rice
//!
//! Generic async repository over MongoDB collections.
//!
//! Declare a document type once, bind it to a collection, and get CRUD, typed filtering and
//! sorting, and single round-trip pagination without writing query plumbing per type.
//!
//! ## Features
//!
//! - **Generic CRUD**: find, insert, replace and delete through [`repository::DocumentRepository`]
//! - **Typed expressions**: [`expression::Predicate`] and [`expression::SortOptions`] built from
//!   [`expression::Field`] constants, with raw BSON documents accepted everywhere as well
//! - **Pagination**: one `$facet` aggregation returns the page and the total count together
//! - **Entity mapping**: repositories can hand out a caller-facing type instead of the stored one
//! - **Cancellation**: every operation takes a `CancellationToken`
//! - **Pluggable store**: the MongoDB driver by default, or the in-memory [`store::MemoryStore`]
//! - **Configuration**: TOML files and `MONGO_RICE_` environment variables via figment
//!
//! ## Example
//!
//! ```rust,no_run
//! use bson::oid::ObjectId;
//! use mongo_rice::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Song {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     id: Option<ObjectId>,
//!     title: String,
//!     genre: String,
//! }
//!
//! impl Song {
//!     const TITLE: Field<Song> = Field::new("title");
//!     const GENRE: Field<Song> = Field::new("genre");
//! }
//!
//! impl CollectionDocument for Song {
//!     const COLLECTION: &'static str = "songs";
//!
//!     fn id(&self) -> Option<ObjectId> {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: ObjectId) {
//!         self.id = Some(id);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config.logging)?;
//!
//!     let rice = Rice::builder().config(config.mongo).build().await?;
//!     let songs = rice.repository::<Song>()?;
//!
//!     let cancel = CancellationToken::new();
//!     let page = songs
//!         .find_page(
//!             Predicate::eq(Song::GENRE, "jazz").into(),
//!             Some(SortOptions::ascending(Song::TITLE).into()),
//!             1,
//!             20,
//!             &cancel,
//!         )
//!         .await?;
//!     tracing::info!(total = page.total_count, "Loaded first page");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod expression;
pub mod observability;
pub mod registry;
pub mod repository;
pub mod store;

pub use config::{Config, LoggingConfig, MongoConfig};
pub use document::CollectionDocument;
pub use error::{Error, Result};
pub use registry::{Rice, RiceBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, LoggingConfig, MongoConfig};
    pub use crate::document::CollectionDocument;
    pub use crate::error::{Error, Result};
    pub use crate::expression::{
        DefaultSortResolver, Field, Filter, FilterOperator, FilterValue, Predicate,
        PropertySelector, Sort, SortDirection, SortOptions, SortResolver,
    };
    pub use crate::observability::init_tracing;
    pub use crate::registry::{Rice, RiceBuilder};
    pub use crate::repository::{
        BoundMapper, DocumentMapper, DocumentRepository, FnMapper, IdentityMapper, IntoMapper,
        PaginatedResult, RepositoryError, RepositoryErrorKind, RepositoryOperation,
        RepositoryResult, RiceRepository,
    };
    pub use crate::store::MemoryStore;

    pub use tokio_util::sync::CancellationToken;
}
