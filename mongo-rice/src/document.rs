//! Stored document types and their collection binding
//!
//! # Example
//!
//! ```rust
//! use bson::oid::ObjectId;
//! use mongo_rice::CollectionDocument;
//! use mongo_rice::expression::Field;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Song {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     id: Option<ObjectId>,
//!     title: String,
//! }
//!
//! impl Song {
//!     const TITLE: Field<Song> = Field::new("title");
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
//! let mut song = Song { id: None, title: "Freddie Freeloader".into() };
//! assert!(song.created_at().is_none());
//! song.set_id(ObjectId::new());
//! assert!(song.created_at().is_some());
//! assert_eq!(Song::ID.element(), "_id");
//! ```

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::expression::Field;
use crate::repository::{RepositoryError, RepositoryResult};

/// A document persisted in a named collection
///
/// The id is stored as `_id`. It is `None` until the first insert, after which the store's
/// generated value is written back through [`CollectionDocument::set_id`].
pub trait CollectionDocument: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the collection documents of this type live in
    const COLLECTION: &'static str;

    /// The id property, stored under `_id`
    const ID: Field<Self> = Field::renamed("id", "_id");

    /// The document's id, if it has been stored
    fn id(&self) -> Option<ObjectId>;

    /// Record the id assigned by the store
    fn set_id(&mut self, id: ObjectId);

    /// Creation time encoded in the id
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.id().map(|id| id.timestamp().to_chrono())
    }
}

/// The collection name bound to `D`, checked for use
///
/// # Errors
///
/// A `Configuration` error when the name is blank or contains characters MongoDB does not allow
/// in collection names.
pub fn collection_name<D: CollectionDocument>() -> RepositoryResult<&'static str> {
    let name = D::COLLECTION;
    if name.trim().is_empty() {
        return Err(RepositoryError::configuration(format!(
            "{} has an empty collection name",
            std::any::type_name::<D>()
        )));
    }
    if name.contains('$') || name.contains('\0') || name.starts_with("system.") {
        return Err(RepositoryError::configuration(format!(
            "'{name}' is not a valid collection name"
        ))
        .with_collection(name));
    }
    Ok(name)
}
