//! Repository error types
//!
//! Every failure surfaced by a repository carries the operation that was running, a
//! [`RepositoryErrorKind`] callers can branch on, and (where known) the collection and
//! document id involved. Store failures keep the driver error as their `source()`.
//!
//! # Example
//!
//! ```rust
//! use mongo_rice::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//!
//! let error = RepositoryError::malformed_id(RepositoryOperation::FindById, "not-an-id");
//! assert_eq!(error.kind, RepositoryErrorKind::MalformedId);
//! assert_eq!(error.entity_id.as_deref(), Some("not-an-id"));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::expression::ExpressionError;
use crate::store::StoreError;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Validating configuration and opening the collection
    Connect,
    /// Finding a single document by id
    FindById,
    /// Finding the first document matching a filter
    FindOne,
    /// Finding all documents matching a filter
    Find,
    /// Finding every document of the collection
    FindAll,
    /// Finding one page of documents
    FindPage,
    /// Inserting a single document
    InsertOne,
    /// Inserting a batch of documents
    InsertMany,
    /// Replacing a document by id
    ReplaceOne,
    /// Deleting a document by id
    DeleteById,
    /// Deleting the first document matching a filter
    DeleteOne,
    /// Deleting all documents matching a filter
    DeleteMany,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::FindById => write!(f, "find_by_id"),
            Self::FindOne => write!(f, "find_one"),
            Self::Find => write!(f, "find"),
            Self::FindAll => write!(f, "find_all"),
            Self::FindPage => write!(f, "find_page"),
            Self::InsertOne => write!(f, "insert_one"),
            Self::InsertMany => write!(f, "insert_many"),
            Self::ReplaceOne => write!(f, "replace_one"),
            Self::DeleteById => write!(f, "delete_by_id"),
            Self::DeleteOne => write!(f, "delete_one"),
            Self::DeleteMany => write!(f, "delete_many"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Missing or empty configuration value, or an empty collection binding
    Configuration,
    /// A selector did not reduce to a plain property access
    InvalidExpressionShape,
    /// An id string could not be parsed as an ObjectId
    MalformedId,
    /// Arguments rejected before reaching the store
    ValidationFailed,
    /// A document could not be encoded to or decoded from BSON
    Serialization,
    /// Failure reported by the underlying store
    Store,
    /// The caller's cancellation token fired before the store replied
    Cancelled,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::InvalidExpressionShape => write!(f, "invalid_expression_shape"),
            Self::MalformedId => write!(f, "malformed_id"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Serialization => write!(f, "serialization"),
            Self::Store => write!(f, "store"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use mongo_rice::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::cancelled(RepositoryOperation::Find).with_collection("songs");
/// assert!(error.is_cancelled());
/// assert_eq!(
///     error.to_string(),
///     "Repository cancelled error during find on songs: Operation cancelled by caller"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The collection the repository is bound to
    pub collection: Option<String>,
    /// The document id involved, as supplied by the caller
    pub entity_id: Option<String>,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            collection: None,
            entity_id: None,
            source: None,
        }
    }

    /// Create a configuration error raised while constructing a repository
    ///
    /// # Example
    ///
    /// ```rust
    /// use mongo_rice::repository::{RepositoryError, RepositoryErrorKind};
    ///
    /// let error = RepositoryError::configuration("database must not be empty");
    /// assert_eq!(error.kind, RepositoryErrorKind::Configuration);
    /// ```
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Connect,
            RepositoryErrorKind::Configuration,
            message,
        )
    }

    /// Create a malformed id error carrying the rejected id
    pub fn malformed_id(operation: RepositoryOperation, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("'{id}' is not a valid 24 character hex ObjectId"),
            entity_id: Some(id),
            ..Self::new(operation, RepositoryErrorKind::MalformedId, String::new())
        }
    }

    /// Create a validation error for arguments rejected before any store call
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a serialization error from a BSON encode or decode failure
    pub fn serialization(
        operation: RepositoryOperation,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Serialization,
            source.to_string(),
        )
        .with_source(source)
    }

    /// Wrap a store failure, keeping it as the error source
    pub fn store(operation: RepositoryOperation, source: StoreError) -> Self {
        Self::new(operation, RepositoryErrorKind::Store, source.to_string()).with_source(source)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "Operation cancelled by caller",
        )
    }

    /// Wrap a selector resolution failure
    pub fn expression(operation: RepositoryOperation, source: ExpressionError) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::InvalidExpressionShape,
            source.to_string(),
        )
        .with_source(source)
    }

    /// Attach the collection name
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Attach the id the caller supplied
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Whether the caller's cancellation token ended the operation
    pub fn is_cancelled(&self) -> bool {
        self.kind == RepositoryErrorKind::Cancelled
    }

    /// Whether the failure was reported by the underlying store
    pub fn is_store_error(&self) -> bool {
        self.kind == RepositoryErrorKind::Store
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Repository {} error during {}", self.kind, self.operation)?;
        if let Some(collection) = &self.collection {
            write!(f, " on {collection}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(entity_id) = &self.entity_id {
            write!(f, " [id: {entity_id}]")?;
        }
        Ok(())
    }
}

impl StdError for RepositoryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

impl From<ExpressionError> for RepositoryError {
    fn from(err: ExpressionError) -> Self {
        Self::expression(RepositoryOperation::Find, err)
    }
}
