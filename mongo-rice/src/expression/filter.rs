//! Which documents an operation applies to

use std::fmt;

use bson::Document;

use super::{ExpressionError, Predicate};

/// Which documents an operation applies to
///
/// `Filter::All` is also what an absent filter means. Native documents are passed to the store
/// as they are; predicates are rendered on use.
pub enum Filter<D> {
    /// Every document in the collection
    All,
    /// A query document in MongoDB syntax
    Native(Document),
    /// A typed predicate over document properties
    Predicate(Predicate<D>),
}

impl<D> Filter<D> {
    /// Render as a MongoDB query document
    ///
    /// # Errors
    ///
    /// Propagates selector resolution failures from a predicate.
    pub fn to_document(&self) -> Result<Document, ExpressionError> {
        match self {
            Self::All => Ok(Document::new()),
            Self::Native(document) => Ok(document.clone()),
            Self::Predicate(predicate) => predicate.to_filter(),
        }
    }

    /// Whether this filter matches the whole collection
    pub fn is_all(&self) -> bool {
        match self {
            Self::All => true,
            Self::Native(document) => document.is_empty(),
            Self::Predicate(_) => false,
        }
    }
}

impl<D> Default for Filter<D> {
    fn default() -> Self {
        Self::All
    }
}

impl<D> Clone for Filter<D> {
    fn clone(&self) -> Self {
        match self {
            Self::All => Self::All,
            Self::Native(document) => Self::Native(document.clone()),
            Self::Predicate(predicate) => Self::Predicate(predicate.clone()),
        }
    }
}

impl<D> fmt::Debug for Filter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Native(document) => f.debug_tuple("Native").field(document).finish(),
            Self::Predicate(predicate) => f.debug_tuple("Predicate").field(predicate).finish(),
        }
    }
}

impl<D> From<Document> for Filter<D> {
    fn from(document: Document) -> Self {
        Self::Native(document)
    }
}

impl<D> From<Predicate<D>> for Filter<D> {
    fn from(predicate: Predicate<D>) -> Self {
        Self::Predicate(predicate)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::expression::Field;

    struct Invoice;

    impl Invoice {
        const TOTAL: Field<Invoice> = Field::new("total");
    }

    #[test]
    fn test_all_renders_empty_document() {
        let filter: Filter<Invoice> = Filter::All;
        assert_eq!(filter.to_document().unwrap(), Document::new());
        assert!(filter.is_all());
    }

    #[test]
    fn test_native_passes_through() {
        let filter: Filter<Invoice> = doc! { "status": "open" }.into();
        assert_eq!(filter.to_document().unwrap(), doc! { "status": "open" });
        assert!(!filter.is_all());
    }

    #[test]
    fn test_empty_native_counts_as_all() {
        let filter: Filter<Invoice> = Document::new().into();
        assert!(filter.is_all());
    }

    #[test]
    fn test_predicate_is_rendered() {
        let filter: Filter<Invoice> = Predicate::gt(Invoice::TOTAL, 100).into();
        assert_eq!(
            filter.to_document().unwrap(),
            doc! { "total": { "$gt": 100_i64 } }
        );
        assert!(!filter.is_all());
    }

    #[test]
    fn test_default_is_all() {
        assert!(matches!(Filter::<Invoice>::default(), Filter::All));
    }
}
