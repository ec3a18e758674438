//! Sort options and the default sort policy

use std::fmt;

use bson::{doc, Document};

use super::selector::{resolve_element_name, IntoPropertySelector, PropertySelector};
use super::ExpressionError;

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use mongo_rice::expression::SortDirection;
///
/// assert_eq!(format!("{}", SortDirection::Ascending), "asc");
/// assert_eq!(SortDirection::Descending.as_i32(), -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl SortDirection {
    /// The value used in a MongoDB sort document
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Sort by a single property of `D`
pub struct SortOptions<D> {
    /// Property to sort on
    pub selector: PropertySelector<D>,
    /// Sort direction
    pub direction: SortDirection,
}

impl<D> SortOptions<D> {
    /// Sort by `selector` in `direction`
    pub fn new(
        selector: impl IntoPropertySelector<Document = D>,
        direction: SortDirection,
    ) -> Self {
        Self {
            selector: selector.into_property_selector(),
            direction,
        }
    }

    /// Sort ascending by `selector`
    pub fn ascending(selector: impl IntoPropertySelector<Document = D>) -> Self {
        Self::new(selector, SortDirection::Ascending)
    }

    /// Sort descending by `selector`
    pub fn descending(selector: impl IntoPropertySelector<Document = D>) -> Self {
        Self::new(selector, SortDirection::Descending)
    }

    /// Build the native sort document: `{ <element>: 1 }` or `{ <element>: -1 }`
    ///
    /// # Errors
    ///
    /// [`ExpressionError::InvalidExpressionShape`] if the selector is not a property access.
    pub fn build_sort_definition(&self) -> Result<Document, ExpressionError> {
        let element = resolve_element_name(&self.selector)?;
        Ok(doc! { element: self.direction.as_i32() })
    }
}

impl<D> Clone for SortOptions<D> {
    fn clone(&self) -> Self {
        Self {
            selector: self.selector.clone(),
            direction: self.direction,
        }
    }
}

impl<D> fmt::Debug for SortOptions<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortOptions")
            .field("selector", &self.selector)
            .field("direction", &self.direction)
            .finish()
    }
}

/// How results are ordered
pub enum Sort<D> {
    /// A sort document in MongoDB syntax
    Native(Document),
    /// A typed single-property sort
    Options(SortOptions<D>),
}

impl<D> Sort<D> {
    /// Render as a MongoDB sort document
    ///
    /// # Errors
    ///
    /// Propagates selector resolution failures.
    pub fn to_document(&self) -> Result<Document, ExpressionError> {
        match self {
            Self::Native(document) => Ok(document.clone()),
            Self::Options(options) => options.build_sort_definition(),
        }
    }
}

impl<D> Clone for Sort<D> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(document) => Self::Native(document.clone()),
            Self::Options(options) => Self::Options(options.clone()),
        }
    }
}

impl<D> fmt::Debug for Sort<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(document) => f.debug_tuple("Native").field(document).finish(),
            Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
        }
    }
}

impl<D> From<Document> for Sort<D> {
    fn from(document: Document) -> Self {
        Self::Native(document)
    }
}

impl<D> From<SortOptions<D>> for Sort<D> {
    fn from(options: SortOptions<D>) -> Self {
        Self::Options(options)
    }
}

/// Strategy producing the sort document for an operation
///
/// Repositories call this for every sorted read, so an implementation decides what happens
/// when the caller gives no sort.
pub trait SortResolver<D>: Send + Sync {
    /// Resolve the caller's sort, or the default when `None`
    fn resolve(&self, sort: Option<&Sort<D>>) -> Result<Document, ExpressionError>;
}

/// Newest first: descending `_id` unless the caller sorts explicitly
///
/// An empty native sort document counts as no sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSortResolver;

impl DefaultSortResolver {
    /// The sort applied when none is given
    pub fn default_sort() -> Document {
        doc! { "_id": -1 }
    }
}

impl<D> SortResolver<D> for DefaultSortResolver {
    fn resolve(&self, sort: Option<&Sort<D>>) -> Result<Document, ExpressionError> {
        let resolved = match sort {
            Some(sort) => sort.to_document()?,
            None => Self::default_sort(),
        };
        // An empty sort document is not a valid `$sort` stage
        if resolved.is_empty() {
            return Ok(Self::default_sort());
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Field;

    struct Order;

    impl Order {
        const ID: Field<Order> = Field::renamed("id", "_id");
        const PLACED_AT: Field<Order> = Field::new("placed_at");
        const CUSTOMER: Field<Order> = Field::new("customer");
    }

    #[test]
    fn test_sort_direction_display() {
        assert_eq!(format!("{}", SortDirection::Ascending), "asc");
        assert_eq!(format!("{}", SortDirection::Descending), "desc");
    }

    #[test]
    fn test_sort_direction_default() {
        assert_eq!(SortDirection::default(), SortDirection::Ascending);
    }

    #[test]
    fn test_ascending_definition() {
        let options = SortOptions::ascending(Order::PLACED_AT);
        assert_eq!(options.build_sort_definition().unwrap(), doc! { "placed_at": 1 });
    }

    #[test]
    fn test_descending_definition_uses_element_name() {
        let options = SortOptions::descending(Order::ID);
        assert_eq!(options.build_sort_definition().unwrap(), doc! { "_id": -1 });
    }

    #[test]
    fn test_converted_selector_sorts_by_member() {
        let options = SortOptions::ascending(Order::PLACED_AT.convert());
        assert_eq!(options.build_sort_definition().unwrap(), doc! { "placed_at": 1 });
    }

    #[test]
    fn test_method_call_selector_is_rejected() {
        let options = SortOptions::ascending(Order::CUSTOMER.call("trim"));
        assert!(matches!(
            options.build_sort_definition(),
            Err(ExpressionError::InvalidExpressionShape { .. })
        ));
    }

    #[test]
    fn test_default_resolver_without_sort() {
        let resolved = SortResolver::<Order>::resolve(&DefaultSortResolver, None).unwrap();
        assert_eq!(resolved, doc! { "_id": -1 });
    }

    #[test]
    fn test_default_resolver_keeps_explicit_sort() {
        let sort: Sort<Order> = SortOptions::ascending(Order::CUSTOMER).into();
        let resolved = DefaultSortResolver.resolve(Some(&sort)).unwrap();
        assert_eq!(resolved, doc! { "customer": 1 });

        let native: Sort<Order> = doc! { "customer": -1, "_id": 1 }.into();
        let resolved = DefaultSortResolver.resolve(Some(&native)).unwrap();
        assert_eq!(resolved, doc! { "customer": -1, "_id": 1 });
    }

    #[test]
    fn test_default_resolver_replaces_empty_native_sort() {
        let empty: Sort<Order> = Document::new().into();
        let resolved = DefaultSortResolver.resolve(Some(&empty)).unwrap();
        assert_eq!(resolved, DefaultSortResolver::default_sort());
    }
}
