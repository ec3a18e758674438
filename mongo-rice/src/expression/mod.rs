//! Filter and sort resolution
//!
//! Translates typed property selectors, predicates and sort options into the native BSON
//! filter and sort documents the store understands.
//!
//! # Features
//!
//! - **Selectors**: [`Field`] constants and [`PropertySelector`] expressions, resolved to
//!   property names by [`resolve_property_name`]
//! - **Predicates**: [`Predicate`] for typed boolean conditions over document properties
//! - **Filters**: [`Filter`] accepting either a predicate or a native query document
//! - **Sorting**: [`SortOptions`] and [`Sort`], with the default policy behind [`SortResolver`]
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use mongo_rice::expression::{Field, Filter, Predicate, Sort, SortOptions};
//!
//! struct Book;
//!
//! impl Book {
//!     const AUTHOR: Field<Book> = Field::new("author");
//!     const PUBLISHED: Field<Book> = Field::new("published");
//! }
//!
//! let filter: Filter<Book> = Predicate::eq(Book::AUTHOR, "Le Guin").into();
//! assert_eq!(filter.to_document().unwrap(), doc! { "author": { "$eq": "Le Guin" } });
//!
//! let sort = Sort::from(SortOptions::descending(Book::PUBLISHED));
//! assert_eq!(sort.to_document().unwrap(), doc! { "published": -1 });
//! ```

mod filter;
mod predicate;
mod selector;
mod sort;

pub use filter::Filter;
pub use predicate::{FilterOperator, FilterValue, Predicate};
pub use selector::{
    resolve_element_name, resolve_property_name, Field, IntoPropertySelector, Member,
    PropertySelector, Selector,
};
pub use sort::{DefaultSortResolver, Sort, SortDirection, SortOptions, SortResolver};

/// Errors raised while resolving selectors into field names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// The selector body is not a member access (optionally wrapped in conversions)
    #[error("Expression must select a property, found '{found}'")]
    InvalidExpressionShape {
        /// The offending selector, rendered as `x => ...`
        found: String,
    },
}
