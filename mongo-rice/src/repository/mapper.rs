//! Mapping between stored documents and caller-facing entities
//!
//! # Example
//!
//! ```rust
//! use mongo_rice::repository::{DocumentMapper, FnMapper};
//!
//! struct Row { cents: i64 }
//! struct Price { amount: f64 }
//!
//! let mapper = FnMapper::new(
//!     |row: Row| Price { amount: row.cents as f64 / 100.0 },
//!     |price: Price| Row { cents: (price.amount * 100.0).round() as i64 },
//! );
//! assert_eq!(mapper.to_entity(Row { cents: 1999 }).amount, 19.99);
//! assert_eq!(mapper.to_document(Price { amount: 5.0 }).cents, 500);
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::expression::{ExpressionError, Field, Filter, Member, Predicate};

/// Converts between the stored document `D` and the entity `E` callers see
pub trait DocumentMapper<D, E>: Send + Sync {
    /// Document to entity
    fn to_entity(&self, document: D) -> E;

    /// Entity to document
    fn to_document(&self, entity: E) -> D;

    /// The document member an entity property is stored as, if this mapper knows it
    fn bind_member(&self, _member: &Member) -> Option<Member> {
        None
    }
}

/// Entities are the documents themselves
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl<D> DocumentMapper<D, D> for IdentityMapper {
    fn to_entity(&self, document: D) -> D {
        document
    }

    fn to_document(&self, entity: D) -> D {
        entity
    }

    fn bind_member(&self, member: &Member) -> Option<Member> {
        Some(*member)
    }
}

/// Maps through `From` conversions in both directions
pub struct IntoMapper<D, E>(PhantomData<fn(D, E)>);

impl<D, E> IntoMapper<D, E> {
    /// Create the mapper
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<D, E> Default for IntoMapper<D, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, E> Clone for IntoMapper<D, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, E> Copy for IntoMapper<D, E> {}

impl<D, E> fmt::Debug for IntoMapper<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntoMapper")
    }
}

impl<D, E> DocumentMapper<D, E> for IntoMapper<D, E>
where
    D: From<E>,
    E: From<D>,
{
    fn to_entity(&self, document: D) -> E {
        E::from(document)
    }

    fn to_document(&self, entity: E) -> D {
        D::from(entity)
    }
}

/// Maps with a pair of functions
#[derive(Clone)]
pub struct FnMapper<F, G> {
    to_entity: F,
    to_document: G,
}

impl<F, G> FnMapper<F, G> {
    /// Create the mapper from both directions
    pub const fn new(to_entity: F, to_document: G) -> Self {
        Self {
            to_entity,
            to_document,
        }
    }
}

impl<F, G> fmt::Debug for FnMapper<F, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMapper")
    }
}

impl<D, E, F, G> DocumentMapper<D, E> for FnMapper<F, G>
where
    F: Fn(D) -> E + Send + Sync,
    G: Fn(E) -> D + Send + Sync,
{
    fn to_entity(&self, document: D) -> E {
        (self.to_entity)(document)
    }

    fn to_document(&self, entity: E) -> D {
        (self.to_document)(entity)
    }
}

/// Adds entity-to-document field bindings to another mapper
///
/// Bindings let predicates written against the entity be run against the stored document, see
/// [`convert_predicate`].
///
/// # Example
///
/// ```rust
/// use bson::doc;
/// use mongo_rice::expression::{Field, Predicate};
/// use mongo_rice::repository::{convert_predicate, BoundMapper, FnMapper};
///
/// struct Row { cents: i64 }
/// struct Price { amount: i64 }
///
/// impl Row { const CENTS: Field<Row> = Field::new("cents"); }
/// impl Price { const AMOUNT: Field<Price> = Field::new("amount"); }
///
/// let mapper = BoundMapper::new(FnMapper::new(
///     |row: Row| Price { amount: row.cents },
///     |price: Price| Row { cents: price.amount },
/// ))
/// .bind(Price::AMOUNT, Row::CENTS);
///
/// let stored = convert_predicate(&mapper, &Predicate::gt(Price::AMOUNT, 500)).unwrap();
/// assert_eq!(stored.to_filter().unwrap(), doc! { "cents": { "$gt": 500_i64 } });
/// ```
pub struct BoundMapper<M, D, E> {
    inner: M,
    bindings: Vec<(Member, Member)>,
    _types: PhantomData<fn(D, E)>,
}

impl<M, D, E> BoundMapper<M, D, E> {
    /// Wrap `inner` with no bindings
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            bindings: Vec::new(),
            _types: PhantomData,
        }
    }

    /// Bind an entity property to the document property it is stored as
    ///
    /// A later binding for the same entity property replaces the earlier one.
    #[must_use]
    pub fn bind(mut self, entity: Field<E>, document: Field<D>) -> Self {
        let entity = entity.member();
        self.bindings.retain(|(bound, _)| *bound != entity);
        self.bindings.push((entity, document.member()));
        self
    }

    /// The wrapped mapper
    pub fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Clone, D, E> Clone for BoundMapper<M, D, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            bindings: self.bindings.clone(),
            _types: PhantomData,
        }
    }
}

impl<M: fmt::Debug, D, E> fmt::Debug for BoundMapper<M, D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMapper")
            .field("inner", &self.inner)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<M, D, E> DocumentMapper<D, E> for BoundMapper<M, D, E>
where
    M: DocumentMapper<D, E>,
{
    fn to_entity(&self, document: D) -> E {
        self.inner.to_entity(document)
    }

    fn to_document(&self, entity: E) -> D {
        self.inner.to_document(entity)
    }

    fn bind_member(&self, member: &Member) -> Option<Member> {
        self.bindings
            .iter()
            .find(|(entity, _)| entity == member)
            .map(|(_, document)| *document)
            .or_else(|| self.inner.bind_member(member))
    }
}

/// Rewrite a predicate over entities into one over stored documents
///
/// # Errors
///
/// [`ExpressionError::InvalidExpressionShape`] when the predicate uses an entity property the
/// mapper has no binding for.
pub fn convert_predicate<D, E, M>(
    mapper: &M,
    predicate: &Predicate<E>,
) -> Result<Predicate<D>, ExpressionError>
where
    M: DocumentMapper<D, E> + ?Sized,
{
    predicate.rebind(|member| DocumentMapper::<D, E>::bind_member(mapper, member))
}

/// [`convert_predicate`] wrapped as a filter
///
/// # Errors
///
/// Same as [`convert_predicate`].
pub fn convert_filter<D, E, M>(
    mapper: &M,
    predicate: &Predicate<E>,
) -> Result<Filter<D>, ExpressionError>
where
    M: DocumentMapper<D, E> + ?Sized,
{
    convert_predicate(mapper, predicate).map(Filter::Predicate)
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Stored {
        name: String,
    }

    #[derive(Debug, PartialEq)]
    struct Shown {
        label: String,
    }

    impl Stored {
        const ID: Field<Stored> = Field::renamed("id", "_id");
        const NAME: Field<Stored> = Field::new("name");
    }

    impl Shown {
        const ID: Field<Shown> = Field::new("id");
        const LABEL: Field<Shown> = Field::new("label");
        const RANK: Field<Shown> = Field::new("rank");
    }

    fn bound() -> BoundMapper<IntoMapper<Stored, Shown>, Stored, Shown> {
        BoundMapper::new(IntoMapper::new())
            .bind(Shown::ID, Stored::ID)
            .bind(Shown::LABEL, Stored::NAME)
    }

    impl From<Stored> for Shown {
        fn from(stored: Stored) -> Self {
            Self { label: stored.name }
        }
    }

    impl From<Shown> for Stored {
        fn from(shown: Shown) -> Self {
            Self { name: shown.label }
        }
    }

    #[test]
    fn test_identity_mapper() {
        let stored = Stored { name: "a".into() };
        let mapped: Stored = IdentityMapper.to_entity(stored);
        assert_eq!(mapped, Stored { name: "a".into() });
    }

    #[test]
    fn test_into_mapper() {
        let mapper = IntoMapper::<Stored, Shown>::new();
        assert_eq!(
            mapper.to_entity(Stored { name: "b".into() }),
            Shown { label: "b".into() }
        );
        assert_eq!(
            mapper.to_document(Shown { label: "c".into() }),
            Stored { name: "c".into() }
        );
    }

    #[test]
    fn test_fn_mapper() {
        let mapper = FnMapper::new(
            |stored: Stored| Shown {
                label: stored.name.to_uppercase(),
            },
            |shown: Shown| Stored {
                name: shown.label.to_lowercase(),
            },
        );
        assert_eq!(
            mapper.to_entity(Stored { name: "d".into() }),
            Shown { label: "D".into() }
        );
        assert_eq!(
            mapper.to_document(Shown { label: "E".into() }),
            Stored { name: "e".into() }
        );
    }

    #[test]
    fn test_convert_predicate_follows_renamed_fields() {
        let predicate =
            Predicate::eq(Shown::LABEL, "Mingus Ah Um").and(Predicate::is_not_null(Shown::ID));
        let stored = convert_predicate(&bound(), &predicate).unwrap();
        assert_eq!(
            stored.to_filter().unwrap(),
            doc! { "$and": [
                { "name": { "$eq": "Mingus Ah Um" } },
                { "_id": { "$ne": null } },
            ] }
        );
    }

    #[test]
    fn test_convert_predicate_rejects_unbound_field() {
        let predicate = Predicate::eq(Shown::LABEL, "Ah Um").or(Predicate::gt(Shown::RANK, 3));
        let err = convert_filter(&bound(), &predicate).unwrap_err();
        assert!(matches!(err, ExpressionError::InvalidExpressionShape { .. }));
        assert!(err.to_string().contains("x.rank"));
    }

    #[test]
    fn test_later_binding_replaces_earlier() {
        let mapper = bound().bind(Shown::LABEL, Stored::ID);
        assert_eq!(mapper.bind_member(&Shown::LABEL.member()), Some(Stored::ID.member()));
    }

    #[test]
    fn test_identity_mapper_keeps_predicate() {
        let predicate = Predicate::eq(Stored::NAME, "Blues & Roots");
        let converted = convert_predicate(&IdentityMapper, &predicate).unwrap();
        assert_eq!(converted, predicate);
    }

    #[test]
    fn test_unbound_mappers_convert_nothing() {
        let predicate = Predicate::eq(Shown::LABEL, "Oh Yeah");
        assert!(convert_predicate(&IntoMapper::<Stored, Shown>::new(), &predicate).is_err());
    }
}
