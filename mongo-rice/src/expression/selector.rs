//! Property selectors
//!
//! A selector is a one-argument expression over a document type whose body picks a single
//! property, e.g. `x => x.title`. Rust cannot introspect closures, so the body is an explicit
//! [`Selector`] tree built from typed [`Field`] references declared on the document type:
//!
//! ```rust
//! use mongo_rice::expression::{resolve_property_name, Field, PropertySelector};
//!
//! struct Song;
//!
//! impl Song {
//!     const TITLE: Field<Song> = Field::new("title");
//!     const PLAYS: Field<Song> = Field::new("plays");
//! }
//!
//! assert_eq!(resolve_property_name(&PropertySelector::from(Song::TITLE)).unwrap(), "title");
//! // A conversion around the member is unwrapped
//! assert_eq!(resolve_property_name(&Song::PLAYS.convert()).unwrap(), "plays");
//! // A method call is not a property access
//! assert!(resolve_property_name(&Song::TITLE.call("to_lowercase")).is_err());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use bson::Bson;

use super::ExpressionError;

/// A property of a stored document: the declared name and the element name used in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Member {
    /// Property name as declared on the document type
    pub property: &'static str,
    /// Element name in the stored BSON document
    pub element: &'static str,
}

/// Body of a selector expression
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Direct property access: `x => x.title`
    Member(Member),
    /// Widening or boxing conversion around another expression: `x => x.plays as f64`
    Convert(Box<Selector>),
    /// Method call on another expression: `x => x.title.to_lowercase()`
    Call {
        /// Expression the method is called on
        receiver: Box<Selector>,
        /// Method name
        method: Cow<'static, str>,
    },
    /// Constant or computed body that does not reference the document
    Constant(Bson),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(member) => write!(f, "x.{}", member.property),
            Self::Convert(inner) => write!(f, "({inner} as _)"),
            Self::Call { receiver, method } => write!(f, "{receiver}.{method}()"),
            Self::Constant(value) => write!(f, "{value}"),
        }
    }
}

/// Typed reference to a property of `D`
///
/// Declared as associated constants on the document type. `Field` is `Copy`, so the same
/// constant can feed any number of predicates and sort options.
pub struct Field<D> {
    member: Member,
    _document: PhantomData<fn() -> D>,
}

impl<D> Field<D> {
    /// A property stored under its own name
    pub const fn new(property: &'static str) -> Self {
        Self::renamed(property, property)
    }

    /// A property stored under a different element name (e.g. `id` stored as `_id`)
    pub const fn renamed(property: &'static str, element: &'static str) -> Self {
        Self {
            member: Member { property, element },
            _document: PhantomData,
        }
    }

    /// The property name as declared
    pub const fn property(&self) -> &'static str {
        self.member.property
    }

    /// The element name used in storage
    pub const fn element(&self) -> &'static str {
        self.member.element
    }

    /// The referenced member
    pub const fn member(&self) -> Member {
        self.member
    }

    /// Selector wrapping this member in a conversion node
    pub fn convert(self) -> PropertySelector<D> {
        PropertySelector::new(Selector::Convert(Box::new(Selector::Member(self.member))))
    }

    /// Selector calling `method` on this member
    pub fn call(self, method: impl Into<Cow<'static, str>>) -> PropertySelector<D> {
        PropertySelector::new(Selector::Call {
            receiver: Box::new(Selector::Member(self.member)),
            method: method.into(),
        })
    }
}

impl<D> Clone for Field<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Field<D> {}

impl<D> fmt::Debug for Field<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.member).finish()
    }
}

impl<D> PartialEq for Field<D> {
    fn eq(&self, other: &Self) -> bool {
        self.member == other.member
    }
}

/// One-argument selector expression over a document of type `D`
pub struct PropertySelector<D> {
    body: Selector,
    _document: PhantomData<fn() -> D>,
}

impl<D> PropertySelector<D> {
    /// Wrap an expression body
    pub fn new(body: Selector) -> Self {
        Self {
            body,
            _document: PhantomData,
        }
    }

    /// The expression body
    pub fn body(&self) -> &Selector {
        &self.body
    }
}

impl<D> Clone for PropertySelector<D> {
    fn clone(&self) -> Self {
        Self::new(self.body.clone())
    }
}

impl<D> fmt::Debug for PropertySelector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertySelector").field(&self.body).finish()
    }
}

impl<D> fmt::Display for PropertySelector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x => {}", self.body)
    }
}

impl<D> PartialEq for PropertySelector<D> {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
    }
}

impl<D> From<Field<D>> for PropertySelector<D> {
    fn from(field: Field<D>) -> Self {
        Self::new(Selector::Member(field.member))
    }
}

/// Anything usable where a selector over `Self::Document` is expected
///
/// Implemented for [`Field`] and [`PropertySelector`], so field constants can be passed to
/// predicate and sort builders without conversion.
pub trait IntoPropertySelector {
    /// Document type the selector ranges over
    type Document;

    /// Convert into a selector
    fn into_property_selector(self) -> PropertySelector<Self::Document>;
}

impl<D> IntoPropertySelector for Field<D> {
    type Document = D;

    fn into_property_selector(self) -> PropertySelector<D> {
        self.into()
    }
}

impl<D> IntoPropertySelector for PropertySelector<D> {
    type Document = D;

    fn into_property_selector(self) -> PropertySelector<D> {
        self
    }
}

/// Find the member an expression body accesses, looking through conversion nodes
pub(crate) fn resolve_body(body: &Selector) -> Result<Member, ExpressionError> {
    let mut current = body;
    loop {
        match current {
            Selector::Member(member) => return Ok(*member),
            Selector::Convert(inner) => current = inner.as_ref(),
            Selector::Call { .. } | Selector::Constant(_) => {
                return Err(ExpressionError::InvalidExpressionShape {
                    found: format!("x => {body}"),
                })
            }
        }
    }
}

/// Rewrite every member access in `body` through `bind`
///
/// Conversions and method calls keep their shape around the rewritten member.
pub(crate) fn rebind_body(
    body: &Selector,
    bind: &dyn Fn(&Member) -> Option<Member>,
) -> Result<Selector, ExpressionError> {
    match body {
        Selector::Member(member) => bind(member).map(Selector::Member).ok_or_else(|| {
            ExpressionError::InvalidExpressionShape {
                found: format!("x => x.{} (not bound to a stored member)", member.property),
            }
        }),
        Selector::Convert(inner) => Ok(Selector::Convert(Box::new(rebind_body(inner, bind)?))),
        Selector::Call { receiver, method } => Ok(Selector::Call {
            receiver: Box::new(rebind_body(receiver, bind)?),
            method: method.clone(),
        }),
        Selector::Constant(value) => Ok(Selector::Constant(value.clone())),
    }
}

/// Resolve the declared name of the property a selector accesses
///
/// # Errors
///
/// [`ExpressionError::InvalidExpressionShape`] when the body is neither a member access nor a
/// conversion around one.
pub fn resolve_property_name<D>(
    selector: &PropertySelector<D>,
) -> Result<&'static str, ExpressionError> {
    resolve_body(selector.body()).map(|member| member.property)
}

/// Resolve the stored element name of the property a selector accesses
///
/// # Errors
///
/// Same as [`resolve_property_name`].
pub fn resolve_element_name<D>(
    selector: &PropertySelector<D>,
) -> Result<&'static str, ExpressionError> {
    resolve_body(selector.body()).map(|member| member.element)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Track;

    impl Track {
        const ID: Field<Track> = Field::renamed("id", "_id");
        const NAME: Field<Track> = Field::new("name");
        const DURATION: Field<Track> = Field::new("duration");
    }

    #[test]
    fn test_member_selector_resolves_name() {
        let selector: PropertySelector<Track> = Track::NAME.into();
        assert_eq!(resolve_property_name(&selector).unwrap(), "name");
        assert_eq!(resolve_element_name(&selector).unwrap(), "name");
    }

    #[test]
    fn test_converted_member_resolves_underlying_name() {
        let selector = Track::DURATION.convert();
        assert_eq!(resolve_property_name(&selector).unwrap(), "duration");
    }

    #[test]
    fn test_nested_conversions_are_unwrapped() {
        let selector: PropertySelector<Track> = PropertySelector::new(Selector::Convert(
            Box::new(Selector::Convert(Box::new(Selector::Member(Member {
                property: "duration",
                element: "duration",
            })))),
        ));
        assert_eq!(resolve_property_name(&selector).unwrap(), "duration");
    }

    #[test]
    fn test_method_call_is_rejected() {
        let selector = Track::NAME.call("to_uppercase");
        let err = resolve_property_name(&selector).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::InvalidExpressionShape {
                found: "x => x.name.to_uppercase()".to_string()
            }
        );
    }

    #[test]
    fn test_conversion_around_call_is_rejected() {
        let selector: PropertySelector<Track> =
            PropertySelector::new(Selector::Convert(Box::new(Track::NAME.call("len").body)));
        assert!(resolve_property_name(&selector).is_err());
    }

    #[test]
    fn test_constant_is_rejected() {
        let selector: PropertySelector<Track> = PropertySelector::new(Selector::Constant(Bson::Int32(1)));
        assert!(matches!(
            resolve_property_name(&selector),
            Err(ExpressionError::InvalidExpressionShape { .. })
        ));
    }

    #[test]
    fn test_renamed_field_keeps_property_and_element_apart() {
        let selector: PropertySelector<Track> = Track::ID.into();
        assert_eq!(resolve_property_name(&selector).unwrap(), "id");
        assert_eq!(resolve_element_name(&selector).unwrap(), "_id");
        assert_eq!(Track::ID.property(), "id");
        assert_eq!(Track::ID.element(), "_id");
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(PropertySelector::from(Track::NAME).to_string(), "x => x.name");
        assert_eq!(Track::DURATION.convert().to_string(), "x => (x.duration as _)");
    }
}
