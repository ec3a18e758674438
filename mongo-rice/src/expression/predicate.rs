//! Typed predicates over document properties
//!
//! A [`Predicate`] is a boolean expression over a document type, built from property
//! selectors and rendered into a MongoDB query document by [`Predicate::to_filter`].
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use mongo_rice::expression::{Field, Predicate};
//!
//! struct Song;
//!
//! impl Song {
//!     const GENRE: Field<Song> = Field::new("genre");
//!     const PLAYS: Field<Song> = Field::new("plays");
//! }
//!
//! let popular_jazz = Predicate::eq(Song::GENRE, "jazz").and(Predicate::gte(Song::PLAYS, 1000_i64));
//!
//! assert_eq!(
//!     popular_jazz.to_filter().unwrap(),
//!     doc! { "$and": [
//!         { "genre": { "$eq": "jazz" } },
//!         { "plays": { "$gte": 1000_i64 } },
//!     ] }
//! );
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::ops::Not;

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};

use super::selector::{rebind_body, resolve_body, IntoPropertySelector, Member, Selector};
use super::ExpressionError;

/// Comparison operators for predicate conditions
///
/// # Example
///
/// ```rust
/// use mongo_rice::expression::FilterOperator;
///
/// assert_eq!(format!("{}", FilterOperator::Equal), "$eq");
/// assert_eq!(format!("{}", FilterOperator::Matches), "$regex");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (`$eq`)
    Equal,
    /// Not equal to (`$ne`)
    NotEqual,
    /// Greater than (`$gt`)
    GreaterThan,
    /// Greater than or equal to (`$gte`)
    GreaterThanOrEqual,
    /// Less than (`$lt`)
    LessThan,
    /// Less than or equal to (`$lte`)
    LessThanOrEqual,
    /// Regular expression match (`$regex`)
    Matches,
    /// Value is in a list (`$in`)
    In,
    /// Value is not in a list (`$nin`)
    NotIn,
    /// Value is null or missing
    IsNull,
    /// Value is present and not null
    IsNotNull,
}

impl FilterOperator {
    /// The MongoDB query operator this renders to
    pub fn as_operator(&self) -> &'static str {
        match self {
            Self::Equal | Self::IsNull => "$eq",
            Self::NotEqual | Self::IsNotNull => "$ne",
            Self::GreaterThan => "$gt",
            Self::GreaterThanOrEqual => "$gte",
            Self::LessThan => "$lt",
            Self::LessThanOrEqual => "$lte",
            Self::Matches => "$regex",
            Self::In => "$in",
            Self::NotIn => "$nin",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_operator())
    }
}

/// A value that can be used in predicate conditions
///
/// # Example
///
/// ```rust
/// use mongo_rice::expression::FilterValue;
///
/// let string_val: FilterValue = "active".into();
/// let int_val: FilterValue = 42_i64.into();
/// let bool_val: FilterValue = true.into();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// ObjectId value
    ObjectId(ObjectId),
    /// UTC date-time value
    DateTime(DateTime<Utc>),
    /// List of string values (for `$in` / `$nin`)
    StringList(Vec<String>),
    /// List of integer values (for `$in` / `$nin`)
    IntegerList(Vec<i64>),
    /// List of ObjectId values (for `$in` / `$nin`)
    ObjectIdList(Vec<ObjectId>),
    /// Null value
    Null,
}

impl FilterValue {
    /// Convert into the BSON value sent to the store
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::String(s) => Bson::String(s.clone()),
            Self::Integer(n) => Bson::Int64(*n),
            Self::Float(n) => Bson::Double(*n),
            Self::Boolean(b) => Bson::Boolean(*b),
            Self::ObjectId(id) => Bson::ObjectId(*id),
            Self::DateTime(at) => Bson::DateTime(bson::DateTime::from_chrono(*at)),
            Self::StringList(list) => Bson::Array(list.iter().cloned().map(Bson::String).collect()),
            Self::IntegerList(list) => Bson::Array(list.iter().copied().map(Bson::Int64).collect()),
            Self::ObjectIdList(list) => {
                Bson::Array(list.iter().copied().map(Bson::ObjectId).collect())
            }
            Self::Null => Bson::Null,
        }
    }

    fn to_bson_array(&self) -> Bson {
        match self.to_bson() {
            array @ Bson::Array(_) => array,
            scalar => Bson::Array(vec![scalar]),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<ObjectId> for FilterValue {
    fn from(id: ObjectId) -> Self {
        Self::ObjectId(id)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(at: DateTime<Utc>) -> Self {
        Self::DateTime(at)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(list: Vec<String>) -> Self {
        Self::StringList(list)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(list: Vec<&str>) -> Self {
        Self::StringList(list.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(list: Vec<i64>) -> Self {
        Self::IntegerList(list)
    }
}

impl From<Vec<ObjectId>> for FilterValue {
    fn from(list: Vec<ObjectId>) -> Self {
        Self::ObjectIdList(list)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Condition {
        selector: Selector,
        operator: FilterOperator,
        value: FilterValue,
    },
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
}

impl Node {
    fn render(&self) -> Result<Document, ExpressionError> {
        match self {
            Self::Condition {
                selector,
                operator,
                value,
            } => {
                let element = resolve_body(selector)?.element;
                let operand = match operator {
                    FilterOperator::In | FilterOperator::NotIn => value.to_bson_array(),
                    FilterOperator::IsNull | FilterOperator::IsNotNull => Bson::Null,
                    _ => value.to_bson(),
                };
                Ok(doc! { element: { operator.as_operator(): operand } })
            }
            Self::And(nodes) => Ok(doc! { "$and": Self::render_all(nodes)? }),
            Self::Or(nodes) => Ok(doc! { "$or": Self::render_all(nodes)? }),
            Self::Not(node) => Ok(doc! { "$nor": [node.render()?] }),
        }
    }

    fn render_all(nodes: &[Node]) -> Result<Vec<Document>, ExpressionError> {
        nodes.iter().map(Node::render).collect()
    }

    fn rebind(&self, bind: &dyn Fn(&Member) -> Option<Member>) -> Result<Node, ExpressionError> {
        match self {
            Self::Condition {
                selector,
                operator,
                value,
            } => Ok(Self::Condition {
                selector: rebind_body(selector, bind)?,
                operator: *operator,
                value: value.clone(),
            }),
            Self::And(nodes) => Ok(Self::And(Self::rebind_all(nodes, bind)?)),
            Self::Or(nodes) => Ok(Self::Or(Self::rebind_all(nodes, bind)?)),
            Self::Not(node) => Ok(Self::Not(Box::new(node.rebind(bind)?))),
        }
    }

    fn rebind_all(
        nodes: &[Node],
        bind: &dyn Fn(&Member) -> Option<Member>,
    ) -> Result<Vec<Node>, ExpressionError> {
        nodes.iter().map(|node| node.rebind(bind)).collect()
    }
}

/// Boolean expression over the properties of `D`
///
/// Conditions take a `Field` constant or a [`super::PropertySelector`] built from one. Every
/// selector is resolved when the predicate is rendered; a selector that is not a property
/// access makes [`Predicate::to_filter`] fail.
pub struct Predicate<D> {
    node: Node,
    _document: PhantomData<fn() -> D>,
}

impl<D> Predicate<D> {
    fn from_node(node: Node) -> Self {
        Self {
            node,
            _document: PhantomData,
        }
    }

    /// Create a condition from its parts
    pub fn new(
        selector: impl IntoPropertySelector<Document = D>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::from_node(Node::Condition {
            selector: selector.into_property_selector().body().clone(),
            operator,
            value: value.into(),
        })
    }

    /// `selector == value`
    pub fn eq(
        selector: impl IntoPropertySelector<Document = D>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::Equal, value)
    }

    /// `selector != value`
    pub fn ne(
        selector: impl IntoPropertySelector<Document = D>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::NotEqual, value)
    }

    /// `selector > value`
    pub fn gt(
        selector: impl IntoPropertySelector<Document = D>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::GreaterThan, value)
    }

    /// `selector >= value`
    pub fn gte(
        selector: impl IntoPropertySelector<Document = D>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::GreaterThanOrEqual, value)
    }

    /// `selector < value`
    pub fn lt(
        selector: impl IntoPropertySelector<Document = D>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::LessThan, value)
    }

    /// `selector <= value`
    pub fn lte(
        selector: impl IntoPropertySelector<Document = D>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::LessThanOrEqual, value)
    }

    /// The string property matches a regular expression
    pub fn matches(
        selector: impl IntoPropertySelector<Document = D>,
        pattern: impl Into<String>,
    ) -> Self {
        Self::new(selector, FilterOperator::Matches, FilterValue::String(pattern.into()))
    }

    /// The property equals one of `values`
    pub fn is_in(
        selector: impl IntoPropertySelector<Document = D>,
        values: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::In, values)
    }

    /// The property equals none of `values`
    pub fn not_in(
        selector: impl IntoPropertySelector<Document = D>,
        values: impl Into<FilterValue>,
    ) -> Self {
        Self::new(selector, FilterOperator::NotIn, values)
    }

    /// The property is null or missing
    pub fn is_null(selector: impl IntoPropertySelector<Document = D>) -> Self {
        Self::new(selector, FilterOperator::IsNull, FilterValue::Null)
    }

    /// The property is present and not null
    pub fn is_not_null(selector: impl IntoPropertySelector<Document = D>) -> Self {
        Self::new(selector, FilterOperator::IsNotNull, FilterValue::Null)
    }

    /// Both predicates hold
    #[must_use]
    pub fn and(self, other: Predicate<D>) -> Self {
        let nodes = match (self.node, other.node) {
            (Node::And(mut left), Node::And(right)) => {
                left.extend(right);
                left
            }
            (Node::And(mut left), right) => {
                left.push(right);
                left
            }
            (left, right) => vec![left, right],
        };
        Self::from_node(Node::And(nodes))
    }

    /// At least one of the predicates holds
    #[must_use]
    pub fn or(self, other: Predicate<D>) -> Self {
        let nodes = match (self.node, other.node) {
            (Node::Or(mut left), Node::Or(right)) => {
                left.extend(right);
                left
            }
            (Node::Or(mut left), right) => {
                left.push(right);
                left
            }
            (left, right) => vec![left, right],
        };
        Self::from_node(Node::Or(nodes))
    }

    /// Render into a MongoDB query document
    ///
    /// # Errors
    ///
    /// [`ExpressionError::InvalidExpressionShape`] if any selector in the tree is not a
    /// property access.
    pub fn to_filter(&self) -> Result<Document, ExpressionError> {
        self.node.render()
    }

    /// The same predicate over another type, with every member access rewritten by `bind`
    ///
    /// # Errors
    ///
    /// [`ExpressionError::InvalidExpressionShape`] for a member `bind` returns `None` for.
    pub fn rebind<T>(
        &self,
        bind: impl Fn(&Member) -> Option<Member>,
    ) -> Result<Predicate<T>, ExpressionError> {
        self.node.rebind(&bind).map(Predicate::from_node)
    }
}

impl<D> Not for Predicate<D> {
    type Output = Predicate<D>;

    fn not(self) -> Self::Output {
        match self.node {
            Node::Not(inner) => Self::from_node(*inner),
            node => Self::from_node(Node::Not(Box::new(node))),
        }
    }
}

impl<D> Clone for Predicate<D> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<D> fmt::Debug for Predicate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.node).finish()
    }
}

impl<D> PartialEq for Predicate<D> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Field;

    struct Album;

    impl Album {
        const ID: Field<Album> = Field::renamed("id", "_id");
        const TITLE: Field<Album> = Field::new("title");
        const YEAR: Field<Album> = Field::new("year");
        const LABEL: Field<Album> = Field::new("label");
    }

    #[test]
    fn test_filter_operator_display() {
        assert_eq!(format!("{}", FilterOperator::Equal), "$eq");
        assert_eq!(format!("{}", FilterOperator::NotEqual), "$ne");
        assert_eq!(format!("{}", FilterOperator::GreaterThan), "$gt");
        assert_eq!(format!("{}", FilterOperator::GreaterThanOrEqual), "$gte");
        assert_eq!(format!("{}", FilterOperator::LessThan), "$lt");
        assert_eq!(format!("{}", FilterOperator::LessThanOrEqual), "$lte");
        assert_eq!(format!("{}", FilterOperator::Matches), "$regex");
        assert_eq!(format!("{}", FilterOperator::In), "$in");
        assert_eq!(format!("{}", FilterOperator::NotIn), "$nin");
    }

    #[test]
    fn test_filter_value_from_i32() {
        let value: FilterValue = 42_i32.into();
        assert_eq!(value, FilterValue::Integer(42));
        assert_eq!(value.to_bson(), Bson::Int64(42));
    }

    #[test]
    fn test_filter_value_lists_become_arrays() {
        let value: FilterValue = vec!["a", "b"].into();
        assert_eq!(
            value.to_bson(),
            Bson::Array(vec![Bson::String("a".into()), Bson::String("b".into())])
        );
    }

    #[test]
    fn test_equality_condition() {
        let predicate = Predicate::eq(Album::TITLE, "Kind of Blue");
        assert_eq!(
            predicate.to_filter().unwrap(),
            doc! { "title": { "$eq": "Kind of Blue" } }
        );
    }

    #[test]
    fn test_id_condition_uses_element_name() {
        let id = ObjectId::new();
        let predicate = Predicate::eq(Album::ID, id);
        assert_eq!(predicate.to_filter().unwrap(), doc! { "_id": { "$eq": id } });
    }

    #[test]
    fn test_converted_selector_in_condition() {
        let predicate = Predicate::gt(Album::YEAR.convert(), 1960);
        assert_eq!(
            predicate.to_filter().unwrap(),
            doc! { "year": { "$gt": 1960_i64 } }
        );
    }

    #[test]
    fn test_method_call_selector_fails_to_render() {
        let predicate = Predicate::eq(Album::TITLE.call("to_lowercase"), "blue");
        assert!(matches!(
            predicate.to_filter(),
            Err(ExpressionError::InvalidExpressionShape { .. })
        ));
    }

    #[test]
    fn test_in_wraps_scalar_in_array() {
        let predicate = Predicate::is_in(Album::LABEL, "Blue Note");
        assert_eq!(
            predicate.to_filter().unwrap(),
            doc! { "label": { "$in": ["Blue Note"] } }
        );
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(
            Predicate::<Album>::is_null(Album::LABEL).to_filter().unwrap(),
            doc! { "label": { "$eq": Bson::Null } }
        );
        assert_eq!(
            Predicate::<Album>::is_not_null(Album::LABEL).to_filter().unwrap(),
            doc! { "label": { "$ne": Bson::Null } }
        );
    }

    #[test]
    fn test_and_flattens() {
        let predicate = Predicate::gte(Album::YEAR, 1950)
            .and(Predicate::lt(Album::YEAR, 1970))
            .and(Predicate::ne(Album::LABEL, "Columbia"));
        assert_eq!(
            predicate.to_filter().unwrap(),
            doc! { "$and": [
                { "year": { "$gte": 1950_i64 } },
                { "year": { "$lt": 1970_i64 } },
                { "label": { "$ne": "Columbia" } },
            ] }
        );
    }

    #[test]
    fn test_or_and_not() {
        let predicate = !(Predicate::eq(Album::LABEL, "Impulse!").or(Predicate::matches(Album::TITLE, "^A")));
        assert_eq!(
            predicate.to_filter().unwrap(),
            doc! { "$nor": [
                { "$or": [
                    { "label": { "$eq": "Impulse!" } },
                    { "title": { "$regex": "^A" } },
                ] }
            ] }
        );
    }

    #[test]
    fn test_double_negation_cancels() {
        let predicate = Predicate::eq(Album::TITLE, "Giant Steps");
        assert_eq!(!!predicate.clone(), predicate);
    }

    #[test]
    fn test_rebind_rewrites_members_through_tree() {
        struct Release;

        impl Release {
            const NAME: Field<Release> = Field::new("name");
            const IMPRINT: Field<Release> = Field::new("imprint");
        }

        let bind = |member: &Member| {
            if *member == Release::NAME.member() {
                Some(Album::TITLE.member())
            } else if *member == Release::IMPRINT.member() {
                Some(Album::LABEL.member())
            } else {
                None
            }
        };
        let predicate = !Predicate::eq(Release::NAME.convert(), "Kind of Blue")
            .or(Predicate::eq(Release::IMPRINT, "Blue Note"));
        let rebound: Predicate<Album> = predicate.rebind(bind).unwrap();
        assert_eq!(
            rebound.to_filter().unwrap(),
            doc! { "$nor": [
                { "$or": [
                    { "title": { "$eq": "Kind of Blue" } },
                    { "label": { "$eq": "Blue Note" } },
                ] }
            ] }
        );
    }

    #[test]
    fn test_rebind_fails_for_unbound_member() {
        let predicate =
            Predicate::eq(Album::TITLE, "Blue Train").and(Predicate::gt(Album::YEAR, 1956));
        let err = predicate
            .rebind::<Album>(|member| (*member == Album::TITLE.member()).then_some(*member))
            .unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::InvalidExpressionShape { ref found } if found.contains("x.year")
        ));
    }
}
