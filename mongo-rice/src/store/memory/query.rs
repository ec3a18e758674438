//! Query evaluation for the memory store
//!
//! Supports implicit equality, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`,
//! `$exists`, `$regex` (with `$options`), `$not`, and the logical `$and`, `$or` and `$nor`.
//! Comparisons follow MongoDB type bracketing: an ordering operator only matches values of the
//! same type class, and arrays match when any element does.

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

use crate::store::{StoreError, StoreResult};

/// Whether `document` satisfies `filter`
pub(crate) fn matches(document: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        let satisfied = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in clauses(key, condition)? {
                    if matches(document, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            operator if operator.starts_with('$') => {
                return Err(StoreError::new(format!(
                    "unknown top level operator: {operator}"
                )))
            }
            path => matches_condition(lookup(document, path), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, condition: &'a Bson) -> StoreResult<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(StoreError::new(format!("{operator} must be an array")));
    };
    if items.is_empty() {
        return Err(StoreError::new(format!(
            "{operator} must be a nonempty array"
        )));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            _ => Err(StoreError::new(format!(
                "{operator} entries must be objects"
            ))),
        })
        .collect()
}

/// Resolve a dotted path, descending into embedded documents and indexing arrays
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(inner) if inner.keys().next().is_some_and(|k| k.starts_with('$')) => {
            Some(inner)
        }
        _ => None,
    }
}

fn matches_condition(value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
    match is_operator_document(condition) {
        Some(operators) => {
            let options = operators.get_str("$options").ok();
            for (operator, operand) in operators {
                if !apply_operator(value, operator, operand, options)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        None => match condition {
            Bson::RegularExpression(regex) => {
                let compiled = compile(&regex.pattern, &regex.options)?;
                Ok(any_candidate(value, |v| regex_matches(&compiled, v)))
            }
            _ => Ok(equals(value, condition)),
        },
    }
}

fn apply_operator(
    value: Option<&Bson>,
    operator: &str,
    operand: &Bson,
    options: Option<&str>,
) -> StoreResult<bool> {
    match operator {
        "$eq" => Ok(equals(value, operand)),
        "$ne" => Ok(!equals(value, operand)),
        "$gt" => Ok(ordered(value, operand, |o| o == Ordering::Greater)),
        "$gte" => Ok(ordered(value, operand, |o| o != Ordering::Less)),
        "$lt" => Ok(ordered(value, operand, |o| o == Ordering::Less)),
        "$lte" => Ok(ordered(value, operand, |o| o != Ordering::Greater)),
        "$in" => Ok(set_operand(operator, operand)?
            .iter()
            .any(|candidate| equals(value, candidate))),
        "$nin" => Ok(!set_operand(operator, operand)?
            .iter()
            .any(|candidate| equals(value, candidate))),
        "$exists" => Ok(value.is_some() == truthy(operand)),
        "$regex" => {
            let compiled = match operand {
                Bson::String(pattern) => compile(pattern, options.unwrap_or_default())?,
                Bson::RegularExpression(regex) => compile(&regex.pattern, &regex.options)?,
                _ => return Err(StoreError::new("$regex has to be a string")),
            };
            Ok(any_candidate(value, |v| regex_matches(&compiled, v)))
        }
        "$options" => Ok(true),
        "$not" => Ok(!matches_condition(value, operand)?),
        other => Err(StoreError::new(format!("unknown operator: {other}"))),
    }
}

fn set_operand<'a>(operator: &str, operand: &'a Bson) -> StoreResult<&'a Vec<Bson>> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(StoreError::new(format!("{operator} needs an array"))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

fn compile(pattern: &str, options: &str) -> StoreResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(StoreError::from_source)
}

fn regex_matches(regex: &Regex, value: &Bson) -> bool {
    match value {
        Bson::String(s) | Bson::Symbol(s) => regex.is_match(s),
        _ => false,
    }
}

/// Apply `test` to the value itself and, for arrays, to each element
fn any_candidate(value: Option<&Bson>, mut test: impl FnMut(&Bson) -> bool) -> bool {
    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(&mut test) || test(&Bson::Array(items.clone())),
        Some(value) => test(value),
    }
}

/// Equality with null also matching missing fields
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    match (value, operand) {
        (None, Bson::Null) => true,
        (None, _) => false,
        (Some(value), operand) => any_candidate(Some(value), |candidate| {
            type_rank(candidate) == type_rank(operand)
                && compare_values(candidate, operand) == Ordering::Equal
        }),
    }
}

fn ordered(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    any_candidate(value, |candidate| {
        type_rank(candidate) == type_rank(operand) && accept(compare_values(candidate, operand))
    })
}

/// Position of a value's type in the cross-type sort order
pub(crate) fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Total order over BSON values: type rank first, then value within the type
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> Ordering {
    let by_rank = type_rank(left).cmp(&type_rank(right));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (left, right) {
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            as_i64(left).cmp(&as_i64(right))
        }
        (
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_),
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_),
        ) => as_f64(left).total_cmp(&as_f64(right)),
        (Bson::String(l) | Bson::Symbol(l), Bson::String(r) | Bson::Symbol(r)) => l.cmp(r),
        (Bson::Document(l), Bson::Document(r)) => compare_documents(l, r),
        (Bson::Array(l), Bson::Array(r)) => compare_sequences(l.iter(), r.iter()),
        (Bson::Binary(l), Bson::Binary(r)) => l.bytes.cmp(&r.bytes),
        (Bson::ObjectId(l), Bson::ObjectId(r)) => l.cmp(r),
        (Bson::Boolean(l), Bson::Boolean(r)) => l.cmp(r),
        (Bson::DateTime(l), Bson::DateTime(r)) => l.timestamp_millis().cmp(&r.timestamp_millis()),
        (Bson::Timestamp(l), Bson::Timestamp(r)) => (l.time, l.increment).cmp(&(r.time, r.increment)),
        (Bson::RegularExpression(l), Bson::RegularExpression(r)) => {
            (&l.pattern, &l.options).cmp(&(&r.pattern, &r.options))
        }
        _ => Ordering::Equal,
    }
}

fn as_i64(value: &Bson) -> i64 {
    match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        _ => 0,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => f64::from(*n),
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => 0.0,
    }
}

fn compare_documents(left: &Document, right: &Document) -> Ordering {
    for ((lk, lv), (rk, rv)) in left.iter().zip(right.iter()) {
        let ordering = compare_values(lv, rv).then_with(|| lk.cmp(rk));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

fn compare_sequences<'a>(
    mut left: impl Iterator<Item = &'a Bson>,
    mut right: impl Iterator<Item = &'a Bson>,
) -> Ordering {
    loop {
        match (left.next(), right.next()) {
            (Some(l), Some(r)) => {
                let ordering = compare_values(l, r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

/// Sort documents in place by a MongoDB sort specification
///
/// Missing fields sort as null. Array fields sort by their smallest element ascending and their
/// largest element descending. The sort is stable, so ties keep insertion order.
pub(crate) fn sort_documents(documents: &mut [Document], spec: &Document) -> StoreResult<()> {
    let mut keys = Vec::with_capacity(spec.len());
    for (path, direction) in spec {
        let descending = match direction {
            Bson::Int32(1) | Bson::Int64(1) => false,
            Bson::Int32(-1) | Bson::Int64(-1) => true,
            Bson::Double(d) if *d == 1.0 => false,
            Bson::Double(d) if *d == -1.0 => true,
            other => {
                return Err(StoreError::new(format!(
                    "$sort key ordering must be 1 (for ascending) or -1 (for descending), found {other}"
                )))
            }
        };
        keys.push((path.as_str(), descending));
    }
    if keys.is_empty() {
        return Err(StoreError::new("$sort stage must have at least one sort key"));
    }

    documents.sort_by(|left, right| {
        for (path, descending) in &keys {
            let l = sort_key(lookup(left, path), *descending);
            let r = sort_key(lookup(right, path), *descending);
            let ordering = compare_values(&l, &r);
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn sort_key(value: Option<&Bson>, descending: bool) -> Bson {
    match value {
        None => Bson::Null,
        Some(Bson::Array(items)) if !items.is_empty() => {
            let pick = items.iter().reduce(|best, item| {
                let ordering = compare_values(item, best);
                let better = if descending {
                    ordering == Ordering::Greater
                } else {
                    ordering == Ordering::Less
                };
                if better {
                    item
                } else {
                    best
                }
            });
            pick.cloned().unwrap_or(Bson::Null)
        }
        Some(value) => value.clone(),
    }
}
