//! Aggregation stages for the memory store: `$match`, `$sort`, `$skip`, `$limit`, `$count`
//! and `$facet`

use bson::{Bson, Document};

use super::query::{matches, sort_documents};
use crate::store::{StoreError, StoreResult};

/// Run `pipeline` over `documents`
pub(crate) fn run(
    mut documents: Vec<Document>,
    pipeline: &[Document],
) -> StoreResult<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
            return Err(StoreError::new(
                "A pipeline stage specification object must contain exactly one field",
            ));
        };
        documents = apply_stage(documents, name, spec)?;
    }
    Ok(documents)
}

fn apply_stage(documents: Vec<Document>, name: &str, spec: &Bson) -> StoreResult<Vec<Document>> {
    match name {
        "$match" => {
            let filter = stage_document(name, spec)?;
            let mut kept = Vec::with_capacity(documents.len());
            for document in documents {
                if matches(&document, filter)? {
                    kept.push(document);
                }
            }
            Ok(kept)
        }
        "$sort" => {
            let mut documents = documents;
            sort_documents(&mut documents, stage_document(name, spec)?)?;
            Ok(documents)
        }
        "$skip" => {
            let skip = stage_count(name, spec)?;
            Ok(documents.into_iter().skip(skip).collect())
        }
        "$limit" => {
            let limit = stage_count(name, spec)?;
            if limit == 0 {
                return Err(StoreError::new("the limit must be positive"));
            }
            let mut documents = documents;
            documents.truncate(limit);
            Ok(documents)
        }
        "$count" => {
            let Bson::String(field) = spec else {
                return Err(StoreError::new("the count field must be a non-empty string"));
            };
            if field.is_empty() || field.starts_with('$') || field.contains('.') {
                return Err(StoreError::new(format!("invalid $count field name '{field}'")));
            }
            if documents.is_empty() {
                return Ok(Vec::new());
            }
            let count = i32::try_from(documents.len())
                .map(Bson::Int32)
                .unwrap_or_else(|_| Bson::Int64(documents.len() as i64));
            let mut result = Document::new();
            result.insert(field.as_str(), count);
            Ok(vec![result])
        }
        "$facet" => {
            let facets = stage_document(name, spec)?;
            let mut result = Document::new();
            for (facet, stages) in facets {
                let Bson::Array(stages) = stages else {
                    return Err(StoreError::new(format!(
                        "arguments to $facet must be arrays, {facet} is not"
                    )));
                };
                let stages = stages
                    .iter()
                    .map(|stage| match stage {
                        Bson::Document(stage) => Ok(stage.clone()),
                        _ => Err(StoreError::new("pipeline stages must be objects")),
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                let output = run(documents.clone(), &stages)?;
                result.insert(
                    facet.as_str(),
                    Bson::Array(output.into_iter().map(Bson::Document).collect()),
                );
            }
            Ok(vec![result])
        }
        other => Err(StoreError::new(format!(
            "Unrecognized pipeline stage name: '{other}'"
        ))),
    }
}

fn stage_document<'a>(name: &str, spec: &'a Bson) -> StoreResult<&'a Document> {
    match spec {
        Bson::Document(document) => Ok(document),
        _ => Err(StoreError::new(format!("the {name} stage specification must be an object"))),
    }
}

fn stage_count(name: &str, spec: &Bson) -> StoreResult<usize> {
    let count = match spec {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => return Err(StoreError::new(format!("{name} must be an integer"))),
    };
    usize::try_from(count).map_err(|_| StoreError::new(format!("{name} must be non-negative")))
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn numbers(n: i32) -> Vec<Document> {
        (1..=n).map(|i| doc! { "n": i, "even": i % 2 == 0 }).collect()
    }

    fn values(documents: &[Bson]) -> Vec<i32> {
        documents
            .iter()
            .filter_map(Bson::as_document)
            .map(|d| d.get_i32("n").unwrap())
            .collect()
    }

    #[test]
    fn test_match_sort_skip_limit() {
        let pipeline = vec![
            doc! { "$match": { "even": true } },
            doc! { "$sort": { "n": -1 } },
            doc! { "$skip": 1_i64 },
            doc! { "$limit": 2_i64 },
        ];
        let output = run(numbers(10), &pipeline).unwrap();
        let order: Vec<i32> = output.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![8, 6]);
    }

    #[test]
    fn test_count_emits_nothing_for_no_input() {
        let output = run(Vec::new(), &[doc! { "$count": "count" }]).unwrap();
        assert!(output.is_empty());

        let output = run(numbers(3), &[doc! { "$count": "count" }]).unwrap();
        assert_eq!(output, vec![doc! { "count": 3_i32 }]);
    }

    #[test]
    fn test_facet_runs_each_branch_on_the_same_input() {
        let pipeline = vec![
            doc! { "$match": { "n": { "$gt": 2_i32 } } },
            doc! { "$facet": {
                "count": [{ "$count": "count" }],
                "data": [{ "$sort": { "n": 1 } }, { "$skip": 2_i64 }, { "$limit": 3_i64 }],
            } },
        ];
        let output = run(numbers(10), &pipeline).unwrap();
        assert_eq!(output.len(), 1);
        let facet = &output[0];
        assert_eq!(facet.get_array("count").unwrap(), &vec![Bson::Document(doc! { "count": 8_i32 })]);
        assert_eq!(values(facet.get_array("data").unwrap()), vec![5, 6, 7]);
    }

    #[test]
    fn test_facet_over_empty_input() {
        let pipeline = vec![doc! { "$facet": {
            "count": [{ "$count": "count" }],
            "data": [{ "$limit": 5_i64 }],
        } }];
        let output = run(Vec::new(), &pipeline).unwrap();
        assert_eq!(output, vec![doc! { "count": [], "data": [] }]);
    }

    #[test]
    fn test_invalid_stages() {
        assert!(run(numbers(1), &[doc! { "$limit": 0_i64 }]).is_err());
        assert!(run(numbers(1), &[doc! { "$skip": -1_i64 }]).is_err());
        assert!(run(numbers(1), &[doc! { "$group": { "_id": Bson::Null } }]).is_err());
        assert!(run(numbers(1), &[doc! { "$match": {}, "$limit": 1_i64 }]).is_err());
        assert!(run(numbers(1), &[doc! {}]).is_err());
    }
}
