//! Pagination types and the paginated aggregation protocol
//!
//! A page is fetched with one aggregation: the filter runs once in `$match`, then a `$facet`
//! splits the matches into a `count` branch (total across all pages) and a `data` branch
//! (sorted, skipped and limited to the requested page).
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use mongo_rice::repository::{build_page_pipeline, Pagination};
//!
//! let pipeline = build_page_pipeline(doc! { "genre": "jazz" }, doc! { "_id": -1 }, &Pagination::page(3, 10));
//! assert_eq!(pipeline.len(), 2);
//! assert_eq!(pipeline[0], doc! { "$match": { "genre": "jazz" } });
//! ```

use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

/// Name of the facet branch carrying the total count
pub const COUNT_FACET: &str = "count";
/// Name of the facet branch carrying the page's documents
pub const DATA_FACET: &str = "data";

/// Offset and limit for one page of results
///
/// # Example
///
/// ```rust
/// use mongo_rice::repository::Pagination;
///
/// let page3 = Pagination::page(3, 20); // Page 3 with 20 items per page
/// assert_eq!(page3.offset, 40); // Skip first 2 pages (40 items)
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Create pagination for a specific page number (1-indexed)
    ///
    /// The offset saturates rather than overflowing for absurd page numbers.
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

/// Calculate total pages, rounding up
///
/// `page_size` of zero is treated as one.
///
/// # Example
///
/// ```rust
/// use mongo_rice::repository::calculate_total_pages;
///
/// assert_eq!(calculate_total_pages(25, 10), 3);
/// assert_eq!(calculate_total_pages(0, 10), 0);
/// ```
#[must_use]
pub fn calculate_total_pages(total: u64, page_size: u64) -> u64 {
    total.div_ceil(page_size.max(1))
}

/// One page of results with the totals needed to navigate the rest
///
/// # Example
///
/// ```rust
/// use mongo_rice::repository::PaginatedResult;
///
/// let page = PaginatedResult::new(vec!["a", "b"], 25, 2, 10);
/// assert_eq!(page.total_pages, 3);
/// assert!(page.has_next_page());
/// assert!(page.has_previous_page());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Matching items across all pages
    pub total_count: u64,
    /// Page number (1-indexed)
    pub page_number: u64,
    /// Requested page size
    pub page_size: u64,
    /// Number of pages at this page size
    pub total_pages: u64,
}

impl<T> PaginatedResult<T> {
    /// Create a page, deriving `total_pages`
    #[must_use]
    pub fn new(items: Vec<T>, total_count: u64, page_number: u64, page_size: u64) -> Self {
        Self {
            items,
            total_count,
            page_number,
            page_size,
            total_pages: calculate_total_pages(total_count, page_size),
        }
    }

    /// A page past the last one exists
    pub fn has_next_page(&self) -> bool {
        self.page_number < self.total_pages
    }

    /// A page before this one exists
    pub fn has_previous_page(&self) -> bool {
        self.page_number > 1
    }

    /// Convert every item, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }

    /// Convert every item with a fallible function, keeping the page metadata
    ///
    /// # Errors
    ///
    /// The first error returned by `f`.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PaginatedResult<U>, E> {
        Ok(PaginatedResult {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
            total_pages: self.total_pages,
        })
    }
}

/// Build the two-facet aggregation for one page
#[must_use]
pub fn build_page_pipeline(
    filter: Document,
    sort: Document,
    pagination: &Pagination,
) -> Vec<Document> {
    let skip = i64::try_from(pagination.offset).unwrap_or(i64::MAX);
    let limit = i64::try_from(pagination.limit).unwrap_or(i64::MAX);
    vec![
        doc! { "$match": filter },
        doc! {
            "$facet": {
                COUNT_FACET: [{ "$count": COUNT_FACET }],
                DATA_FACET: [
                    { "$sort": sort },
                    { "$skip": skip },
                    { "$limit": limit },
                ],
            }
        },
    ]
}

/// Read the total count and the page's documents from the facet output
///
/// An empty `count` branch (no matches) reads as zero. An empty output reads as an empty page.
pub(crate) fn parse_page_facet(output: Vec<Document>) -> Result<(u64, Vec<Document>), String> {
    let Some(facet) = output.into_iter().next() else {
        return Ok((0, Vec::new()));
    };

    let total = match facet.get_array(COUNT_FACET) {
        Ok(counts) => match counts.first() {
            None => 0,
            Some(Bson::Document(count)) => match count.get(COUNT_FACET) {
                Some(Bson::Int32(n)) => u64::try_from(*n).map_err(|e| e.to_string())?,
                Some(Bson::Int64(n)) => u64::try_from(*n).map_err(|e| e.to_string())?,
                other => return Err(format!("unexpected count value {other:?}")),
            },
            Some(other) => return Err(format!("unexpected count entry {other}")),
        },
        Err(_) => return Err(format!("aggregation output has no '{COUNT_FACET}' facet")),
    };

    let data = facet
        .get_array(DATA_FACET)
        .map_err(|_| format!("aggregation output has no '{DATA_FACET}' facet"))?
        .iter()
        .map(|entry| match entry {
            Bson::Document(document) => Ok(document.clone()),
            other => Err(format!("unexpected data entry {other}")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((total, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_page() {
        let page1 = Pagination::page(1, 20);
        assert_eq!(page1.offset, 0);
        assert_eq!(page1.limit, 20);

        let page3 = Pagination::page(3, 20);
        assert_eq!(page3.offset, 40);
        assert_eq!(page3.limit, 20);
    }

    #[test]
    fn test_pagination_page_saturates() {
        let page = Pagination::page(u64::MAX, u64::MAX);
        assert_eq!(page.offset, u64::MAX);
    }

    #[test]
    fn test_pagination_default() {
        let pagination = Pagination::default();
        assert_eq!(pagination.offset, 0);
        assert_eq!(pagination.limit, 20);
    }

    #[test]
    fn test_calculate_total_pages() {
        assert_eq!(calculate_total_pages(0, 10), 0);
        assert_eq!(calculate_total_pages(1, 10), 1);
        assert_eq!(calculate_total_pages(10, 10), 1);
        assert_eq!(calculate_total_pages(11, 10), 2);
        assert_eq!(calculate_total_pages(25, 10), 3);
        assert_eq!(calculate_total_pages(5, 0), 5);
        assert_eq!(calculate_total_pages(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_total_pages_matches_ceiling_for_many_sizes() {
        for total in 0..60_u64 {
            for size in 1..12_u64 {
                let expected = (total as f64 / size as f64).ceil() as u64;
                assert_eq!(calculate_total_pages(total, size), expected, "{total}/{size}");
            }
        }
    }

    #[test]
    fn test_paginated_result_navigation() {
        let first = PaginatedResult::new(vec![1, 2], 5, 1, 2);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next_page());
        assert!(!first.has_previous_page());

        let last = PaginatedResult::new(vec![5], 5, 3, 2);
        assert!(!last.has_next_page());
        assert!(last.has_previous_page());

        let empty: PaginatedResult<i32> = PaginatedResult::new(Vec::new(), 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page());
        assert!(!empty.has_previous_page());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = PaginatedResult::new(vec![1, 2, 3], 13, 2, 3).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20, 30]);
        assert_eq!(page.total_count, 13);
        assert_eq!(page.page_number, 2);
        assert_eq!(page.page_size, 3);
        assert_eq!(page.total_pages, 5);
    }

    #[test]
    fn test_try_map_stops_at_first_error() {
        let page = PaginatedResult::new(vec!["1", "x", "3"], 3, 1, 3);
        let parsed = page.try_map(|s| s.parse::<i32>());
        assert!(parsed.is_err());
    }

    #[test]
    fn test_build_page_pipeline() {
        let pipeline = build_page_pipeline(
            doc! { "genre": "jazz" },
            doc! { "_id": -1 },
            &Pagination::page(3, 10),
        );
        assert_eq!(
            pipeline,
            vec![
                doc! { "$match": { "genre": "jazz" } },
                doc! { "$facet": {
                    "count": [{ "$count": "count" }],
                    "data": [
                        { "$sort": { "_id": -1 } },
                        { "$skip": 20_i64 },
                        { "$limit": 10_i64 },
                    ],
                } },
            ]
        );
    }

    #[test]
    fn test_parse_page_facet() {
        let output = vec![doc! {
            "count": [{ "count": 25_i32 }],
            "data": [{ "n": 1 }, { "n": 2 }],
        }];
        let (total, data) = parse_page_facet(output).unwrap();
        assert_eq!(total, 25);
        assert_eq!(data, vec![doc! { "n": 1 }, doc! { "n": 2 }]);
    }

    #[test]
    fn test_parse_page_facet_without_matches() {
        let (total, data) = parse_page_facet(vec![doc! { "count": [], "data": [] }]).unwrap();
        assert_eq!(total, 0);
        assert!(data.is_empty());

        let (total, data) = parse_page_facet(Vec::new()).unwrap();
        assert_eq!(total, 0);
        assert!(data.is_empty());
    }

    #[test]
    fn test_parse_page_facet_rejects_malformed_output() {
        assert!(parse_page_facet(vec![doc! { "data": [] }]).is_err());
        assert!(parse_page_facet(vec![doc! { "count": [], "data": "nope" }]).is_err());
        assert!(parse_page_facet(vec![doc! { "count": [{ "count": "many" }], "data": [] }]).is_err());
        assert!(parse_page_facet(vec![doc! { "count": [{ "count": -1_i32 }], "data": [] }]).is_err());
    }
}
