//! Pagination metadata for list responses

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiOperation};

/// Page size and position echoed back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Requested page size
    pub page_size: i64,
    /// Requested offset
    pub page: i64,
}

/// Metadata attached to every list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Rows matching the filters, ignoring paging
    pub items_total: i64,
    /// Number of pages
    pub pages_total: i64,
    /// Paging that produced this response
    pub pagination: Pagination,
}

/// Compute list metadata from the request paging and the matching row count
///
/// `page` carries the request offset as-is, and `pages_total` is always one
/// more than the number of full pages (10 rows with a limit of 10 report two
/// pages). A limit of zero is rejected.
pub fn build_meta(offset: i64, limit: i64, count: i64) -> Result<ResponseMeta, ApiError> {
    if limit <= 0 {
        return Err(ApiError::invalid_payload(format!(
            "Value '{}' for attribute 'limit' is not of type: positive integer",
            limit
        ))
        .with_operation(ApiOperation::List));
    }

    Ok(ResponseMeta {
        items_total: count,
        pages_total: count / limit + 1,
        pagination: Pagination {
            page_size: limit,
            page: offset,
        },
    })
}
