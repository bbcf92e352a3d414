//! URL query validation, filtering and pagination
//!
//! A list request carries two kinds of parameters:
//!
//! - control parameters (`sortBy`, `sort`, `limit`, `offset`) that drive
//!   ordering and paging
//! - every other key, which becomes an equality (one value) or membership
//!   (repeated key) filter on the snake_case column of the same name
//!
//! Keys are checked against an allow-list before anything else happens, so a
//! query is either applied in full or rejected.
//!
//! ```rust
//! use acton_resource::query::{validate_query, QueryControl, QueryParams, FilterOp};
//!
//! let params = QueryParams::from_pairs([
//!     ("status", "active"),
//!     ("status", "archived"),
//!     ("sortBy", "name"),
//! ]);
//! let allowed = vec!["status".to_string(), "sortBy".to_string()];
//! validate_query(&allowed, &params).unwrap();
//!
//! let control = QueryControl::from_params(&params).unwrap();
//! assert_eq!(control.filters.len(), 1);
//! assert_eq!(control.filters[0].op, FilterOp::In);
//! assert_eq!(control.pagination.sort_field, "name");
//! ```

mod bind;
pub mod de;

use std::collections::BTreeMap;

use axum::extract::{FromRequestParts, Query};
use axum::http::{request::Parts, Uri};
use convert_case::{Case, Casing};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ApiError, ApiOperation};
use crate::introspect::FieldNames;

/// Reserved parameter selecting the sort column
pub const SORT_BY_PARAM: &str = "sortBy";
/// Reserved parameter selecting the sort direction
pub const SORT_PARAM: &str = "sort";
/// Reserved parameter for the page size
pub const LIMIT_PARAM: &str = "limit";
/// Reserved parameter for the row offset
pub const OFFSET_PARAM: &str = "offset";

/// Parameters that never become filters
pub const CONTROL_PARAMS: [&str; 4] = [SORT_BY_PARAM, SORT_PARAM, LIMIT_PARAM, OFFSET_PARAM];

/// Default sort column
pub const DEFAULT_SORT_FIELD: &str = "created_at";
/// Default page size
pub const DEFAULT_LIMIT: i64 = 10;
/// Default row offset
pub const DEFAULT_OFFSET: i64 = 0;

/// URL query as a multimap of key to values
///
/// Keys are kept sorted; values keep the order in which they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, value)` pairs, collecting repeated keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.push(key, value);
        }
        params
    }

    /// Parse the query string of a request URI
    pub fn from_uri(uri: &Uri) -> Result<Self, ApiError> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).map_err(|e| {
            ApiError::invalid_payload(format!("Invalid query string: {}", e.body_text()))
                .with_operation(ApiOperation::List)
        })?;
        Ok(Self::from_pairs(pairs))
    }

    /// Append a value for `key`
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// All values for `key`
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// First value for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|values| values.first()).map(String::as_str)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys present in the query
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over `(key, values)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the query is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind the parameters onto a typed query
    ///
    /// Scalar fields take the first value of a repeated key, sequence fields
    /// take all of them.
    pub fn bind<Q: DeserializeOwned>(&self) -> Result<Q, ApiError> {
        Q::deserialize(bind::ParamsDeserializer::new(self)).map_err(|e| {
            ApiError::invalid_payload(format!("Invalid query parameters: {}", e))
                .with_operation(ApiOperation::List)
        })
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_uri(&parts.uri)
    }
}

/// Reject the query if it has any key outside `allowed`
pub fn validate_query(allowed: &[String], raw: &QueryParams) -> Result<(), ApiError> {
    let unknown: Vec<&str> = raw
        .keys()
        .filter(|key| !allowed.iter().any(|name| name == key))
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }

    let message = format!(
        "The following field(s) are not allowed: {}. Allowed fields are: {}",
        unknown.join(", "),
        allowed.join(", ")
    );
    tracing::debug!(unknown = ?unknown, "Rejected query with unknown fields");
    Err(ApiError::invalid_payload(message).with_operation(ApiOperation::List))
}

/// Reject a `sortBy` value that names none of the sortable fields
///
/// Sortable fields are the allowed fields other than the control parameters,
/// plus the default sort field.
pub fn validate_sort_field(allowed: &[String], raw: &QueryParams) -> Result<(), ApiError> {
    let Some(sort_by) = raw.first(SORT_BY_PARAM).filter(|value| !value.is_empty()) else {
        return Ok(());
    };

    let default_field = DEFAULT_SORT_FIELD.to_case(Case::Camel);
    let mut sortable: Vec<&str> = allowed
        .iter()
        .map(String::as_str)
        .filter(|name| !CONTROL_PARAMS.contains(name))
        .collect();
    if !sortable.contains(&default_field.as_str()) {
        sortable.push(&default_field);
    }

    if sortable.contains(&sort_by) {
        return Ok(());
    }

    tracing::debug!(sort_by, "Rejected query with unknown sort field");
    Err(ApiError::invalid_payload(format!(
        "Value '{}' for attribute 'sortBy' is not valid. The valid values are: {}",
        sort_by,
        sortable.join(", ")
    ))
    .with_operation(ApiOperation::List))
}

/// Comparison applied by a filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// `column = value`
    Eq,
    /// `column IN (values...)`
    In,
}

/// One filter predicate derived from a query parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterClause {
    /// snake_case column name
    pub column: String,
    /// Comparison
    pub op: FilterOp,
    /// Values, verbatim
    pub values: Vec<String>,
}

/// Convert a wire field name to a column name
pub fn to_column_name(field: &str) -> String {
    field.to_case(Case::Snake)
}

/// Filter clauses for every non-control key
pub fn build_filters(raw: &QueryParams, control_params: &[&str]) -> Vec<FilterClause> {
    raw.iter()
        .filter(|(key, _)| !control_params.contains(key))
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| FilterClause {
            column: to_column_name(key),
            op: if values.len() > 1 {
                FilterOp::In
            } else {
                FilterOp::Eq
            },
            values: values.to_vec(),
        })
        .collect()
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

impl SortDirection {
    /// SQL keyword
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parse `ASC` or `DESC`, ignoring case
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        if value.eq_ignore_ascii_case("ASC") {
            Ok(Self::Asc)
        } else if value.eq_ignore_ascii_case("DESC") {
            Ok(Self::Desc)
        } else {
            Err(ApiError::invalid_payload(format!(
                "Value '{}' for attribute 'sort' is not valid. The valid values are: ASC, DESC",
                value
            ))
            .with_operation(ApiOperation::List))
        }
    }
}

/// Ordering and paging of a list query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationControl {
    /// snake_case sort column
    pub sort_field: String,
    /// Sort direction
    pub direction: SortDirection,
    /// Page size
    pub limit: i64,
    /// Rows to skip
    pub offset: i64,
}

impl Default for PaginationControl {
    fn default() -> Self {
        Self {
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            direction: SortDirection::Desc,
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

fn parse_non_negative(name: &str, value: &str) -> Result<i64, ApiError> {
    match value.trim().parse::<i64>() {
        Ok(parsed) if parsed >= 0 => Ok(parsed),
        _ => Err(ApiError::invalid_payload(format!(
            "Value '{}' for attribute '{}' is not of type: non-negative integer",
            value, name
        ))
        .with_operation(ApiOperation::List)),
    }
}

fn parse_positive(name: &str, value: &str) -> Result<i64, ApiError> {
    match value.trim().parse::<i64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ApiError::invalid_payload(format!(
            "Value '{}' for attribute '{}' is not of type: positive integer",
            value, name
        ))
        .with_operation(ApiOperation::List)),
    }
}

/// Resolve the control parameters, applying defaults
pub fn resolve_pagination(raw: &QueryParams) -> Result<PaginationControl, ApiError> {
    let mut control = PaginationControl::default();

    if let Some(sort_by) = raw.first(SORT_BY_PARAM).filter(|value| !value.is_empty()) {
        control.sort_field = to_column_name(sort_by);
    }
    if let Some(sort) = raw.first(SORT_PARAM) {
        control.direction = SortDirection::parse(sort)?;
    }
    if let Some(limit) = raw.first(LIMIT_PARAM) {
        control.limit = parse_positive(LIMIT_PARAM, limit)?;
    }
    if let Some(offset) = raw.first(OFFSET_PARAM) {
        control.offset = parse_non_negative(OFFSET_PARAM, offset)?;
    }

    Ok(control)
}

/// Filters plus pagination for one list request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryControl {
    /// Filter clauses
    pub filters: Vec<FilterClause>,
    /// Ordering and paging
    pub pagination: PaginationControl,
}

impl QueryControl {
    /// Build from the raw URL query
    pub fn from_params(raw: &QueryParams) -> Result<Self, ApiError> {
        Ok(Self {
            filters: build_filters(raw, &CONTROL_PARAMS),
            pagination: resolve_pagination(raw)?,
        })
    }
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(feature = "database")]
impl QueryControl {
    /// Append `WHERE <soft delete> AND <filters...>`
    ///
    /// The soft-delete predicate always comes first. Filter values are bound
    /// and compared as text.
    pub fn push_where<'args>(
        &self,
        builder: &mut sqlx::QueryBuilder<'args, sqlx::Postgres>,
        deleted_at_column: &str,
    ) {
        builder.push(" WHERE ");
        builder.push(quote_ident(deleted_at_column));
        builder.push(" IS NULL");

        for filter in self.filters.iter().filter(|filter| !filter.values.is_empty()) {
            builder.push(" AND ");
            builder.push(quote_ident(&filter.column));
            match (filter.op, filter.values.as_slice()) {
                (FilterOp::Eq, [value, ..]) | (FilterOp::In, [value]) => {
                    builder.push("::text = ");
                    builder.push_bind(value.clone());
                }
                _ => {
                    builder.push("::text IN (");
                    let mut values = builder.separated(", ");
                    for value in &filter.values {
                        values.push_bind(value.clone());
                    }
                    values.push_unseparated(")");
                }
            }
        }
    }

    /// Append `ORDER BY ... LIMIT ... OFFSET ...`
    pub fn push_order_and_page<'args>(&self, builder: &mut sqlx::QueryBuilder<'args, sqlx::Postgres>) {
        builder.push(" ORDER BY ");
        builder.push(quote_ident(&self.pagination.sort_field));
        builder.push(" ");
        builder.push(self.pagination.direction.as_sql());
        builder.push(" LIMIT ");
        builder.push_bind(self.pagination.limit);
        builder.push(" OFFSET ");
        builder.push_bind(self.pagination.offset);
    }
}

/// Ready-made query fragment for the control parameters
///
/// Nest it in a list query type to accept paging parameters:
///
/// ```rust
/// use acton_resource::introspect::FieldNames;
/// use acton_resource::query::PageQuery;
/// use serde::Deserialize;
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate, FieldNames)]
/// #[serde(rename_all = "camelCase")]
/// struct ItemQuery {
///     status: Option<String>,
///     #[serde(flatten)]
///     #[validate(nested)]
///     #[field_names(nested)]
///     page: PageQuery,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, FieldNames)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// Sort column in wire casing
    pub sort_by: Option<String>,
    /// `ASC` or `DESC`
    pub sort: Option<String>,
    /// Page size
    #[serde(default, deserialize_with = "de::number")]
    #[validate(range(min = 1))]
    pub limit: Option<i64>,
    /// Rows to skip
    #[serde(default, deserialize_with = "de::number")]
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}
