//! Field name introspection for query types
//!
//! A query type lists the URL parameters a list endpoint accepts. Deriving
//! [`FieldNames`] on it produces those names in wire casing, which
//! [`crate::query::validate_query`] uses as the allow-list.
//!
//! ```rust
//! use acton_resource::introspect::{field_names, FieldNames};
//! use acton_resource::query::PageQuery;
//!
//! #[derive(FieldNames)]
//! struct ItemQuery {
//!     name: Option<String>,
//!     owner_id: Option<String>,
//!     #[field_names(nested)]
//!     page: PageQuery,
//! }
//!
//! assert_eq!(
//!     field_names::<ItemQuery>(),
//!     vec!["name", "ownerId", "sortBy", "sort", "limit", "offset"]
//! );
//! ```

use std::collections::HashSet;

pub use acton_resource_macros::FieldNames;

/// Types that can enumerate their externally visible field names
///
/// Names are lowerCamelCase. Nested types contribute their own names in
/// place of the parent field. Types without named fields return an empty
/// list, which callers treat as "nothing allowed".
pub trait FieldNames {
    /// Field names in declaration order
    fn field_names() -> Vec<String>;
}

/// Field names of `T` with duplicates removed, first occurrence wins
pub fn field_names<T: FieldNames>() -> Vec<String> {
    let mut seen = HashSet::new();
    T::field_names()
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Field names of the type of `value`
pub fn field_names_of<T: FieldNames>(_value: &T) -> Vec<String> {
    field_names::<T>()
}

/// Lowercase the first character of `name`
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
