//! Procedural macros for acton-resource
//!
//! - `#[derive(FieldNames)]` - enumerate the wire field names of a query type
//! - `#[derive(Changeset)]` - map a write payload onto table columns

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod changeset;
mod field_names;
mod util;

/// Derive `acton_resource::introspect::FieldNames`.
///
/// Field names are rendered in lowerCamelCase (`sort_by` becomes `sortBy`).
///
/// # Attributes
///
/// - `#[field_names(nested)]` - splice the child type's names instead of this field's name.
///   `Option<T>` is unwrapped to `T`.
/// - `#[field_names(rename = "name")]` - use an explicit wire name
/// - `#[field_names(skip)]` - leave the field out
///
/// Enums, tuple structs and unit structs produce an empty list.
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, FieldNames)]
/// #[serde(rename_all = "camelCase")]
/// struct ItemQuery {
///     name: Option<String>,
///     owner_id: Option<String>,
///     #[serde(flatten)]
///     #[field_names(nested)]
///     page: PageQuery,
/// }
///
/// // ["name", "ownerId", "sortBy", "sort", "limit", "offset"]
/// let allowed = ItemQuery::field_names();
/// ```
#[proc_macro_derive(FieldNames, attributes(field_names))]
pub fn derive_field_names(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    field_names::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `acton_resource::repository::Changeset`.
///
/// Every named field becomes a `(column, Value)` pair. Columns default to the
/// snake_case field name. Fields of type `Option<T>` are only included when
/// they are `Some`, which gives partial-update semantics; use
/// `Option<Option<T>>` to be able to set a column to NULL explicitly.
///
/// # Attributes
///
/// - `#[changeset(column = "name")]` - explicit column name
/// - `#[changeset(skip)]` - leave the field out
///
/// # Example
///
/// ```ignore
/// #[derive(Deserialize, Validate, Changeset)]
/// #[serde(deny_unknown_fields, rename_all = "camelCase")]
/// struct UpdateItem {
///     name: Option<String>,
///     description: Option<Option<String>>,
/// }
/// ```
#[proc_macro_derive(Changeset, attributes(changeset))]
pub fn derive_changeset(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    changeset::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
