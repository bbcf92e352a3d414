//! Field deserializers for query and body values
//!
//! Query values arrive as strings, or as sequences of strings when a key is
//! repeated. Use these with `#[serde(default, deserialize_with = "...")]`.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse an optional numeric parameter given as a string
///
/// ```rust
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Page {
///     #[serde(default, deserialize_with = "acton_resource::query::de::number")]
///     limit: Option<u32>,
/// }
///
/// let page: Page = serde_json::from_value(serde_json::json!({ "limit": "25" })).unwrap();
/// assert_eq!(page.limit, Some(25));
/// ```
pub fn number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.is_empty() => Ok(None),
        Some(Value::String(text)) => text.parse().map(Some).map_err(|e| {
            D::Error::custom(format!("invalid number '{}': {}", text, e))
        }),
        Some(Value::Number(number)) => {
            let text = number.to_string();
            text.parse()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid number '{}': {}", text, e)))
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected a single number, found {}",
            other
        ))),
    }
}

/// Accept either a single value or a repeated key as a list
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(vec![text])),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => Ok(text),
                other => Err(D::Error::custom(format!("expected a string, found {}", other))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or a list of strings, found {}",
            other
        ))),
    }
}

/// Tell an explicit `null` apart from a missing field
///
/// A missing field stays `None` (through `#[serde(default)]`), `null` becomes
/// `Some(None)` and a value becomes `Some(Some(value))`. Paired with a
/// [`Changeset`](crate::repository::Changeset) this lets an update clear a
/// nullable column.
///
/// ```rust
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct UpdateItem {
///     #[serde(default, deserialize_with = "acton_resource::query::de::double_option")]
///     description: Option<Option<String>>,
/// }
///
/// let cleared: UpdateItem = serde_json::from_str(r#"{"description": null}"#).unwrap();
/// assert_eq!(cleared.description, Some(None));
///
/// let untouched: UpdateItem = serde_json::from_str("{}").unwrap();
/// assert_eq!(untouched.description, None);
/// ```
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
