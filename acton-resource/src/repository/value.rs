//! Column values written by create and update statements

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub use acton_resource_macros::Changeset;

/// A write payload mapped onto table columns
///
/// Usually derived. `Option` fields left as `None` are not part of the
/// changeset, so the same type works for partial updates. An
/// `Option<Option<T>>` field set to `Some(None)` writes NULL; decode it with
/// [`double_option`](crate::query::de::double_option) so that a JSON `null`
/// reaches it.
///
/// ```rust
/// use acton_resource::query::de;
/// use acton_resource::repository::{Changeset, Value};
/// use serde::Deserialize;
///
/// #[derive(Deserialize, Changeset)]
/// struct UpdateItem {
///     name: Option<String>,
///     #[serde(default, deserialize_with = "de::double_option")]
///     description: Option<Option<String>>,
///     #[changeset(column = "qty")]
///     quantity: Option<i32>,
/// }
///
/// let update: UpdateItem =
///     serde_json::from_str(r#"{"description": null, "quantity": 3}"#).unwrap();
/// assert_eq!(
///     update.changes(),
///     vec![("description", Value::Null), ("qty", Value::Int(3))]
/// );
/// ```
pub trait Changeset {
    /// `(column, value)` pairs to write
    fn changes(&self) -> Vec<(&'static str, Value)>;
}

/// Owned value bound into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer value
    Int(i64),
    /// 64-bit floating point value
    Float(f64),
    /// String value
    Text(String),
    /// UUID value
    Uuid(Uuid),
    /// Timestamp with time zone
    Timestamp(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
    /// JSON document
    Json(serde_json::Value),
}

impl Value {
    /// Whether this is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Append this value as a bound parameter
    ///
    /// NULL is written literally so it fits a column of any type.
    pub(crate) fn push_to(self, builder: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Self::Null => {
                builder.push("NULL");
            }
            Self::Bool(v) => {
                builder.push_bind(v);
            }
            Self::Int(v) => {
                builder.push_bind(v);
            }
            Self::Float(v) => {
                builder.push_bind(v);
            }
            Self::Text(v) => {
                builder.push_bind(v);
            }
            Self::Uuid(v) => {
                builder.push_bind(v);
            }
            Self::Timestamp(v) => {
                builder.push_bind(v);
            }
            Self::Date(v) => {
                builder.push_bind(v);
            }
            Self::Json(v) => {
                builder.push_bind(sqlx::types::Json(v));
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Self::Float(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl From<serde_json::Value> for Value {
    fn from(doc: serde_json::Value) -> Self {
        match doc {
            serde_json::Value::Null => Self::Null,
            doc => Self::Json(doc),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Changeset)]
    struct CreateItem {
        name: String,
        quantity: i32,
        description: Option<String>,
        owner: Uuid,
        #[changeset(skip)]
        #[allow(dead_code)]
        confirm: bool,
    }

    #[derive(Changeset)]
    struct UpdateItem {
        name: Option<String>,
        #[changeset(column = "notes")]
        description: Option<Option<String>>,
        tags: Option<serde_json::Value>,
    }

    #[test]
    fn test_required_fields_are_always_written() {
        let owner = Uuid::new_v4();
        let create = CreateItem {
            name: "lamp".to_string(),
            quantity: 2,
            description: None,
            owner,
            confirm: true,
        };

        assert_eq!(
            create.changes(),
            vec![
                ("name", Value::Text("lamp".to_string())),
                ("quantity", Value::Int(2)),
                ("owner", Value::Uuid(owner)),
            ]
        );
    }

    #[test]
    fn test_partial_update_only_writes_set_fields() {
        let update = UpdateItem {
            name: Some("desk".to_string()),
            description: None,
            tags: None,
        };
        assert_eq!(
            update.changes(),
            vec![("name", Value::Text("desk".to_string()))]
        );
    }

    #[test]
    fn test_double_option_writes_explicit_null() {
        let update = UpdateItem {
            name: None,
            description: Some(None),
            tags: Some(serde_json::json!(["a"])),
        };
        assert_eq!(
            update.changes(),
            vec![
                ("notes", Value::Null),
                ("tags", Value::Json(serde_json::json!(["a"]))),
            ]
        );
    }

    #[test]
    fn test_empty_update() {
        let update = UpdateItem {
            name: None,
            description: None,
            tags: None,
        };
        assert!(update.changes().is_empty());
    }

    #[test]
    fn test_null_is_written_literally() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        Value::Null.push_to(&mut builder);
        builder.push(", ");
        Value::from("x").push_to(&mut builder);
        assert_eq!(builder.sql(), "SELECT NULL, $1");
    }

    #[test]
    fn test_json_null_becomes_sql_null() {
        assert!(Value::from(serde_json::Value::Null).is_null());
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::from(Some(5_u32)), Value::Int(5));
    }
}
