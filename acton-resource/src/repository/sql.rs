//! Statement builders for the generic repository
//!
//! Every builder returns an unexecuted `QueryBuilder` so the rendered SQL can
//! be inspected with `.sql()`.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Entity, Value};
use crate::query::{quote_ident, QueryControl};

fn push_owner<M: Entity>(builder: &mut QueryBuilder<'static, Postgres>, owner: Option<&str>) {
    if let Some(owner) = owner {
        builder.push(" AND ");
        builder.push(quote_ident(M::OWNER_COLUMN));
        builder.push("::text = ");
        builder.push_bind(owner.to_string());
    }
}

fn push_id_and_live<M: Entity>(builder: &mut QueryBuilder<'static, Postgres>, id: Uuid) {
    builder.push(" WHERE ");
    builder.push(quote_ident(M::ID_COLUMN));
    builder.push(" = ");
    builder.push_bind(id);
    builder.push(" AND ");
    builder.push(quote_ident(M::DELETED_AT_COLUMN));
    builder.push(" IS NULL");
}

/// `INSERT INTO ... RETURNING *`
pub fn insert<M: Entity>(changes: Vec<(&'static str, Value)>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("INSERT INTO ");
    builder.push(quote_ident(M::TABLE));

    if changes.is_empty() {
        builder.push(" DEFAULT VALUES RETURNING *");
        return builder;
    }

    builder.push(" (");
    for (index, (column, _)) in changes.iter().enumerate() {
        if index > 0 {
            builder.push(", ");
        }
        builder.push(quote_ident(column));
    }
    builder.push(") VALUES (");
    for (index, (_, value)) in changes.into_iter().enumerate() {
        if index > 0 {
            builder.push(", ");
        }
        value.push_to(&mut builder);
    }
    builder.push(") RETURNING *");
    builder
}

/// `SELECT *` of one live row, optionally owner scoped
pub fn select_one<M: Entity>(id: Uuid, owner: Option<&str>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM ");
    builder.push(quote_ident(M::TABLE));
    push_id_and_live::<M>(&mut builder, id);
    push_owner::<M>(&mut builder, owner);
    builder
}

/// `SELECT COUNT(*)` of the live rows matching the filters
pub fn count<M: Entity>(control: &QueryControl, owner: Option<&str>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
    builder.push(quote_ident(M::TABLE));
    control.push_where(&mut builder, M::DELETED_AT_COLUMN);
    push_owner::<M>(&mut builder, owner);
    builder
}

/// One page of live rows matching the filters
pub fn select_many<M: Entity>(
    control: &QueryControl,
    owner: Option<&str>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM ");
    builder.push(quote_ident(M::TABLE));
    control.push_where(&mut builder, M::DELETED_AT_COLUMN);
    push_owner::<M>(&mut builder, owner);
    control.push_order_and_page(&mut builder);
    builder
}

/// `UPDATE ... SET ... RETURNING *` of one live row
///
/// `changes` must not be empty.
pub fn update<M: Entity>(
    id: Uuid,
    changes: Vec<(&'static str, Value)>,
    owner: Option<&str>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("UPDATE ");
    builder.push(quote_ident(M::TABLE));
    builder.push(" SET ");
    for (index, (column, value)) in changes.into_iter().enumerate() {
        if index > 0 {
            builder.push(", ");
        }
        builder.push(quote_ident(column));
        builder.push(" = ");
        value.push_to(&mut builder);
    }
    push_id_and_live::<M>(&mut builder, id);
    push_owner::<M>(&mut builder, owner);
    builder.push(" RETURNING *");
    builder
}
