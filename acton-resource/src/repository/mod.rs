//! Generic repository over PostgreSQL tables
//!
//! [`Repository<M>`] provides create, get-one, get-many and update for any
//! entity type that describes its table through [`Entity`]. Every operation
//! runs on the caller's [`UnitOfWork`], so several calls can share one
//! transaction.
//!
//! Rows whose soft-delete column is set are never read or updated. When an
//! owner id is given, reads and updates are further restricted to rows whose
//! owner column matches it.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_resource::repository::{Changeset, Entity, Repository};
//!
//! #[derive(sqlx::FromRow, serde::Serialize)]
//! struct Item {
//!     id: Uuid,
//!     name: String,
//!     user_id: String,
//!     created_at: DateTime<Utc>,
//!     deleted_at: Option<DateTime<Utc>>,
//! }
//!
//! impl Entity for Item {
//!     const TABLE: &'static str = "items";
//!     const NAME: &'static str = "Item";
//! }
//!
//! const ITEMS: Repository<Item> = Repository::new();
//!
//! let mut uow = db.begin().await?;
//! let created = ITEMS.create(&mut uow, &request).await;
//! let item = uow.resolve(created).await?;
//! ```

pub mod sql;
mod value;

use std::marker::PhantomData;

use sqlx::postgres::PgRow;
use sqlx::FromRow;
use uuid::Uuid;

pub use value::{Changeset, Value};

use crate::database::UnitOfWork;
use crate::error::{ApiError, ApiOperation};
use crate::meta::{build_meta, ResponseMeta};
use crate::query::QueryControl;

/// A table-backed resource
///
/// The id column must hold a UUID. The soft-delete column must be a nullable
/// timestamp. The owner column is compared as text.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Name used in errors and logs
    const NAME: &'static str;
    /// Primary key column
    const ID_COLUMN: &'static str = "id";
    /// Column holding the owning user's id
    const OWNER_COLUMN: &'static str = "user_id";
    /// Soft-delete marker column
    const DELETED_AT_COLUMN: &'static str = "deleted_at";
}

/// CRUD operations for entity `M`
pub struct Repository<M> {
    _entity: PhantomData<fn() -> M>,
}

impl<M> Repository<M> {
    /// Create a repository
    pub const fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<M> Default for Repository<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Repository<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Repository<M> {}

impl<M> std::fmt::Debug for Repository<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<M>())
            .finish()
    }
}

impl<M: Entity> Repository<M> {
    /// Insert a row from `request` and return it
    pub async fn create<R>(&self, uow: &mut UnitOfWork, request: &R) -> Result<M, ApiError>
    where
        R: Changeset + ?Sized,
    {
        let mut query = sql::insert::<M>(request.changes());
        let conn = uow.executor().await?;

        match query.build_query_as::<M>().fetch_one(conn).await {
            Ok(entity) => {
                tracing::info!(entity = M::NAME, operation = "create", "Entity created");
                Ok(entity)
            }
            Err(e) => {
                tracing::error!(
                    entity = M::NAME,
                    operation = "create",
                    error = %e,
                    "Inserting new entity failed"
                );
                Err(ApiError::unknown_database(
                    ApiOperation::Create,
                    format!("Could not create {}.", M::NAME),
                )
                .with_entity_type(M::NAME))
            }
        }
    }

    /// Fetch one live row by id
    pub async fn get_one(
        &self,
        uow: &mut UnitOfWork,
        id: Uuid,
        owner: Option<&str>,
    ) -> Result<M, ApiError> {
        let mut query = sql::select_one::<M>(id, owner);
        let conn = uow.executor().await?;

        match query.build_query_as::<M>().fetch_optional(conn).await {
            Ok(Some(entity)) => {
                tracing::debug!(entity = M::NAME, operation = "get", id = %id, "Entity found");
                Ok(entity)
            }
            Ok(None) => {
                tracing::error!(entity = M::NAME, operation = "get", id = %id, "Entity not found");
                Err(ApiError::not_found(M::NAME, id.to_string()))
            }
            Err(e) => {
                tracing::error!(
                    entity = M::NAME,
                    operation = "get",
                    id = %id,
                    error = %e,
                    "Fetching entity failed"
                );
                Err(ApiError::internal(format!("Could not retrieve {}.", M::NAME))
                    .with_entity(M::NAME, id.to_string()))
            }
        }
    }

    /// Fetch one page of live rows and the metadata describing it
    ///
    /// An empty page is not an error.
    pub async fn get_many(
        &self,
        uow: &mut UnitOfWork,
        control: &QueryControl,
        owner: Option<&str>,
    ) -> Result<(Vec<M>, ResponseMeta), ApiError> {
        let mut count_query = sql::count::<M>(control, owner);
        let mut page_query = sql::select_many::<M>(control, owner);
        let conn = uow.executor().await?;

        let fetched = async {
            let total: i64 = count_query.build_query_scalar().fetch_one(&mut *conn).await?;
            let rows = page_query.build_query_as::<M>().fetch_all(&mut *conn).await?;
            Ok::<_, sqlx::Error>((total, rows))
        }
        .await;

        let (total, rows) = fetched.map_err(|e| {
            tracing::error!(
                entity = M::NAME,
                operation = "list",
                error = %e,
                "Listing entities failed"
            );
            ApiError::internal(format!("Could not list {}.", M::NAME))
                .with_operation(ApiOperation::List)
                .with_entity_type(M::NAME)
        })?;

        let meta = build_meta(control.pagination.offset, control.pagination.limit, total)?;
        tracing::debug!(
            entity = M::NAME,
            operation = "list",
            returned = rows.len(),
            total,
            "Entities listed"
        );
        Ok((rows, meta))
    }

    /// Apply the columns set in `request` to one live row and return it
    pub async fn update_one<R>(
        &self,
        uow: &mut UnitOfWork,
        id: Uuid,
        request: &R,
        owner: Option<&str>,
    ) -> Result<M, ApiError>
    where
        R: Changeset + ?Sized,
    {
        let changes = request.changes();
        if changes.is_empty() {
            return Err(ApiError::invalid_payload("No fields to update.")
                .with_operation(ApiOperation::Update)
                .with_entity(M::NAME, id.to_string()));
        }

        if owner.is_some() {
            tracing::debug!(entity = M::NAME, operation = "update", id = %id, "Updating with owner scope");
        }

        let mut query = sql::update::<M>(id, changes, owner);
        let conn = uow.executor().await?;

        match query.build_query_as::<M>().fetch_optional(conn).await {
            Ok(Some(entity)) => {
                tracing::info!(entity = M::NAME, operation = "update", id = %id, "Entity updated");
                Ok(entity)
            }
            Ok(None) => {
                tracing::error!(entity = M::NAME, operation = "update", id = %id, "Entity not found");
                Err(ApiError::not_found(M::NAME, id.to_string()).with_operation(ApiOperation::Update))
            }
            Err(e) => {
                tracing::error!(
                    entity = M::NAME,
                    operation = "update",
                    id = %id,
                    error = %e,
                    "Updating entity failed"
                );
                Err(ApiError::unknown_database(
                    ApiOperation::Update,
                    format!("Could not update {}.", M::NAME),
                )
                .with_entity(M::NAME, id.to_string()))
            }
        }
    }
}
