//! Items API
//!
//! A complete resource service: JWT-protected create, get, list and update
//! of `items`, each request running in its own unit of work.
//!
//! Run from `demos/`, where `config.toml` provides `[database]` and `[auth]`:
//!
//! ```bash
//! cd demos && cargo run --example items-api
//! ```
//!
//! Then:
//!
//! ```bash
//! curl -H "Authorization: Bearer $TOKEN" \
//!      -d '{"name":"lamp","status":"ACTIVE","dueDate":"2026-01-31"}' \
//!      http://localhost:3000/items
//! curl -H "Authorization: Bearer $TOKEN" "http://localhost:3000/items?status=ACTIVE&limit=5"
//! ```

use std::fmt;

use acton_resource::prelude::*;
use acton_resource::query::de;
use acton_resource::validators::{match_ignore_case, validate_date};
use axum::{body::Bytes, extract::Path};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: Uuid,
    name: String,
    status: String,
    due_date: Option<NaiveDate>,
    user_id: String,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Item {
    const TABLE: &'static str = "items";
    const NAME: &'static str = "Item";
}

const ITEMS: Repository<Item> = Repository::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemStatus {
    Active,
    Archived,
}

impl ItemStatus {
    const ALL: [ItemStatus; 2] = [ItemStatus::Active, ItemStatus::Archived];
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Archived => write!(f, "ARCHIVED"),
        }
    }
}

fn validate_status(value: &str) -> std::result::Result<(), validator::ValidationError> {
    match_ignore_case(value, &ItemStatus::ALL).map(|_| ()).map_err(|message| {
        let mut error = validator::ValidationError::new("status");
        error.message = Some(message.into());
        error.add_param("value".into(), &value);
        error
    })
}

fn normalize_status(value: &str) -> std::result::Result<String, ApiError> {
    match_ignore_case(value, &ItemStatus::ALL)
        .map(|status| status.to_string())
        .map_err(ApiError::invalid_payload)
}

fn parse_due_date(value: Option<&str>) -> std::result::Result<Option<NaiveDate>, ApiError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ApiError::invalid_payload(format!(
                    "Value '{}' for attribute 'dueDate' is not of type: date",
                    raw
                ))
            })
        })
        .transpose()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateItem {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(custom(function = "validate_status"))]
    status: String,
    #[validate(custom(function = "validate_date"))]
    due_date: Option<String>,
}

/// Row written on create
#[derive(Changeset)]
struct NewItem {
    name: String,
    status: String,
    due_date: Option<NaiveDate>,
    user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateItem {
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    #[validate(custom(function = "validate_status"))]
    status: Option<String>,
    #[validate(custom(function = "validate_date"))]
    due_date: Option<String>,
}

#[derive(Changeset)]
struct ItemChanges {
    name: Option<String>,
    status: Option<String>,
    due_date: Option<NaiveDate>,
}

// Filters are applied from the raw query; the typed form is the allow-list
#[derive(Debug, Deserialize, Validate, FieldNames)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct ItemQuery {
    #[serde(default, deserialize_with = "de::one_or_many")]
    status: Option<Vec<String>>,
    name: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    #[field_names(nested)]
    page: PageQuery,
}

async fn create_item(
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> std::result::Result<DataResponse<Item>, ApiError> {
    dispatch::create(&body, |request: CreateItem| async move {
        let owner = caller
            .user
            .id
            .clone()
            .or_else(|| caller.user.source.clone())
            .unwrap_or_default();
        let row = NewItem {
            name: request.name,
            status: normalize_status(&request.status)?,
            due_date: parse_due_date(request.due_date.as_deref())?,
            user_id: owner,
        };

        let mut uow = state.require_db()?.begin().await?;
        let created = ITEMS.create(&mut uow, &row).await;
        uow.resolve(created).await
    })
    .await
}

async fn get_item(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
) -> std::result::Result<DataResponse<Item>, ApiError> {
    dispatch::get_one(&id, |id| async move {
        let mut uow = state.require_db()?.unit_of_work();
        ITEMS.get_one(&mut uow, id, scope.owner_id()).await
    })
    .await
}

async fn list_items(
    State(state): State<AppState>,
    scope: Scope,
    query: QueryParams,
) -> std::result::Result<ListResponse<Item>, ApiError> {
    dispatch::get_many(&query, |_query: ItemQuery, control| async move {
        let mut uow = state.require_db()?.unit_of_work();
        ITEMS.get_many(&mut uow, &control, scope.owner_id()).await
    })
    .await
}

async fn update_item(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<String>,
    body: Bytes,
) -> std::result::Result<DataResponse<Item>, ApiError> {
    dispatch::update_one(&id, &body, |id, request: UpdateItem| async move {
        let changes = ItemChanges {
            name: request.name,
            status: request.status.as_deref().map(normalize_status).transpose()?,
            due_date: parse_due_date(request.due_date.as_deref())?,
        };

        let mut uow = state.require_db()?.begin().await?;
        let updated = ITEMS.update_one(&mut uow, id, &changes, scope.owner_id()).await;
        uow.resolve(updated).await
    })
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    let auth_config = config
        .auth
        .clone()
        .ok_or_else(|| Error::Internal("the [auth] section is required".to_string()))?;
    let jwt = JwtAuth::new(&auth_config)?;
    let permissions = Permissions::new("admin:items", "own:items");

    let state = AppState::builder().config(config.clone()).build().await?;

    let app = Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).patch(update_item))
        .layer(axum::middleware::from_fn_with_state(
            permissions,
            Permissions::middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(jwt, JwtAuth::middleware))
        .with_state(state.clone());

    Server::new(config).serve(app, &state).await
}
