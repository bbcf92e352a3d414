//! Generic request dispatch for REST resources
//!
//! Each function turns raw request parts (path id, body bytes, query
//! parameters) into typed, validated input, runs a resource function with it
//! and wraps the result in the response envelope. Errors returned by the
//! resource function are passed through untouched.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_resource::dispatch::{self, DataResponse, ListResponse};
//!
//! async fn create_item(
//!     State(api): State<ItemsApi>,
//!     scope: Scope,
//!     body: Bytes,
//! ) -> Result<DataResponse<Item>, ApiError> {
//!     dispatch::create(&body, |request: CreateItem| api.create(scope, request)).await
//! }
//!
//! async fn list_items(
//!     State(api): State<ItemsApi>,
//!     scope: Scope,
//!     params: QueryParams,
//! ) -> Result<ListResponse<Item>, ApiError> {
//!     dispatch::get_many(&params, |query: ItemQuery, control| api.list(scope, query, control)).await
//! }
//! ```

mod response;
mod validation;

use std::future::Future;

use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiOperation};
use crate::introspect::{field_names, FieldNames};
use crate::meta::ResponseMeta;
use crate::query::{validate_query, validate_sort_field, QueryControl, QueryParams};

pub use response::{DataResponse, ListResponse};
pub use validation::format_validation_errors;

/// Parse a path id as a UUID
pub fn parse_id(raw: &str, operation: ApiOperation) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        tracing::debug!(operation = %operation, id = raw, "Rejected malformed id");
        ApiError::invalid_payload(format!(
            "Value '{}' for attribute 'id' is not of type: uuid",
            raw
        ))
        .with_operation(operation)
    })
}

/// Decode a JSON body and validate it
///
/// Unknown fields are rejected when the type uses `#[serde(deny_unknown_fields)]`.
pub fn decode_body<R>(body: &[u8], operation: ApiOperation) -> Result<R, ApiError>
where
    R: DeserializeOwned + Validate,
{
    let request: R = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(operation = %operation, error = %e, "Rejected undecodable body");
        ApiError::invalid_payload(e.to_string()).with_operation(operation)
    })?;

    validate(&request, operation)?;
    Ok(request)
}

/// Check the query keys against `Q`, then bind and validate `Q`
pub fn decode_query<Q>(raw: &QueryParams, operation: ApiOperation) -> Result<Q, ApiError>
where
    Q: DeserializeOwned + Validate + FieldNames,
{
    let allowed = field_names::<Q>();
    validate_query(&allowed, raw).map_err(|e| e.with_operation(operation))?;
    validate_sort_field(&allowed, raw).map_err(|e| e.with_operation(operation))?;

    let query: Q = raw.bind().map_err(|e| e.with_operation(operation))?;
    validate(&query, operation)?;
    Ok(query)
}

fn validate<T: Validate>(value: &T, operation: ApiOperation) -> Result<(), ApiError> {
    value.validate().map_err(|errors| {
        tracing::debug!(operation = %operation, errors = %errors, "Rejected invalid input");
        format_validation_errors(operation, &errors)
    })
}

/// Decode and validate a body, then create an entity from it
///
/// Responds 201 with the created entity.
pub async fn create<R, M, F, Fut>(body: &[u8], service: F) -> Result<DataResponse<M>, ApiError>
where
    R: DeserializeOwned + Validate,
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<M, ApiError>>,
{
    let request = decode_body::<R>(body, ApiOperation::Create)?;
    let entity = service(request).await?;
    Ok(DataResponse::created(entity))
}

/// Like [`create`], for entities created under a parent resource
pub async fn create_with_external_id<R, M, F, Fut>(
    raw_id: &str,
    body: &[u8],
    service: F,
) -> Result<DataResponse<M>, ApiError>
where
    R: DeserializeOwned + Validate,
    F: FnOnce(Uuid, R) -> Fut,
    Fut: Future<Output = Result<M, ApiError>>,
{
    let external_id = parse_id(raw_id, ApiOperation::Create)?;
    let request = decode_body::<R>(body, ApiOperation::Create)?;
    let entity = service(external_id, request).await?;
    Ok(DataResponse::created(entity))
}

/// Fetch one entity by path id
pub async fn get_one<M, F, Fut>(raw_id: &str, service: F) -> Result<DataResponse<M>, ApiError>
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = Result<M, ApiError>>,
{
    let id = parse_id(raw_id, ApiOperation::Get)?;
    let entity = service(id).await?;
    Ok(DataResponse::ok(entity))
}

/// Fetch one entity, passing along extra data parsed from the query string
///
/// The query is checked against the fields of `Q` and bound to it, then
/// `parser` turns it into the argument the resource function expects.
pub async fn get_one_hydrated<Q, A, M, P, F, Fut>(
    raw_id: &str,
    raw_query: &QueryParams,
    parser: P,
    service: F,
) -> Result<DataResponse<M>, ApiError>
where
    Q: DeserializeOwned + Validate + FieldNames,
    P: FnOnce(Q) -> Result<A, ApiError>,
    F: FnOnce(Uuid, A) -> Fut,
    Fut: Future<Output = Result<M, ApiError>>,
{
    let id = parse_id(raw_id, ApiOperation::Get)?;
    let query = decode_query::<Q>(raw_query, ApiOperation::Get)?;
    let hydration = parser(query)?;
    let entity = service(id, hydration).await?;
    Ok(DataResponse::ok(entity))
}

/// List entities matching the query string
///
/// Unknown query keys are rejected before anything else runs.
pub async fn get_many<Q, M, F, Fut>(
    raw_query: &QueryParams,
    service: F,
) -> Result<ListResponse<M>, ApiError>
where
    Q: DeserializeOwned + Validate + FieldNames,
    F: FnOnce(Q, QueryControl) -> Fut,
    Fut: Future<Output = Result<(Vec<M>, ResponseMeta), ApiError>>,
{
    let query = decode_query::<Q>(raw_query, ApiOperation::List)?;
    let control = QueryControl::from_params(raw_query)?;
    let (entities, meta) = service(query, control).await?;
    Ok(ListResponse::new(entities, meta))
}

/// Like [`get_many`], for collections nested under a parent resource
pub async fn get_many_with_external_id<Q, M, F, Fut>(
    raw_id: &str,
    raw_query: &QueryParams,
    service: F,
) -> Result<ListResponse<M>, ApiError>
where
    Q: DeserializeOwned + Validate + FieldNames,
    F: FnOnce(Uuid, Q, QueryControl) -> Fut,
    Fut: Future<Output = Result<(Vec<M>, ResponseMeta), ApiError>>,
{
    let external_id = parse_id(raw_id, ApiOperation::List)?;
    let query = decode_query::<Q>(raw_query, ApiOperation::List)?;
    let control = QueryControl::from_params(raw_query)?;
    let (entities, meta) = service(external_id, query, control).await?;
    Ok(ListResponse::new(entities, meta))
}

/// Decode and validate a body, then apply it to the entity at the path id
pub async fn update_one<R, M, F, Fut>(
    raw_id: &str,
    body: &[u8],
    service: F,
) -> Result<DataResponse<M>, ApiError>
where
    R: DeserializeOwned + Validate,
    F: FnOnce(Uuid, R) -> Fut,
    Fut: Future<Output = Result<M, ApiError>>,
{
    let id = parse_id(raw_id, ApiOperation::Update)?;
    let request = decode_body::<R>(body, ApiOperation::Update)?;
    let entity = service(id, request).await?;
    Ok(DataResponse::ok(entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::meta::build_meta;
    use crate::query::{FilterOp, PageQuery};
    use axum::http::StatusCode;
    use serde::{Deserialize, Serialize};
    use std::cell::Cell;

    #[derive(Debug, Deserialize, Validate)]
    #[serde(deny_unknown_fields)]
    struct CreateItem {
        #[validate(length(min = 3))]
        name: String,
        quantity: Option<i64>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Item {
        id: Uuid,
        name: String,
    }

    #[derive(Debug, Deserialize, Validate, FieldNames)]
    #[serde(rename_all = "camelCase")]
    struct ItemQuery {
        name: Option<String>,
        #[serde(default, deserialize_with = "crate::query::de::one_or_many")]
        status: Option<Vec<String>>,
        #[serde(flatten)]
        #[validate(nested)]
        #[field_names(nested)]
        page: PageQuery,
    }

    #[derive(Debug, Deserialize, Validate, FieldNames)]
    struct Hydrate {
        include: Option<String>,
    }

    const ID: &str = "0191d5a8-5c2f-7cc3-a1b4-2f6b7e9d0c11";

    fn params(query: &str) -> QueryParams {
        let uri: axum::http::Uri = format!("/items?{}", query).parse().unwrap();
        QueryParams::from_uri(&uri).unwrap()
    }

    fn item(name: &str) -> Item {
        Item {
            id: Uuid::parse_str(ID).unwrap(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_responds_201() {
        let response = create(br#"{"name":"lamp","quantity":2}"#, |request: CreateItem| async move {
            assert_eq!(request.quantity, Some(2));
            Ok(item(&request.name))
        })
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.data.name, "lamp");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_fields_before_the_service() {
        let called = Cell::new(false);
        let err = create(br#"{"name":"lamp","color":"red"}"#, |_: CreateItem| {
            called.set(true);
            async { Ok(item("lamp")) }
        })
        .await
        .unwrap_err();

        assert!(!called.get());
        assert_eq!(err.kind, ApiErrorKind::InvalidPayload);
        assert!(err.message.contains("unknown field `color`"));
    }

    #[tokio::test]
    async fn test_create_reports_validation_failure() {
        let err = create(br#"{"name":"ab"}"#, |request: CreateItem| async move {
            Ok(item(&request.name))
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.message,
            "Value 'ab' for attribute 'name' is not of type: length"
        );
    }

    #[tokio::test]
    async fn test_service_errors_pass_through() {
        let err = create(br#"{"name":"lamp"}"#, |_: CreateItem| async {
            Err::<Item, _>(
                ApiError::unknown_database(ApiOperation::Create, "Could not create Item.")
                    .with_code("DUPLICATE_NAME"),
            )
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::UnknownDatabase);
        assert_eq!(err.code, "DUPLICATE_NAME");
    }

    #[tokio::test]
    async fn test_create_with_external_id() {
        let response = create_with_external_id(ID, br#"{"name":"lamp"}"#, |parent, request: CreateItem| async move {
            assert_eq!(parent.to_string(), ID);
            Ok(item(&request.name))
        })
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let err = create_with_external_id("nope", br#"{"name":"lamp"}"#, |_, request: CreateItem| async move {
            Ok(item(&request.name))
        })
        .await
        .unwrap_err();
        assert_eq!(err.message, "Value 'nope' for attribute 'id' is not of type: uuid");
    }

    #[tokio::test]
    async fn test_get_one() {
        let response = get_one(ID, |id| async move {
            Ok(Item {
                id,
                name: "lamp".to_string(),
            })
        })
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.into_inner(), item("lamp"));
    }

    #[tokio::test]
    async fn test_get_one_propagates_not_found() {
        let err = get_one(ID, |id| async move {
            Err::<Item, _>(ApiError::not_found("Item", id.to_string()))
        })
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.message, format!("Entity with id {} could not be found.", ID));
    }

    #[tokio::test]
    async fn test_get_one_hydrated() {
        let response = get_one_hydrated(
            ID,
            &params("include=owner"),
            |query: Hydrate| Ok(query.include.unwrap_or_default()),
            |id, include: String| async move {
                Ok(Item {
                    id,
                    name: include,
                })
            },
        )
        .await
        .unwrap();
        assert_eq!(response.data.name, "owner");

        let err = get_one_hydrated(
            ID,
            &params("expand=owner"),
            |_: Hydrate| Ok(()),
            |id, _| async move { Ok(Item { id, name: String::new() }) },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.message,
            "The following field(s) are not allowed: expand. Allowed fields are: include"
        );
    }

    #[tokio::test]
    async fn test_get_many_builds_control() {
        let response = get_many(
            &params("status=active&status=archived&sortBy=name&sort=asc&limit=5"),
            |query: ItemQuery, control| async move {
                assert_eq!(query.page.limit, Some(5));
                assert_eq!(control.filters.len(), 1);
                assert_eq!(control.filters[0].column, "status");
                assert_eq!(control.filters[0].op, FilterOp::In);
                assert_eq!(control.pagination.sort_field, "name");
                assert_eq!(control.pagination.limit, 5);

                assert_eq!(query.status.map(|s| s.len()), Some(2));

                let meta =
                    build_meta(control.pagination.offset, control.pagination.limit, 7).unwrap();
                Ok((vec![item("lamp")], meta))
            },
        )
        .await
        .unwrap();

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.meta.pages_total, 2);
    }

    #[tokio::test]
    async fn test_get_many_rejects_unknown_keys_first() {
        let called = Cell::new(false);
        let err = get_many(&params("name=x&foo=1&limit=abc"), |_: ItemQuery, _| {
            called.set(true);
            async { Ok((Vec::<Item>::new(), build_meta(0, 10, 0).unwrap())) }
        })
        .await
        .unwrap_err();

        assert!(!called.get());
        assert_eq!(err.operation, ApiOperation::List);
        assert!(err
            .message
            .starts_with("The following field(s) are not allowed: foo. Allowed fields are: "));
    }

    #[tokio::test]
    async fn test_get_many_rejects_negative_limit() {
        let err = get_many(&params("limit=-1"), |_: ItemQuery, _| async {
            Ok((Vec::<Item>::new(), build_meta(0, 10, 0).unwrap()))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::InvalidPayload);
        assert!(err.message.contains("'limit'"));
    }

    #[tokio::test]
    async fn test_get_many_repeated_key_on_scalar_field() {
        let response = get_many(&params("name=a&name=b"), |query: ItemQuery, control| async move {
            assert_eq!(query.name.as_deref(), Some("a"));
            assert_eq!(control.filters.len(), 1);
            assert_eq!(control.filters[0].column, "name");
            assert_eq!(control.filters[0].op, FilterOp::In);
            assert_eq!(control.filters[0].values, vec!["a".to_string(), "b".to_string()]);
            Ok((vec![item("a"), item("b")], build_meta(0, control.pagination.limit, 2).unwrap()))
        })
        .await
        .unwrap();

        assert_eq!(response.data.len(), 2);
    }

    #[tokio::test]
    async fn test_get_many_rejects_unknown_sort_field() {
        let called = Cell::new(false);
        let err = get_many(&params("sortBy=passwordHash"), |_: ItemQuery, _| {
            called.set(true);
            async { Ok((Vec::<Item>::new(), build_meta(0, 10, 0).unwrap())) }
        })
        .await
        .unwrap_err();

        assert!(!called.get());
        assert_eq!(err.kind, ApiErrorKind::InvalidPayload);
        assert_eq!(err.operation, ApiOperation::List);
        assert!(err
            .message
            .starts_with("Value 'passwordHash' for attribute 'sortBy' is not valid."));
    }

    #[tokio::test]
    async fn test_get_many_rejects_zero_limit_before_service() {
        let called = Cell::new(false);
        let err = get_many(&params("limit=0"), |_: ItemQuery, _| {
            called.set(true);
            async { Ok((Vec::<Item>::new(), build_meta(0, 10, 0).unwrap())) }
        })
        .await
        .unwrap_err();

        assert!(!called.get());
        assert_eq!(err.kind, ApiErrorKind::InvalidPayload);
        assert!(err.message.contains("'limit'"));
    }

    #[tokio::test]
    async fn test_get_many_with_external_id() {
        let response = get_many_with_external_id(ID, &params(""), |parent, _: ItemQuery, control| async move {
            assert_eq!(parent.to_string(), ID);
            assert!(control.filters.is_empty());
            Ok((Vec::<Item>::new(), build_meta(0, control.pagination.limit, 0).unwrap()))
        })
        .await
        .unwrap();

        assert!(response.data.is_empty());
        assert_eq!(response.meta.items_total, 0);
    }

    #[tokio::test]
    async fn test_update_one() {
        let response = update_one(ID, br#"{"name":"desk"}"#, |id, request: CreateItem| async move {
            Ok(Item {
                id,
                name: request.name,
            })
        })
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.data.name, "desk");

        let err = update_one(ID, b"", |id, request: CreateItem| async move {
            Ok(Item {
                id,
                name: request.name,
            })
        })
        .await
        .unwrap_err();
        assert_eq!(err.operation, ApiOperation::Update);
    }

    #[tokio::test]
    async fn test_update_one_keeps_explicit_null() {
        #[derive(Debug, Deserialize, Validate)]
        #[serde(deny_unknown_fields)]
        struct ClearNote {
            #[serde(default, deserialize_with = "crate::query::de::double_option")]
            note: Option<Option<String>>,
        }

        let response = update_one(ID, br#"{"note":null}"#, |_, request: ClearNote| async move {
            Ok(request.note)
        })
        .await
        .unwrap();
        assert_eq!(response.data, Some(None));

        let response = update_one(ID, b"{}", |_, request: ClearNote| async move { Ok(request.note) })
            .await
            .unwrap();
        assert_eq!(response.data, None);
    }
}
