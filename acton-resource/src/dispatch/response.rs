//! Success envelopes for dispatched operations

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::meta::ResponseMeta;

/// Single entity response: `{"data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    /// The entity
    pub data: T,
    #[serde(skip, default = "ok_status")]
    status: StatusCode,
}

fn ok_status() -> StatusCode {
    StatusCode::OK
}

impl<T> DataResponse<T> {
    /// 200 OK
    pub fn ok(data: T) -> Self {
        Self {
            data,
            status: StatusCode::OK,
        }
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self {
            data,
            status: StatusCode::CREATED,
        }
    }

    /// Status the response is sent with
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Take the entity out of the envelope
    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: Serialize> IntoResponse for DataResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Paged collection response: `{"meta": ..., "data": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Totals and paging of this page
    pub meta: ResponseMeta,
    /// Entities on this page
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    /// Wrap one page of entities with its metadata
    ///
    /// ```rust
    /// use acton_resource::dispatch::ListResponse;
    /// use acton_resource::meta::build_meta;
    ///
    /// let page = ListResponse::new(vec!["lamp"], build_meta(0, 10, 1).unwrap());
    /// assert_eq!(page.meta.items_total, 1);
    /// assert_eq!(page.data, vec!["lamp"]);
    /// ```
    pub fn new(data: Vec<T>, meta: ResponseMeta) -> Self {
        Self { meta, data }
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
