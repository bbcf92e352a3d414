//! # acton-resource
//!
//! Generic resource access layer for PostgreSQL-backed REST services.
//! Concrete services declare their entity, request and query types; this
//! crate supplies validation, CRUD dispatch, query filtering and paging,
//! transaction-scoped persistence and token-based access control.
//!
//! ## Features
//!
//! - **Dispatch**: strict body decoding, `validator` checks and response envelopes
//! - **Query engine**: allow-listed query keys, filters, sort and paging
//! - **Repository**: create / get / list / update with soft-delete and owner scoping
//! - **Unit of work**: one transaction per request, committed or rolled back as a whole
//! - **Auth**: JWT/JWKS bearer tokens, caller identity and permission scopes
//! - **Health**: dependency registry behind `GET /sys/health`
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_resource::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config.clone()).build().await?;
//!     let app = Router::new().route("/items", get(|| async { "[]" }));
//!
//!     Server::new(config).serve(app, &state).await
//! }
//! ```

// Derive output refers to `::acton_resource`
extern crate self as acton_resource;

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod introspect;
pub mod meta;
pub mod middleware;
pub mod observability;
pub mod query;
pub mod server;
pub mod state;
pub mod validators;

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "database")]
pub mod repository;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{Caller, Permissions, Scope, User, UserType};
    #[cfg(feature = "jwt")]
    pub use crate::auth::JwtAuth;

    pub use crate::config::Config;
    pub use crate::dispatch::{self, DataResponse, ListResponse};
    pub use crate::error::{ApiError, ApiErrorKind, ApiOperation, Error, Result};
    pub use crate::health::{AppStateManager, Closable, Monitorable};
    pub use crate::introspect::FieldNames;
    pub use crate::meta::ResponseMeta;
    pub use crate::observability::init_tracing;
    pub use crate::query::{PageQuery, QueryControl, QueryParams};
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};

    #[cfg(feature = "database")]
    pub use crate::database::{Database, UnitOfWork};
    #[cfg(feature = "database")]
    pub use crate::repository::{Changeset, Entity, Repository};

    pub use axum::{
        extract::State,
        routing::{get, patch, post},
        Json, Router,
    };
    pub use validator::Validate;
}
