//! Authentication and authorization
//!
//! [`JwtAuth`] verifies bearer tokens and stores the resulting [`Caller`] in
//! the request extensions. [`Permissions`] then checks the caller's
//! permissions and stores a [`Scope`] that handlers pass to repositories.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/items", get(list_items))
//!     .layer(axum::middleware::from_fn_with_state(
//!         Permissions::new("admin:items", "own:items"),
//!         Permissions::middleware,
//!     ))
//!     .layer(axum::middleware::from_fn_with_state(jwt, JwtAuth::middleware));
//! ```

mod authorization;
mod claims;
#[cfg(feature = "jwt")]
mod jwt;
mod user;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub use authorization::{Permissions, Scope};
pub use claims::{AccessClaims, ClientMetadata, ClientType, CustomClaims, UserMetadata};
#[cfg(feature = "jwt")]
pub use jwt::{strip_bearer, JwtAuth};
pub use user::{User, UserType};

/// Authenticated caller of the current request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Identity from the token's custom claims
    pub user: User,
    /// Permissions granted by the token
    pub permissions: Vec<String>,
    /// Raw `Authorization` header, for forwarding to downstream services
    #[serde(skip)]
    pub token: String,
}

impl Caller {
    /// Check if the caller holds a permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Invalid token."))
    }
}
