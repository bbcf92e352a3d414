//! Permission checks and owner scoping

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::Caller;
use crate::error::ApiError;

/// How far a caller's access reaches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every row
    Unscoped,
    /// Only rows owned by this user id
    Owner(String),
}

impl Scope {
    /// Owner id to pass to repository calls
    pub fn owner_id(&self) -> Option<&str> {
        match self {
            Scope::Unscoped => None,
            Scope::Owner(id) => Some(id),
        }
    }
}

impl<S> FromRequestParts<S> for Scope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Scope>()
            .cloned()
            .ok_or_else(|| ApiError::forbidden("Permission denied."))
    }
}

/// Permission pair guarding a route
///
/// `admin` grants access to every row. `own` grants access to the caller's
/// own rows and requires a person identity.
#[derive(Debug, Clone)]
pub struct Permissions {
    /// Permission granting unscoped access
    pub admin: String,
    /// Permission granting access to the caller's own rows
    pub own: String,
}

impl Permissions {
    /// Guard with the given admin and own permissions
    pub fn new(admin: impl Into<String>, own: impl Into<String>) -> Self {
        Self {
            admin: admin.into(),
            own: own.into(),
        }
    }

    /// Resolve the scope the caller is allowed
    pub fn authorize(&self, caller: &Caller) -> Result<Scope, ApiError> {
        if caller.has_permission(&self.admin) {
            return Ok(Scope::Unscoped);
        }

        if caller.has_permission(&self.own) {
            if let Some(id) = &caller.user.id {
                return Ok(Scope::Owner(id.clone()));
            }
        }

        tracing::warn!(
            admin = %self.admin,
            own = %self.own,
            user_type = %caller.user.user_type,
            "Permission denied"
        );
        Err(ApiError::forbidden("Permission denied."))
    }

    /// Middleware function to authorize the authenticated caller and inject its [`Scope`]
    ///
    /// Must run after the authentication middleware.
    pub async fn middleware(
        State(permissions): State<Self>,
        mut request: Request<Body>,
        next: Next,
    ) -> Result<Response, ApiError> {
        let scope = {
            let caller = request
                .extensions()
                .get::<Caller>()
                .ok_or_else(|| ApiError::forbidden("Permission denied."))?;
            permissions.authorize(caller)?
        };

        request.extensions_mut().insert(scope);
        Ok(next.run(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{User, UserType};
    use crate::error::ApiErrorKind;
    use axum::{body::to_bytes, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn person(id: Option<&str>, permissions: &[&str]) -> Caller {
        Caller {
            user: User {
                id: id.map(str::to_string),
                email: None,
                source: None,
                user_type: UserType::Person,
            },
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            token: "Bearer t".to_string(),
        }
    }

    fn items() -> Permissions {
        Permissions::new("admin:items", "own:items")
    }

    #[test]
    fn test_admin_is_unscoped() {
        let scope = items()
            .authorize(&person(Some("acc-1"), &["own:items", "admin:items"]))
            .unwrap();
        assert_eq!(scope, Scope::Unscoped);
        assert_eq!(scope.owner_id(), None);
    }

    #[test]
    fn test_own_is_scoped_to_the_user() {
        let scope = items().authorize(&person(Some("acc-1"), &["own:items"])).unwrap();
        assert_eq!(scope.owner_id(), Some("acc-1"));
    }

    #[test]
    fn test_own_without_user_id_is_denied() {
        let err = items().authorize(&person(None, &["own:items"])).unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Forbidden);
    }

    #[test]
    fn test_no_permission_is_denied() {
        let err = items().authorize(&person(Some("acc-1"), &["read:other"])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.message, "Permission denied.");
    }

    async fn call(caller: Option<Caller>) -> (StatusCode, String) {
        let app = Router::new()
            .route(
                "/items",
                get(|scope: Scope| async move { scope.owner_id().unwrap_or("*").to_string() }),
            )
            .layer(axum::middleware::from_fn_with_state(items(), Permissions::middleware));

        let mut request = axum::http::Request::get("/items").body(Body::empty()).unwrap();
        if let Some(caller) = caller {
            request.extensions_mut().insert(caller);
        }

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_middleware_injects_scope() {
        let (status, body) = call(Some(person(Some("acc-1"), &["own:items"]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "acc-1");

        let (_, body) = call(Some(person(None, &["admin:items"]))).await;
        assert_eq!(body, "*");
    }

    #[tokio::test]
    async fn test_middleware_without_caller_is_forbidden() {
        let (status, _) = call(None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
