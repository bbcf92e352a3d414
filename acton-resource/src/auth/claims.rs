//! Access token claims

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Kind of client that obtained the token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClientType {
    /// Token issued to a human user
    User,
    /// Anything else is treated as a machine client
    #[default]
    #[serde(other)]
    Machine,
}

/// Client application details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default)]
    pub client_name: String,
}

/// Human user details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub email: String,
}

/// Claims stored under the service's namespace key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomClaims {
    #[serde(default)]
    pub client_metadata: ClientMetadata,
    #[serde(default)]
    pub client_type: ClientType,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Verified access token claims
///
/// Registered claims other than `exp` are optional. Namespaced custom claims
/// land in `extra` and are read with [`AccessClaims::custom_claims`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience, a string or an array of strings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,

    /// Granted permissions
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Space-separated OAuth scopes
    #[serde(default)]
    pub scope: String,

    /// Authorized party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Every other claim
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AccessClaims {
    /// Decode the custom claims stored under `namespace`
    ///
    /// A token without the namespace key yields the defaults.
    pub fn custom_claims(&self, namespace: &str) -> Result<CustomClaims, serde_json::Error> {
        match self.extra.get(namespace) {
            Some(value) => CustomClaims::deserialize(value),
            None => Ok(CustomClaims::default()),
        }
    }

    /// Check if the token grants a permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Check if the token carries an OAuth scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: serde_json::Value) -> AccessClaims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_namespaced_claims() {
        let claims = claims(json!({
            "sub": "auth0|1",
            "exp": 4_102_444_800_i64,
            "permissions": ["read:items", "admin:items"],
            "scope": "openid email",
            "azp": "client-1",
            "https://hear.com": {
                "client_type": "USER",
                "roles": ["editor"],
                "user_metadata": { "account_id": "acc-1", "email": "ada@example.com" }
            }
        }));

        assert!(claims.has_permission("admin:items"));
        assert!(!claims.has_permission("write:items"));
        assert!(claims.has_scope("email"));
        assert_eq!(claims.azp.as_deref(), Some("client-1"));

        let custom = claims.custom_claims("https://hear.com").unwrap();
        assert_eq!(custom.client_type, ClientType::User);
        assert_eq!(custom.roles, vec!["editor".to_string()]);
        assert_eq!(custom.user_metadata.account_id, "acc-1");
    }

    #[test]
    fn test_missing_namespace_defaults_to_machine() {
        let claims = claims(json!({ "exp": 1 }));
        let custom = claims.custom_claims("https://hear.com").unwrap();
        assert_eq!(custom.client_type, ClientType::Machine);
        assert!(claims.permissions.is_empty());
    }

    #[test]
    fn test_unknown_client_type_is_machine() {
        let claims = claims(json!({
            "exp": 1,
            "https://hear.com": { "client_type": "SERVICE" }
        }));
        let custom = claims.custom_claims("https://hear.com").unwrap();
        assert_eq!(custom.client_type, ClientType::Machine);
    }

    #[test]
    fn test_malformed_namespace_is_an_error() {
        let claims = claims(json!({ "exp": 1, "https://hear.com": "nope" }));
        assert!(claims.custom_claims("https://hear.com").is_err());
    }
}
