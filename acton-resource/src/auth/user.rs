//! Caller identity derived from verified claims

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::claims::{ClientType, CustomClaims};
use crate::validators::match_ignore_case;

/// Kind of principal behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserType {
    /// A machine client acting on its own behalf
    System,
    /// A human user
    Person,
}

impl UserType {
    /// Every variant, in the order reported by decode errors
    pub const ALL: [UserType; 2] = [UserType::System, UserType::Person];
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserType::System => "SYSTEM",
            UserType::Person => "PERSON",
        })
    }
}

impl<'de> Deserialize<'de> for UserType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match_ignore_case(&raw, &Self::ALL).map_err(serde::de::Error::custom)
    }
}

/// Identity of the caller
///
/// People carry `id` and `email`; systems carry the `source` client name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account id of a person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Email of a person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Client name of a system caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Principal kind
    #[serde(rename = "type")]
    pub user_type: UserType,
}

impl User {
    /// Build the identity carried by a token's custom claims
    pub fn from_claims(claims: &CustomClaims) -> Self {
        match claims.client_type {
            ClientType::User => Self {
                id: non_empty(&claims.user_metadata.account_id),
                email: non_empty(&claims.user_metadata.email),
                source: None,
                user_type: UserType::Person,
            },
            ClientType::Machine => Self {
                id: None,
                email: None,
                source: non_empty(&claims.client_metadata.client_name),
                user_type: UserType::System,
            },
        }
    }

    /// Whether the caller is a human user
    pub fn is_person(&self) -> bool {
        self.user_type == UserType::Person
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{ClientMetadata, UserMetadata};

    #[test]
    fn test_user_type_decodes_case_insensitively() {
        let t: UserType = serde_json::from_str("\"person\"").unwrap();
        assert_eq!(t, UserType::Person);
        let t: UserType = serde_json::from_str("\"System\"").unwrap();
        assert_eq!(t, UserType::System);
    }

    #[test]
    fn test_user_type_rejects_unknown_values() {
        let err = serde_json::from_str::<UserType>("\"robot\"").unwrap_err();
        assert!(err
            .to_string()
            .contains("Value 'robot' isn't a valid value. The valid values are: SYSTEM, PERSON"));
    }

    #[test]
    fn test_person_from_claims() {
        let claims = CustomClaims {
            client_type: ClientType::User,
            user_metadata: UserMetadata {
                account_id: "acc-1".to_string(),
                email: "ada@example.com".to_string(),
            },
            ..Default::default()
        };

        let user = User::from_claims(&claims);
        assert!(user.is_person());
        assert_eq!(user.id.as_deref(), Some("acc-1"));
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(user.source.is_none());
    }

    #[test]
    fn test_system_from_claims() {
        let claims = CustomClaims {
            client_type: ClientType::Machine,
            client_metadata: ClientMetadata {
                client_name: "billing".to_string(),
            },
            ..Default::default()
        };

        let user = User::from_claims(&claims);
        assert_eq!(user.user_type, UserType::System);
        assert_eq!(user.source.as_deref(), Some("billing"));
        assert!(user.id.is_none());
    }

    #[test]
    fn test_wire_format() {
        let user = User {
            id: Some("acc-1".to_string()),
            email: None,
            source: None,
            user_type: UserType::Person,
        };
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            serde_json::json!({ "id": "acc-1", "type": "PERSON" })
        );
    }
}
