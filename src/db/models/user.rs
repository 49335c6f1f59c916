//! User and session token models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{Document, StoreError};

/// Account role. Stored as an optional `role` field: only the literal
/// `"admin"` marks an administrator, anything else is an ordinary user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const ADMIN_MARKER: &'static str = "admin";

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Decode the stored `role` field.
    pub fn from_field(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(Self::ADMIN_MARKER) => Role::Admin,
            _ => Role::User,
        }
    }

    /// Encode for storage; ordinary users carry no `role` field.
    pub fn to_field(&self) -> Option<Value> {
        match self {
            Role::Admin => Some(Value::String(Self::ADMIN_MARKER.to_string())),
            Role::User => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Deserialize)]
struct StoredUser {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    #[serde(default)]
    role: Option<Value>,
}

impl User {
    pub fn from_document(doc: Document) -> Result<Self, StoreError> {
        let stored: StoredUser = serde_json::from_value(Value::Object(doc))?;
        Ok(Self {
            id: stored.id,
            email: stored.email,
            role: Role::from_field(stored.role.as_ref()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Body of `POST /users`: an email plus whatever profile fields the client sends.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(flatten)]
    pub profile: Document,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExistsResponse {
    pub message: String,
    pub inserted_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminStatusResponse {
    pub admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_from_field() {
        assert_eq!(Role::from_field(Some(&json!("admin"))), Role::Admin);
        assert_eq!(Role::from_field(Some(&json!("Admin"))), Role::User);
        assert_eq!(Role::from_field(Some(&json!("user"))), Role::User);
        assert_eq!(Role::from_field(Some(&json!(true))), Role::User);
        assert_eq!(Role::from_field(Some(&Value::Null)), Role::User);
        assert_eq!(Role::from_field(None), Role::User);
    }

    #[test]
    fn test_role_to_field() {
        assert_eq!(Role::Admin.to_field(), Some(json!("admin")));
        assert_eq!(Role::User.to_field(), None);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_user_from_document() {
        let doc = json!({"_id": "42", "email": "a@b.c", "name": "Ann", "role": "admin"});
        let user = User::from_document(doc.as_object().cloned().unwrap()).unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.email, "a@b.c");
        assert!(user.role.is_admin());

        let doc = json!({"_id": "43", "email": "x@y.z"});
        let user = User::from_document(doc.as_object().cloned().unwrap()).unwrap();
        assert_eq!(user.role, Role::User);

        let doc = json!({"_id": "44"});
        assert!(User::from_document(doc.as_object().cloned().unwrap()).is_err());
    }

    #[test]
    fn test_create_user_request_keeps_profile_fields() {
        let req: CreateUserRequest =
            serde_json::from_value(json!({"email": "a@b.c", "name": "Ann"})).unwrap();
        assert_eq!(req.email, "a@b.c");
        assert_eq!(req.profile.get("name"), Some(&json!("Ann")));
        assert!(!req.profile.contains_key("email"));
    }
}
