use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;
use crate::models::{require, Validate};

/// Role that may not be assigned through the API.
pub const SUPER_ADMIN: &str = "SUPER_ADMIN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Payload for creating or replacing a user.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl Validate for UserRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        require(errors, "name", &self.name, "Name is required");
        require(errors, "email", &self.email, "Email is required");
    }
}

/// A user that passed request validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<UserRequest> for NewUser {
    fn from(req: UserRequest) -> Self {
        Self {
            name: req.name.unwrap_or_default(),
            email: req.email.unwrap_or_default(),
            role: req.role.unwrap_or_else(|| "USER".to_string()),
        }
    }
}

impl NewUser {
    /// Business validation. Returns the first problem found.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("Name cannot be empty");
        }
        if self.email.trim().is_empty() {
            return Err("Email cannot be empty");
        }
        if !self.email.contains('@') {
            return Err("Email format is invalid");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            role: "USER".into(),
        }
    }

    #[test]
    fn test_check_messages() {
        assert_eq!(user(" ", "a@b.c").check(), Err("Name cannot be empty"));
        assert_eq!(user("Ann", "").check(), Err("Email cannot be empty"));
        assert_eq!(user("Ann", "ann.example.com").check(), Err("Email format is invalid"));
        assert!(user("Ann", "ann@example.com").check().is_ok());
    }

    #[test]
    fn test_request_validation_lists_missing_fields() {
        let mut errors = FieldErrors::new();
        UserRequest::default().validate(&mut errors);

        assert_eq!(errors.get("name").map(String::as_str), Some("Name is required"));
        assert_eq!(errors.get("email").map(String::as_str), Some("Email is required"));
    }

    #[test]
    fn test_role_defaults_to_user() {
        let new: NewUser = UserRequest {
            name: Some("Ann".into()),
            email: Some("ann@example.com".into()),
            role: None,
        }
        .into();
        assert_eq!(new.role, "USER");
    }
}
