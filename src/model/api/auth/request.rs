use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::user::UserProfile,
    common::{password::hash_password, Role},
    db::user::NewUser,
};

/// Login credentials. The password is plaintext and never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// A sign-up request.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

fn default_role() -> Role {
    Role::Citizen
}

/// Normalise an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keep an optional text field only if it has content.
pub fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl TryFrom<Registration> for NewUser {
    type Error = Error;

    /// Validate a registration and hash its password.
    /// Officials must give a department and position; citizens never keep them.
    fn try_from(reg: Registration) -> Result<Self> {
        let name = reg.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::bad_request("Name is required"));
        }
        let email = normalize_email(&reg.email);
        if !email.contains('@') {
            return Err(Error::bad_request("A valid email address is required"));
        }

        let (department, position) = if reg.role.requires_office() {
            match (non_empty(reg.department), non_empty(reg.position)) {
                (Some(department), Some(position)) => (Some(department), Some(position)),
                _ => {
                    return Err(Error::bad_request(
                        "Department and position are required for public officials",
                    ))
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            name,
            email,
            password_hash: hash_password(&reg.password)?,
            location: reg.location.trim().to_string(),
            role: reg.role,
            department,
            position,
            verified: reg.role.verified_by_default(),
            avatar: None,
            created_at: Utc::now(),
        })
    }
}

/// Response to a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    /// The same JWT that is set in the auth cookie, for bearer-token clients.
    pub token: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citizens_are_verified_and_lose_office_fields() {
        let user = NewUser::try_from(Registration::citizen_example()).unwrap();
        assert_eq!(user.email, "ada@example.org");
        assert!(user.verified);
        assert_eq!(user.department, None);
        assert!(user.verify_password(crate::model::db::user::examples::CITIZEN_PASSWORD));
    }

    #[test]
    fn officials_await_verification() {
        let user = NewUser::try_from(Registration::official_example()).unwrap();
        assert!(!user.verified);
        assert_eq!(user.position.as_deref(), Some("Director"));
    }

    #[test]
    fn officials_need_department_and_position() {
        let mut reg = Registration::official_example();
        reg.position = Some("   ".to_string());
        assert!(NewUser::try_from(reg).is_err());
    }

    #[test]
    fn rejects_bad_email_and_short_password() {
        let mut reg = Registration::citizen_example();
        reg.email = "not-an-email".to_string();
        assert!(NewUser::try_from(reg).is_err());

        let mut reg = Registration::citizen_example();
        reg.password = "short".to_string();
        assert!(NewUser::try_from(reg).is_err());
    }
}
