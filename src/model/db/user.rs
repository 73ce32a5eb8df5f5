use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{password::verify_password, Role},
    mongodb::Id,
};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub name: String,
    /// Login name; unique across all users.
    pub email: String,
    pub password_hash: String,
    pub location: String,
    pub role: Role,
    /// Only present for public officials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Only present for public officials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub verified: bool,
    /// URL of an externally stored avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(&self.password_hash, password)
    }

    pub fn is_official(&self) -> bool {
        self.role == Role::PublicOfficial
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    use crate::model::common::password::hash_password;

    pub const CITIZEN_PASSWORD: &str = "citizen-password";
    pub const OFFICIAL_PASSWORD: &str = "official-password";

    impl UserCore {
        pub fn citizen_example() -> Self {
            Self {
                name: "Ada Citizen".to_string(),
                email: "ada@example.org".to_string(),
                password_hash: hash_password(CITIZEN_PASSWORD).unwrap(),
                location: "Springfield".to_string(),
                role: Role::Citizen,
                department: None,
                position: None,
                verified: true,
                avatar: None,
                created_at: Utc::now(),
            }
        }

        pub fn official_example() -> Self {
            Self {
                name: "Olu Official".to_string(),
                email: "olu@example.gov".to_string(),
                password_hash: hash_password(OFFICIAL_PASSWORD).unwrap(),
                location: "Springfield".to_string(),
                role: Role::PublicOfficial,
                department: Some("Public Works".to_string()),
                position: Some("Director".to_string()),
                verified: true,
                avatar: None,
                created_at: Utc::now(),
            }
        }
    }
}
