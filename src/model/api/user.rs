use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::Role, db::user::User};

/// A user as shown to clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub location: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            name: user.user.name,
            email: user.user.email,
            location: user.user.location,
            role: user.user.role,
            department: user.user.department,
            position: user.user.position,
            verified: user.user.verified,
            avatar: user.user.avatar,
            created_at: user.user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{db::user::UserCore, mongodb::Id};

    use super::*;

    #[test]
    fn profile_hides_password_hash() {
        let user = User {
            id: Id::new(),
            user: UserCore::official_example(),
        };
        let json = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "public-official");
        assert_eq!(json["department"], "Public Works");
    }
}
