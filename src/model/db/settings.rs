use mongodb::{bson::doc, error::Error as DbError};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::Theme,
    mongodb::{Coll, Id},
};

/// A user's preferences. Stored one document per user; when a user has
/// never saved any, [`Settings::defaults_for`] applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub user: Id,
    pub email_notifications: bool,
    /// Notify about official actions on petitions the user created or signed.
    pub petition_updates: bool,
    /// Notify when polls the user created close.
    pub poll_results: bool,
    pub public_profile: bool,
    pub theme: Theme,
    pub language: String,
}

impl Settings {
    pub fn defaults_for(user: Id) -> Self {
        Self {
            user,
            email_notifications: true,
            petition_updates: true,
            poll_results: true,
            public_profile: true,
            theme: Theme::System,
            language: "en".to_string(),
        }
    }

    /// Load a user's settings, falling back to the defaults.
    pub async fn load(settings: &Coll<Settings>, user: Id) -> Result<Self, DbError> {
        let stored = settings.find_one(doc! { "user": user }, None).await?;
        Ok(stored.unwrap_or_else(|| Self::defaults_for(user)))
    }
}
