use serde::{Deserialize, Serialize};

use crate::model::{common::Theme, db::settings::Settings};

/// A user's preferences as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDesc {
    pub email_notifications: bool,
    pub petition_updates: bool,
    pub poll_results: bool,
    pub public_profile: bool,
    pub theme: Theme,
    pub language: String,
}

impl From<Settings> for SettingsDesc {
    fn from(settings: Settings) -> Self {
        Self {
            email_notifications: settings.email_notifications,
            petition_updates: settings.petition_updates,
            poll_results: settings.poll_results,
            public_profile: settings.public_profile,
            theme: settings.theme,
            language: settings.language,
        }
    }
}

/// A partial update of preferences. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub email_notifications: Option<bool>,
    pub petition_updates: Option<bool>,
    pub poll_results: Option<bool>,
    pub public_profile: Option<bool>,
    pub theme: Option<Theme>,
    pub language: Option<String>,
}

impl SettingsUpdate {
    /// Apply this update on top of existing settings.
    pub fn apply(self, settings: &mut Settings) {
        if let Some(value) = self.email_notifications {
            settings.email_notifications = value;
        }
        if let Some(value) = self.petition_updates {
            settings.petition_updates = value;
        }
        if let Some(value) = self.poll_results {
            settings.poll_results = value;
        }
        if let Some(value) = self.public_profile {
            settings.public_profile = value;
        }
        if let Some(value) = self.theme {
            settings.theme = value;
        }
        if let Some(value) = self.language.filter(|value| !value.trim().is_empty()) {
            settings.language = value.trim().to_string();
        }
    }
}

/// Editable profile fields. Absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    /// Ignored for citizens.
    pub department: Option<String>,
    /// Ignored for citizens.
    pub position: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Reference to an avatar image stored elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarUpdate {
    pub url: String,
}
